//! User profile persistence
//!
//! Subscription state is merged field by field; usage counters only move
//! through a single conditional UPDATE so concurrent increments can neither
//! lose updates nor overshoot the tier limit.

use chrono::{DateTime, Utc};
use inkf_common::{Error, Result, SubscriptionTier, UsageKind};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::{IncrementOutcome, SubscriptionUpdate, UserProfile};

const PROFILE_COLUMNS: &str = "user_id, tier, page_quota, ai_generations, audiobook_chapters, \
     cover_generations, stripe_customer_id, stripe_subscription_id, subscription_status, \
     created_at, updated_at";

pub async fn load_profile(pool: &SqlitePool, user_id: &str) -> Result<Option<UserProfile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM user_profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| profile_from_row(&row)).transpose()
}

pub async fn find_by_customer(pool: &SqlitePool, customer_id: &str) -> Result<Option<UserProfile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM user_profiles WHERE stripe_customer_id = ? ORDER BY updated_at DESC LIMIT 1",
        PROFILE_COLUMNS
    ))
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| profile_from_row(&row)).transpose()
}

/// Create the profile with `tier` if absent, then return it
pub async fn ensure_profile(
    pool: &SqlitePool,
    user_id: &str,
    tier: SubscriptionTier,
) -> Result<UserProfile> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT OR IGNORE INTO user_profiles (user_id, tier, page_quota, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(tier.as_str())
    .bind(tier.limits().page_quota)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    load_profile(pool, user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Profile vanished after insert: {}", user_id)))
}

/// Merge subscription state into a profile, creating it on first sight
///
/// A tier change also resets `page_quota` to that tier's quota.
pub async fn merge_subscription(
    pool: &SqlitePool,
    user_id: &str,
    update: &SubscriptionUpdate,
) -> Result<UserProfile> {
    ensure_profile(pool, user_id, SubscriptionTier::Free).await?;

    let tier = update.tier.map(|t| t.as_str());
    let page_quota = update.tier.map(|t| t.limits().page_quota);

    sqlx::query(
        r#"
        UPDATE user_profiles SET
            tier = COALESCE(?, tier),
            page_quota = COALESCE(?, page_quota),
            stripe_customer_id = COALESCE(?, stripe_customer_id),
            stripe_subscription_id = COALESCE(?, stripe_subscription_id),
            subscription_status = COALESCE(?, subscription_status),
            updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(tier)
    .bind(page_quota)
    .bind(&update.stripe_customer_id)
    .bind(&update.stripe_subscription_id)
    .bind(&update.subscription_status)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .execute(pool)
    .await?;

    load_profile(pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User profile: {}", user_id)))
}

/// Atomically add one to a usage counter if the user's tier allows it
///
/// The limit is evaluated inside the UPDATE against the stored tier, so a
/// concurrent tier change or increment is always seen.
pub async fn increment_usage(
    pool: &SqlitePool,
    user_id: &str,
    kind: UsageKind,
) -> Result<IncrementOutcome> {
    let column = kind.column();
    let limit_expr = limit_case_sql(kind);

    let updated: Option<i64> = sqlx::query_scalar(&format!(
        "UPDATE user_profiles
         SET {column} = {column} + 1, updated_at = ?
         WHERE user_id = ? AND (({limit_expr}) IS NULL OR {column} < ({limit_expr}))
         RETURNING {column}",
    ))
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    if let Some(count) = updated {
        return Ok(IncrementOutcome::Incremented { count });
    }

    let profile = load_profile(pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User profile: {}", user_id)))?;

    let limit = profile.tier.limits().limit_for(kind).unwrap_or(i64::MAX);
    Ok(IncrementOutcome::LimitReached {
        limit,
        used: profile.usage(kind),
    })
}

/// Give back one unit of a usage counter reserved by [`increment_usage`]
///
/// Never drops below zero. Returns whether a unit was released.
pub async fn release_usage(pool: &SqlitePool, user_id: &str, kind: UsageKind) -> Result<bool> {
    let column = kind.column();
    let result = sqlx::query(&format!(
        "UPDATE user_profiles SET {column} = {column} - 1, updated_at = ?
         WHERE user_id = ? AND {column} > 0",
    ))
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// SQL CASE mapping the stored tier to its limit for `kind` (NULL = unlimited)
///
/// Built only from compiled-in integers.
fn limit_case_sql(kind: UsageKind) -> String {
    let arm = |tier: SubscriptionTier| match tier.limits().limit_for(kind) {
        Some(limit) => format!("WHEN '{}' THEN {}", tier.as_str(), limit),
        None => format!("WHEN '{}' THEN NULL", tier.as_str()),
    };

    format!(
        "CASE tier {} {} {} ELSE 0 END",
        arm(SubscriptionTier::Free),
        arm(SubscriptionTier::Creator),
        arm(SubscriptionTier::Premium)
    )
}

fn profile_from_row(row: &SqliteRow) -> Result<UserProfile> {
    let tier: String = row.get("tier");
    let tier = tier.parse::<SubscriptionTier>().unwrap_or_else(|_| {
        tracing::warn!(tier = %tier, "Unknown tier stored, treating as free");
        SubscriptionTier::Free
    });

    Ok(UserProfile {
        user_id: row.get("user_id"),
        tier,
        page_quota: row.get("page_quota"),
        ai_generations: row.get("ai_generations"),
        audiobook_chapters: row.get("audiobook_chapters"),
        cover_generations: row.get("cover_generations"),
        stripe_customer_id: row.get("stripe_customer_id"),
        stripe_subscription_id: row.get("stripe_subscription_id"),
        subscription_status: row.get("subscription_status"),
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}
