//! Settings database operations
//!
//! Key-value accessors over the `settings` table.

use inkf_common::{Error, Result, SubscriptionTier};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;

use crate::text::DEFAULT_CHUNK_LIMIT;

pub const OPENAI_API_KEY: &str = "openai_api_key";
pub const STRIPE_WEBHOOK_SECRET: &str = "stripe_webhook_secret";
pub const STRIPE_PRICE_CREATOR: &str = "stripe_price_creator";
pub const STRIPE_PRICE_PREMIUM: &str = "stripe_price_premium";

pub async fn get_openai_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, OPENAI_API_KEY).await
}

pub async fn set_openai_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, OPENAI_API_KEY, key).await
}

pub async fn get_stripe_webhook_secret(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, STRIPE_WEBHOOK_SECRET).await
}

pub async fn set_stripe_webhook_secret(db: &Pool<Sqlite>, secret: String) -> Result<()> {
    set_setting(db, STRIPE_WEBHOOK_SECRET, secret).await
}

/// Maximum characters per synthesis request
///
/// **Default:** 3800
pub async fn get_chunk_limit(db: &Pool<Sqlite>) -> Result<usize> {
    get_setting(db, "audiobook_chunk_limit")
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_CHUNK_LIMIT))
}

/// Retries per pipeline step after the first attempt
///
/// **Default:** 3
pub async fn get_max_retries(db: &Pool<Sqlite>) -> Result<u32> {
    get_setting(db, "audiobook_max_retries")
        .await
        .map(|opt| opt.unwrap_or(3))
}

/// Concurrent synthesis requests per job (1 = sequential)
pub async fn get_synthesis_concurrency(db: &Pool<Sqlite>) -> Result<usize> {
    get_setting(db, "audiobook_synthesis_concurrency")
        .await
        .map(|opt: Option<usize>| opt.unwrap_or(1).max(1))
}

/// Upper bound on lock-retry waits
///
/// **Default:** 5000 ms
pub async fn get_db_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, "db_max_lock_wait_ms")
        .await
        .map(|opt| opt.unwrap_or(5000))
}

/// Stripe price id → tier, from the `stripe_price_*` settings
pub async fn get_price_tiers(db: &Pool<Sqlite>) -> Result<HashMap<String, SubscriptionTier>> {
    let mut prices = HashMap::new();
    for (key, tier) in [
        (STRIPE_PRICE_CREATOR, SubscriptionTier::Creator),
        (STRIPE_PRICE_PREMIUM, SubscriptionTier::Premium),
    ] {
        if let Some(price_id) = get_setting::<String>(db, key).await? {
            if !price_id.trim().is_empty() {
                prices.insert(price_id.trim().to_string(), tier);
            }
        }
    }
    Ok(prices)
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
