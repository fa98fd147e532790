//! Applies decoded Stripe events to user profiles

use chrono::Utc;
use inkf_common::events::{EventBus, InkEvent};
use inkf_common::{Result, SubscriptionTier};
use sqlx::SqlitePool;

use crate::db::profiles;
use crate::models::{SubscriptionUpdate, UserProfile};
use crate::services::stripe::SubscriptionEvent;

/// Subscription statuses after which paid features end
const INACTIVE_STATUSES: [&str; 3] = ["canceled", "unpaid", "incomplete_expired"];

/// Merge a subscription event into the owning profile
///
/// Returns `None` for ignored events and for events whose user cannot be
/// resolved; neither is an error for the webhook sender.
pub async fn apply_event(
    pool: &SqlitePool,
    event: &SubscriptionEvent,
    event_bus: &EventBus,
) -> Result<Option<UserProfile>> {
    let (user_id, customer_id, update) = match event {
        SubscriptionEvent::Ignored(event_type) => {
            tracing::debug!(event_type = %event_type, "Ignoring Stripe event");
            return Ok(None);
        }
        SubscriptionEvent::CheckoutCompleted {
            user_id,
            customer_id,
            subscription_id,
            tier,
        } => (
            user_id,
            customer_id,
            SubscriptionUpdate {
                tier: *tier,
                stripe_customer_id: customer_id.clone(),
                stripe_subscription_id: subscription_id.clone(),
                subscription_status: Some("active".to_string()),
            },
        ),
        SubscriptionEvent::SubscriptionUpdated {
            user_id,
            customer_id,
            subscription_id,
            status,
            tier,
        } => {
            let inactive = status
                .as_deref()
                .is_some_and(|s| INACTIVE_STATUSES.contains(&s));
            (
                user_id,
                customer_id,
                SubscriptionUpdate {
                    tier: if inactive { Some(SubscriptionTier::Free) } else { *tier },
                    stripe_customer_id: customer_id.clone(),
                    stripe_subscription_id: subscription_id.clone(),
                    subscription_status: status.clone(),
                },
            )
        }
        SubscriptionEvent::SubscriptionDeleted {
            user_id,
            customer_id,
            subscription_id,
        } => (
            user_id,
            customer_id,
            SubscriptionUpdate {
                tier: Some(SubscriptionTier::Free),
                stripe_customer_id: customer_id.clone(),
                stripe_subscription_id: subscription_id.clone(),
                subscription_status: Some("canceled".to_string()),
            },
        ),
    };

    let Some(user_id) = resolve_user(pool, user_id.as_deref(), customer_id.as_deref()).await?
    else {
        tracing::warn!(
            customer_id = customer_id.as_deref().unwrap_or("-"),
            "Stripe event for unknown user, skipping"
        );
        return Ok(None);
    };

    let profile = profiles::merge_subscription(pool, &user_id, &update).await?;

    tracing::info!(
        user_id = %profile.user_id,
        tier = %profile.tier,
        status = profile.subscription_status.as_deref().unwrap_or("-"),
        "Subscription updated"
    );

    event_bus.emit_lossy(InkEvent::SubscriptionChanged {
        user_id: profile.user_id.clone(),
        tier: profile.tier.to_string(),
        status: profile.subscription_status.clone().unwrap_or_default(),
        timestamp: Utc::now(),
    });

    Ok(Some(profile))
}

async fn resolve_user(
    pool: &SqlitePool,
    user_id: Option<&str>,
    customer_id: Option<&str>,
) -> Result<Option<String>> {
    if let Some(user_id) = user_id {
        return Ok(Some(user_id.to_string()));
    }
    match customer_id {
        Some(customer_id) => Ok(profiles::find_by_customer(pool, customer_id)
            .await?
            .map(|p| p.user_id)),
        None => Ok(None),
    }
}
