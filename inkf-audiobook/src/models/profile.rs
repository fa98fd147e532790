//! User profile: subscription tier, quotas and usage counters

use chrono::{DateTime, Utc};
use inkf_common::{SubscriptionTier, UsageKind};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub tier: SubscriptionTier,
    pub page_quota: i64,
    pub ai_generations: i64,
    pub audiobook_chapters: i64,
    pub cover_generations: i64,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn usage(&self, kind: UsageKind) -> i64 {
        match kind {
            UsageKind::AiGeneration => self.ai_generations,
            UsageKind::AudiobookChapter => self.audiobook_chapters,
            UsageKind::CoverGeneration => self.cover_generations,
        }
    }

    /// Remaining allowance, `None` when unlimited
    pub fn remaining(&self, kind: UsageKind) -> Option<i64> {
        self.tier
            .limits()
            .limit_for(kind)
            .map(|limit| (limit - self.usage(kind)).max(0))
    }

    pub fn can_use(&self, kind: UsageKind) -> bool {
        self.remaining(kind).map_or(true, |left| left > 0)
    }
}

/// Subscription fields carried by a billing event
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionUpdate {
    pub tier: Option<SubscriptionTier>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
}

/// Result of an atomic usage increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    Incremented { count: i64 },
    LimitReached { limit: i64, used: i64 },
}
