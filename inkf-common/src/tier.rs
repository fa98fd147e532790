//! Subscription tiers and the usage limits they grant

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Subscription level gating usage quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Creator,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Creator => "creator",
            SubscriptionTier::Premium => "premium",
        }
    }

    /// Limits granted by this tier
    pub fn limits(&self) -> TierLimits {
        match self {
            SubscriptionTier::Free => TierLimits {
                page_quota: 30,
                ai_generations: Some(10),
                audiobook_chapters: Some(3),
                cover_generations: Some(1),
            },
            SubscriptionTier::Creator => TierLimits {
                page_quota: 300,
                ai_generations: Some(200),
                audiobook_chapters: Some(50),
                cover_generations: Some(20),
            },
            SubscriptionTier::Premium => TierLimits {
                page_quota: 1000,
                ai_generations: None,
                audiobook_chapters: None,
                cover_generations: None,
            },
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "creator" => Ok(SubscriptionTier::Creator),
            "premium" => Ok(SubscriptionTier::Premium),
            other => Err(Error::InvalidInput(format!("Unknown subscription tier: {}", other))),
        }
    }
}

/// Quotas for one tier. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub page_quota: i64,
    pub ai_generations: Option<i64>,
    pub audiobook_chapters: Option<i64>,
    pub cover_generations: Option<i64>,
}

impl TierLimits {
    pub fn limit_for(&self, kind: UsageKind) -> Option<i64> {
        match kind {
            UsageKind::AiGeneration => self.ai_generations,
            UsageKind::AudiobookChapter => self.audiobook_chapters,
            UsageKind::CoverGeneration => self.cover_generations,
        }
    }
}

/// Usage counter kinds tracked per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsageKind {
    AiGeneration,
    AudiobookChapter,
    CoverGeneration,
}

impl UsageKind {
    /// Column holding this counter in `user_profiles`
    pub fn column(&self) -> &'static str {
        match self {
            UsageKind::AiGeneration => "ai_generations",
            UsageKind::AudiobookChapter => "audiobook_chapters",
            UsageKind::CoverGeneration => "cover_generations",
        }
    }
}

impl FromStr for UsageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "aiGeneration" => Ok(UsageKind::AiGeneration),
            "audiobookChapter" => Ok(UsageKind::AudiobookChapter),
            "coverGeneration" => Ok(UsageKind::CoverGeneration),
            other => Err(Error::InvalidInput(format!("Unknown usage kind: {}", other))),
        }
    }
}
