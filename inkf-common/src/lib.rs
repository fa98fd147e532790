//! # Inkfluence Common Library
//!
//! Shared code for the Inkfluence backend services:
//! - Error type and result alias
//! - Configuration loading (root folder, TOML bootstrap config)
//! - Database initialization and schema
//! - Event bus for job lifecycle events
//! - Subscription tiers and usage limits

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod tier;

pub use error::{Error, Result};
pub use tier::{SubscriptionTier, TierLimits, UsageKind};
