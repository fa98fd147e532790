//! Stripe webhook signature verification and event decoding
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>]`.
//! Each `v1` is an HMAC-SHA256 over `"{t}.{raw body}"` keyed with the
//! endpoint's signing secret.

use hmac::{Hmac, Mac};
use inkf_common::SubscriptionTier;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (either direction) of a signed timestamp, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing or malformed Stripe-Signature header")]
    MalformedHeader,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfRange,

    #[error("No matching signature")]
    Mismatch,
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(signed_mac(secret, timestamp, payload).finalize().into_bytes())
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Check a webhook payload against its `Stripe-Signature` header at time `now`
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::TimestampOutOfRange);
    }

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|expected| {
                signed_mac(secret, timestamp, payload)
                    .verify_slice(&expected)
                    .is_ok()
            })
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Envelope of every Stripe event
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

/// What a handled event asks of the profile store
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    CheckoutCompleted {
        user_id: Option<String>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        tier: Option<SubscriptionTier>,
    },
    SubscriptionUpdated {
        user_id: Option<String>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        status: Option<String>,
        tier: Option<SubscriptionTier>,
    },
    SubscriptionDeleted {
        user_id: Option<String>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    Ignored(String),
}

impl StripeEvent {
    /// Interpret the event, resolving tiers from `metadata.tier` or the price table
    pub fn classify(&self, price_tiers: &HashMap<String, SubscriptionTier>) -> SubscriptionEvent {
        let object = &self.data.object;

        match self.event_type.as_str() {
            "checkout.session.completed" => SubscriptionEvent::CheckoutCompleted {
                user_id: str_field(object, &["client_reference_id"])
                    .or_else(|| str_field(object, &["metadata", "userId"])),
                customer_id: str_field(object, &["customer"]),
                subscription_id: str_field(object, &["subscription"]),
                tier: metadata_tier(object).or_else(|| {
                    str_field(object, &["metadata", "priceId"])
                        .and_then(|price| price_tiers.get(&price).copied())
                }),
            },
            "customer.subscription.updated" => SubscriptionEvent::SubscriptionUpdated {
                user_id: str_field(object, &["metadata", "userId"]),
                customer_id: str_field(object, &["customer"]),
                subscription_id: str_field(object, &["id"]),
                status: str_field(object, &["status"]),
                tier: metadata_tier(object).or_else(|| {
                    first_price_id(object).and_then(|price| price_tiers.get(&price).copied())
                }),
            },
            "customer.subscription.deleted" => SubscriptionEvent::SubscriptionDeleted {
                user_id: str_field(object, &["metadata", "userId"]),
                customer_id: str_field(object, &["customer"]),
                subscription_id: str_field(object, &["id"]),
            },
            other => SubscriptionEvent::Ignored(other.to_string()),
        }
    }
}

fn str_field(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn metadata_tier(object: &Value) -> Option<SubscriptionTier> {
    str_field(object, &["metadata", "tier"]).and_then(|tier| tier.parse().ok())
}

fn first_price_id(object: &Value) -> Option<String> {
    object
        .get("items")
        .and_then(|items| items.get("data"))
        .and_then(|data| data.get(0))
        .and_then(|item| str_field(item, &["price", "id"]))
}
