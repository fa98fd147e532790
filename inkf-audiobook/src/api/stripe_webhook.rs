//! Stripe webhook handler
//!
//! The raw body is verified before it is parsed; handled events merge
//! subscription state into the user's profile.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::services::stripe::{verify_signature, StripeEvent};
use crate::services::subscriptions::apply_event;
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /api/stripe-webhook
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let secret = state
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("Stripe webhook secret not configured".to_string()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    verify_signature(&body, signature, secret, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        ApiError::BadRequest(format!("Webhook signature verification failed: {}", e))
    })?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid event payload: {}", e)))?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe event received");

    let update = event.classify(&state.stripe.price_tiers);
    apply_event(&state.db, &update, &state.event_bus).await?;

    Ok(Json(json!({ "received": true })))
}

pub fn stripe_routes() -> Router<AppState> {
    Router::new().route("/api/stripe-webhook", post(stripe_webhook))
}
