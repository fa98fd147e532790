//! Usage quota endpoints
//!
//! GET /api/usage/:user_id, POST /api/usage/:user_id/increment,
//! PUT /api/usage/:user_id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use inkf_common::{SubscriptionTier, TierLimits, UsageKind};
use serde::{Deserialize, Serialize};

use crate::db::profiles;
use crate::error::{ApiError, ApiResult};
use crate::models::{IncrementOutcome, SubscriptionUpdate, UserProfile};
use crate::AppState;

/// Remaining allowance per counter; `null` means unlimited
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Remaining {
    pub ai_generations: Option<i64>,
    pub audiobook_chapters: Option<i64>,
    pub cover_generations: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub profile: UserProfile,
    pub limits: TierLimits,
    pub remaining: Remaining,
}

impl From<UserProfile> for UsageResponse {
    fn from(profile: UserProfile) -> Self {
        let remaining = Remaining {
            ai_generations: profile.remaining(UsageKind::AiGeneration),
            audiobook_chapters: profile.remaining(UsageKind::AudiobookChapter),
            cover_generations: profile.remaining(UsageKind::CoverGeneration),
        };
        Self {
            limits: profile.tier.limits(),
            remaining,
            profile,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IncrementRequest {
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IncrementResponse {
    pub kind: UsageKind,
    pub count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpsertProfileRequest {
    pub tier: Option<String>,
}

/// GET /api/usage/:user_id
pub async fn get_usage(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UsageResponse>> {
    let profile = profiles::load_profile(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User profile: {}", user_id)))?;

    Ok(Json(profile.into()))
}

/// POST /api/usage/:user_id/increment
pub async fn increment_usage(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<IncrementRequest>, JsonRejection>,
) -> ApiResult<Json<IncrementResponse>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let kind = request
        .kind
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing kind".to_string()))?
        .parse::<UsageKind>()?;

    match profiles::increment_usage(&state.db, &user_id, kind).await? {
        IncrementOutcome::Incremented { count } => {
            tracing::debug!(user_id = %user_id, ?kind, count, "Usage incremented");
            Ok(Json(IncrementResponse { kind, count }))
        }
        IncrementOutcome::LimitReached { limit, used } => Err(ApiError::Forbidden(format!(
            "Usage limit reached ({} of {})",
            used, limit
        ))),
    }
}

/// PUT /api/usage/:user_id
///
/// Creates the profile when missing. A tier in the body is applied with its
/// page quota.
pub async fn upsert_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<UpsertProfileRequest>, JsonRejection>,
) -> ApiResult<Json<UsageResponse>> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => UpsertProfileRequest::default(),
        Err(e) => return Err(ApiError::BadRequest(e.body_text())),
    };

    let tier = request
        .tier
        .as_deref()
        .map(str::parse::<SubscriptionTier>)
        .transpose()?;

    let profile = match tier {
        Some(tier) => {
            profiles::merge_subscription(
                &state.db,
                &user_id,
                &SubscriptionUpdate {
                    tier: Some(tier),
                    ..Default::default()
                },
            )
            .await?
        }
        None => profiles::ensure_profile(&state.db, &user_id, SubscriptionTier::Free).await?,
    };

    Ok(Json(profile.into()))
}

pub fn usage_routes() -> Router<AppState> {
    Router::new()
        .route("/api/usage/:user_id", get(get_usage).put(upsert_profile))
        .route("/api/usage/:user_id/increment", post(increment_usage))
}
