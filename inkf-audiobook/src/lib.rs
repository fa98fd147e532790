//! inkf-audiobook library interface
//!
//! Chapter narration service: accepts chapters over HTTP, turns them into
//! MP3 files in the background, and tracks subscription usage.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod text;
pub mod utils;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use inkf_common::events::EventBus;
use inkf_common::SubscriptionTier;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::error::ServerErrorDetail;
use crate::text::Chunker;
use crate::workflow::JobQueue;

/// Stripe webhook settings
#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    /// Signing secret; webhook calls fail with 500 while unset
    pub webhook_secret: Option<String>,
    /// Price id → tier
    pub price_tiers: HashMap<String, SubscriptionTier>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub queue: JobQueue,
    pub chunker: Chunker,
    pub stripe: Arc<StripeConfig>,
    /// Directory served at `/files`
    pub files_root: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last server error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        queue: JobQueue,
        chunker: Chunker,
        stripe: StripeConfig,
        files_root: PathBuf,
    ) -> Self {
        Self {
            db,
            event_bus,
            queue,
            chunker,
            stripe: Arc::new(stripe),
            files_root,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Remember the cause of the latest 500 for `/health`
async fn track_last_error(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if let Some(ServerErrorDetail(detail)) = response.extensions().get::<ServerErrorDetail>() {
        *state.last_error.write().await = Some(detail.clone());
    }
    response
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::audiobook_routes())
        .merge(api::stripe_routes())
        .merge(api::usage_routes())
        .merge(api::health_routes())
        .nest_service("/files", ServeDir::new(&state.files_root))
        .layer(middleware::from_fn_with_state(state.clone(), track_last_error))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
