//! Audiobook API handlers
//!
//! `POST /api/audiobook?action=queue` accepts a chapter for narration and
//! `GET /api/audiobook?action=status` reports its progress.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use inkf_common::{SubscriptionTier, UsageKind};
use serde::Deserialize;
use serde_json::json;

use crate::db::{jobs, profiles};
use crate::error::{ApiError, ApiResult};
use crate::models::{AudiobookJob, IncrementOutcome, JobStatus};
use crate::services::{SpeechQuality, Voice};
use crate::text::normalize_chapter_text;
use crate::workflow::QueueError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
    #[serde(rename = "projectId")]
    pub project_id: Option<String>,
    #[serde(rename = "chapterId")]
    pub chapter_id: Option<String>,
}

/// POST /api/audiobook?action=queue body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub chapter_id: Option<String>,
    pub chapter_title: Option<String>,
    pub text: Option<String>,
    pub voice: Option<String>,
    pub quality: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// POST /api/audiobook
pub async fn post_audiobook(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
    body: Result<Json<QueueRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    match query.action.as_deref() {
        Some("queue") => {}
        Some(other) => return Err(ApiError::BadRequest(format!("Unknown action: {}", other))),
        None => return Err(ApiError::BadRequest("Missing action".to_string())),
    }

    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    queue_chapter(state, request).await
}

async fn queue_chapter(state: AppState, request: QueueRequest) -> ApiResult<impl IntoResponse> {
    let (Some(user_id), Some(project_id), Some(chapter_id), Some(raw_text)) = (
        required(request.user_id),
        required(request.project_id),
        required(request.chapter_id),
        required(request.text),
    ) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };

    let voice = match request.voice.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(voice) => voice.parse::<Voice>().map_err(ApiError::BadRequest)?,
        None => Voice::default(),
    };
    let quality = match request.quality.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(quality) => quality.parse::<SpeechQuality>().map_err(ApiError::BadRequest)?,
        None => SpeechQuality::default(),
    };

    let text = normalize_chapter_text(&raw_text);
    if text.is_empty() {
        return Err(ApiError::BadRequest("Chapter has no readable text".to_string()));
    }

    let chunks = state.chunker.split(&text);
    let chunk_count = chunks.len();
    let chapter_title = request
        .chapter_title
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    reserve_chapter(&state, &user_id).await?;

    let job = AudiobookJob::new(
        user_id.clone(),
        project_id.clone(),
        chapter_id.clone(),
        chapter_title,
        chunks,
        voice,
        quality,
    );
    let job_id = job.job_id.clone();

    if let Err(e) = submit(&state, &project_id, &chapter_id, job).await {
        release_chapter(&state, &user_id).await;
        return Err(e);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "jobId": job_id,
            "status": "queued",
            "chunks": chunk_count,
        })),
    ))
}

/// Take one audiobook chapter from the user's quota, creating a free-tier
/// profile on first use
async fn reserve_chapter(state: &AppState, user_id: &str) -> ApiResult<()> {
    let profile = profiles::ensure_profile(&state.db, user_id, SubscriptionTier::Free).await?;

    match profiles::increment_usage(&state.db, user_id, UsageKind::AudiobookChapter).await? {
        IncrementOutcome::Incremented { .. } => Ok(()),
        IncrementOutcome::LimitReached { limit, used } => {
            tracing::info!(user_id, limit, used, "Audiobook chapter quota exhausted");
            Err(ApiError::Forbidden(format!(
                "Audiobook chapter limit reached for {} tier",
                profile.tier
            )))
        }
    }
}

async fn release_chapter(state: &AppState, user_id: &str) {
    if let Err(e) = profiles::release_usage(&state.db, user_id, UsageKind::AudiobookChapter).await {
        tracing::warn!(user_id, error = %e, "Failed to release chapter reservation");
    }
}

/// Clear the chapter's previous record and hand the job to the worker
///
/// A re-run reports "processing" until its own terminal record lands. If the
/// queue turns the job away the previous record is put back.
async fn submit(
    state: &AppState,
    project_id: &str,
    chapter_id: &str,
    job: AudiobookJob,
) -> ApiResult<()> {
    let previous = jobs::load_record(&state.db, project_id, chapter_id).await?;
    jobs::delete_record(&state.db, project_id, chapter_id).await?;

    let Err(e) = state.queue.enqueue(job) else {
        return Ok(());
    };

    if let Some(previous) = previous {
        jobs::save_record(&state.db, &previous).await?;
    }
    Err(match e {
        QueueError::Full => ApiError::Unavailable("Audiobook queue is full, retry later".to_string()),
        QueueError::Closed => ApiError::Unavailable("Audiobook service is shutting down".to_string()),
    })
}

/// GET /api/audiobook
pub async fn get_audiobook(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> ApiResult<Json<JobStatus>> {
    match query.action.as_deref() {
        Some("status") => {}
        Some(other) => return Err(ApiError::BadRequest(format!("Unknown action: {}", other))),
        None => return Err(ApiError::BadRequest("Missing action".to_string())),
    }

    let (Some(project_id), Some(chapter_id)) =
        (required(query.project_id), required(query.chapter_id))
    else {
        return Err(ApiError::BadRequest(
            "Missing projectId or chapterId".to_string(),
        ));
    };

    let record = jobs::load_record(&state.db, &project_id, &chapter_id).await?;
    Ok(Json(JobStatus::from_record(record.as_ref())))
}

/// Build audiobook routes
pub fn audiobook_routes() -> Router<AppState> {
    Router::new().route("/api/audiobook", get(get_audiobook).post(post_audiobook))
}
