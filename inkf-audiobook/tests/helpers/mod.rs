//! Shared fixtures for inkf-audiobook integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use inkf_audiobook::services::{
    LocalObjectStore, SpeechError, SpeechQuality, SpeechSynthesizer, Voice,
};
use inkf_audiobook::text::Chunker;
use inkf_audiobook::workflow::{AudiobookPipeline, JobQueue, PipelineConfig, RetryPolicy};
use inkf_audiobook::{build_router, AppState, StripeConfig};
use inkf_common::db::init_in_memory;
use inkf_common::events::EventBus;
use inkf_common::SubscriptionTier;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const PUBLIC_BASE_URL: &str = "http://audio.test";
pub const CREATOR_PRICE: &str = "price_creator_monthly";

/// Speech double: audio is the chunk text bytes, calls are recorded
pub struct FakeSynthesizer {
    pub calls: Mutex<Vec<(String, Voice, SpeechQuality)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Fail every call with this HTTP status
    fail_status: Option<u16>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_status: None,
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: Voice,
        quality: SpeechQuality,
    ) -> Result<Vec<u8>, SpeechError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice, quality));

        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.fail_status {
            Some(status) => Err(SpeechError::Api {
                status,
                body: "synthetic failure".to_string(),
            }),
            None => Ok(text.as_bytes().to_vec()),
        }
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub db: SqlitePool,
    pub synth: Arc<FakeSynthesizer>,
    pub files: TempDir,
    pub token: CancellationToken,
    pub worker: JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_synth(FakeSynthesizer::new()).await
    }

    pub async fn with_synth(synth: FakeSynthesizer) -> Self {
        Self::build(synth, Some(WEBHOOK_SECRET.to_string())).await
    }

    pub async fn build(synth: FakeSynthesizer, webhook_secret: Option<String>) -> Self {
        let db = init_in_memory().await.unwrap();
        let files = TempDir::new().unwrap();
        let synth = Arc::new(synth);
        let event_bus = EventBus::new(100);

        let pipeline = Arc::new(AudiobookPipeline::new(
            db.clone(),
            synth.clone(),
            Arc::new(LocalObjectStore::new(files.path(), PUBLIC_BASE_URL)),
            event_bus.clone(),
            PipelineConfig {
                retry: RetryPolicy {
                    max_retries: 2,
                    initial_backoff: Duration::from_millis(1),
                    max_backoff: Duration::from_millis(2),
                },
                synthesis_concurrency: 1,
            },
        ));

        let token = CancellationToken::new();
        let (queue, worker) = JobQueue::start(pipeline, 16, event_bus.clone(), token.clone());

        let stripe = StripeConfig {
            webhook_secret,
            price_tiers: HashMap::from([(CREATOR_PRICE.to_string(), SubscriptionTier::Creator)]),
        };

        let state = AppState::new(
            db.clone(),
            event_bus,
            queue,
            Chunker::default(),
            stripe,
            files.path().to_path_buf(),
        );
        let app = build_router(state.clone());

        Self {
            app,
            state,
            db,
            synth,
            files,
            token,
            worker,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn queue(&self, body: Value) -> (StatusCode, Value) {
        self.send_json("POST", "/api/audiobook?action=queue", body)
            .await
    }

    pub async fn status(&self, project_id: &str, chapter_id: &str) -> (StatusCode, Value) {
        self.get(&format!(
            "/api/audiobook?action=status&projectId={}&chapterId={}",
            project_id, chapter_id
        ))
        .await
    }

    /// Poll the status endpoint until it leaves "processing"
    pub async fn wait_for_terminal_status(&self, project_id: &str, chapter_id: &str) -> Value {
        for _ in 0..400 {
            let (status, body) = self.status(project_id, chapter_id).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] != "processing" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {}_{} never finished", project_id, chapter_id);
    }
}

pub fn queue_body(project_id: &str, chapter_id: &str, text: &str) -> Value {
    serde_json::json!({
        "userId": "user-1",
        "projectId": project_id,
        "chapterId": chapter_id,
        "chapterTitle": "Chapter One",
        "text": text,
        "voice": "nova",
        "quality": "hd",
    })
}

/// Roughly `chars` characters of sentence-terminated prose
pub fn long_chapter(chars: usize) -> String {
    let mut text = String::new();
    let mut i = 0;
    while text.chars().count() < chars {
        text.push_str(&format!(
            "This is sentence {} of a long chapter that goes on for a while. ",
            i
        ));
        i += 1;
    }
    let mut text: String = text.chars().take(chars).collect();
    // Keep the final sentence terminated
    text.pop();
    text.push('.');
    text
}
