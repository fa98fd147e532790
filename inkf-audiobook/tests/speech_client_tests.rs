//! OpenAI speech client against a local stand-in server

use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use inkf_audiobook::services::{
    OpenAiSpeechClient, SpeechError, SpeechQuality, SpeechSynthesizer, Voice,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

/// Serve `app` on an ephemeral port and return its base URL
async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn recording_server(captured: Captured) -> Router {
    Router::new().route(
        "/v1/audio/speech",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let captured = captured.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                captured.lock().unwrap().push((auth, body));
                (
                    [("content-type", "audio/mpeg")],
                    b"ID3fake-mp3-bytes".to_vec(),
                )
            }
        }),
    )
}

#[tokio::test]
async fn test_request_shape_and_audio_bytes() {
    let captured: Captured = Arc::default();
    let base = spawn_server(recording_server(captured.clone())).await;
    let client = OpenAiSpeechClient::new("sk-test".into(), Some(&base)).unwrap();

    let audio = client
        .synthesize("Hello there.", Voice::Onyx, SpeechQuality::Hd)
        .await
        .unwrap();

    assert_eq!(audio, b"ID3fake-mp3-bytes");

    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "tts-1-hd");
    assert_eq!(body["input"], "Hello there.");
    assert_eq!(body["voice"], "onyx");
    assert_eq!(body["response_format"], "mp3");
}

async fn status_server(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().route(
        "/v1/audio/speech",
        post(move || async move { (status, body).into_response() }),
    );
    spawn_server(app).await
}

#[tokio::test]
async fn test_rate_limit_is_transient_api_error() {
    let base = status_server(StatusCode::TOO_MANY_REQUESTS, "slow down").await;
    let client = OpenAiSpeechClient::new("sk-test".into(), Some(&base)).unwrap();

    let err = client
        .synthesize("Hi.", Voice::Alloy, SpeechQuality::Standard)
        .await
        .unwrap_err();

    match &err {
        SpeechError::Api { status, body } => {
            assert_eq!(*status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_is_permanent() {
    let base = status_server(StatusCode::UNAUTHORIZED, "bad key").await;
    let client = OpenAiSpeechClient::new("sk-wrong".into(), Some(&base)).unwrap();

    let err = client
        .synthesize("Hi.", Voice::Alloy, SpeechQuality::Standard)
        .await
        .unwrap_err();

    assert!(matches!(err, SpeechError::InvalidApiKey));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_empty_body_is_empty_audio() {
    let base = status_server(StatusCode::OK, "").await;
    let client = OpenAiSpeechClient::new("sk-test".into(), Some(&base)).unwrap();

    let err = client
        .synthesize("Hi.", Voice::Alloy, SpeechQuality::Standard)
        .await
        .unwrap_err();

    assert!(matches!(err, SpeechError::EmptyAudio));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = OpenAiSpeechClient::new("sk-test".into(), Some(&base)).unwrap();
    let err = client
        .synthesize("Hi.", Voice::Alloy, SpeechQuality::Standard)
        .await
        .unwrap_err();

    assert!(matches!(err, SpeechError::Network(_)));
    assert!(err.is_transient());
}
