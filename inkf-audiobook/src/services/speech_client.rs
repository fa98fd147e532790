//! OpenAI text-to-speech client
//!
//! One `POST /v1/audio/speech` per chunk; the response body is the MP3.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SPEECH_BASE_URL: &str = "https://api.openai.com";
const SPEECH_PATH: &str = "/v1/audio/speech";
const USER_AGENT: &str = concat!("inkf-audiobook/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// Upper bound on how much of an error body is kept
const MAX_ERROR_BODY: usize = 500;

/// Speech client errors
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Speech API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Speech API returned no audio")]
    EmptyAudio,

    #[error("Invalid API key")]
    InvalidApiKey,
}

impl SpeechError {
    /// Rate limiting, server-side failures and dropped connections are worth
    /// another attempt; rejected input or credentials are not
    pub fn is_transient(&self) -> bool {
        match self {
            SpeechError::Network(_) | SpeechError::EmptyAudio => true,
            SpeechError::Api { status, .. } => *status == 429 || *status >= 500,
            SpeechError::InvalidApiKey => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Onyx => "onyx",
            Voice::Nova => "nova",
            Voice::Shimmer => "shimmer",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alloy" => Ok(Voice::Alloy),
            "echo" => Ok(Voice::Echo),
            "fable" => Ok(Voice::Fable),
            "onyx" => Ok(Voice::Onyx),
            "nova" => Ok(Voice::Nova),
            "shimmer" => Ok(Voice::Shimmer),
            other => Err(format!("Unknown voice: {}", other)),
        }
    }
}

/// Model selection: `standard` → tts-1, `hd` → tts-1-hd
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechQuality {
    #[default]
    Standard,
    Hd,
}

impl SpeechQuality {
    pub fn model(&self) -> &'static str {
        match self {
            SpeechQuality::Standard => "tts-1",
            SpeechQuality::Hd => "tts-1-hd",
        }
    }
}

impl FromStr for SpeechQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(SpeechQuality::Standard),
            "hd" => Ok(SpeechQuality::Hd),
            other => Err(format!("Unknown quality: {}", other)),
        }
    }
}

/// Anything that turns one chunk of text into audio bytes
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: Voice,
        quality: SpeechQuality,
    ) -> Result<Vec<u8>, SpeechError>;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// OpenAI speech API client
pub struct OpenAiSpeechClient {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiSpeechClient {
    pub fn new(api_key: String, base_url: Option<&str>) -> Result<Self, SpeechError> {
        if api_key.trim().is_empty() {
            return Err(SpeechError::InvalidApiKey);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SpeechError::Network(e.to_string()))?;

        let base_url = base_url.unwrap_or(DEFAULT_SPEECH_BASE_URL).trim_end_matches('/');

        Ok(Self {
            http_client,
            api_key,
            endpoint: format!("{}{}", base_url, SPEECH_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechClient {
    async fn synthesize(
        &self,
        text: &str,
        voice: Voice,
        quality: SpeechQuality,
    ) -> Result<Vec<u8>, SpeechError> {
        let request = SpeechRequest {
            model: quality.model(),
            input: text,
            voice: voice.as_str(),
            response_format: "mp3",
        };

        tracing::debug!(
            model = request.model,
            voice = request.voice,
            chars = text.chars().count(),
            "Requesting speech synthesis"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SpeechError::InvalidApiKey);
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(SpeechError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Network(e.to_string()))?;

        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_parsing() {
        assert_eq!("nova".parse::<Voice>().unwrap(), Voice::Nova);
        assert_eq!(" Shimmer ".parse::<Voice>().unwrap(), Voice::Shimmer);
        assert!("robot".parse::<Voice>().is_err());
        assert_eq!(Voice::default(), Voice::Alloy);
    }

    #[test]
    fn test_quality_selects_model() {
        assert_eq!(SpeechQuality::Standard.model(), "tts-1");
        assert_eq!(SpeechQuality::Hd.model(), "tts-1-hd");
        assert_eq!("HD".parse::<SpeechQuality>().unwrap(), SpeechQuality::Hd);
        assert!("ultra".parse::<SpeechQuality>().is_err());
    }

    #[test]
    fn test_transient_classification() {
        assert!(SpeechError::Network("reset".into()).is_transient());
        assert!(SpeechError::EmptyAudio.is_transient());
        assert!(SpeechError::Api { status: 429, body: String::new() }.is_transient());
        assert!(SpeechError::Api { status: 503, body: String::new() }.is_transient());
        assert!(!SpeechError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!SpeechError::InvalidApiKey.is_transient());
    }

    #[test]
    fn test_client_endpoint_and_empty_key() {
        let client = OpenAiSpeechClient::new("sk-test".into(), Some("http://127.0.0.1:9/")).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/v1/audio/speech");

        assert!(matches!(
            OpenAiSpeechClient::new("  ".into(), None),
            Err(SpeechError::InvalidApiKey)
        ));
    }
}
