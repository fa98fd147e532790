//! Audiobook jobs, their terminal records, and the polling status derived
//! from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::speech_client::{SpeechQuality, Voice};

/// Key of the one record kept per chapter
pub fn job_key(project_id: &str, chapter_id: &str) -> String {
    format!("{}_{}", project_id, chapter_id)
}

/// Work item handed to the job queue
#[derive(Debug, Clone)]
pub struct AudiobookJob {
    pub job_id: String,
    pub user_id: String,
    pub project_id: String,
    pub chapter_id: String,
    pub chapter_title: String,
    /// Normalized text, already split under the speech input limit
    pub chunks: Vec<String>,
    pub voice: Voice,
    pub quality: SpeechQuality,
    pub queued_at: DateTime<Utc>,
}

impl AudiobookJob {
    pub fn new(
        user_id: String,
        project_id: String,
        chapter_id: String,
        chapter_title: String,
        chunks: Vec<String>,
        voice: Voice,
        quality: SpeechQuality,
    ) -> Self {
        Self {
            job_id: job_key(&project_id, &chapter_id),
            user_id,
            project_id,
            chapter_id,
            chapter_title,
            chunks,
            voice,
            quality,
            queued_at: Utc::now(),
        }
    }
}

/// Terminal record of one generation, written once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudiobookJobRecord {
    pub job_key: String,
    pub project_id: String,
    pub chapter_id: String,
    pub chapter_title: String,
    pub user_id: String,
    pub audio_url: Option<String>,
    pub audio_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl AudiobookJobRecord {
    pub fn completed(job: &AudiobookJob, audio_url: String, audio_size: u64) -> Self {
        Self {
            job_key: job.job_id.clone(),
            project_id: job.project_id.clone(),
            chapter_id: job.chapter_id.clone(),
            chapter_title: job.chapter_title.clone(),
            user_id: job.user_id.clone(),
            audio_url: Some(audio_url),
            audio_size: Some(audio_size),
            error: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(job: &AudiobookJob, error: String) -> Self {
        Self {
            job_key: job.job_id.clone(),
            project_id: job.project_id.clone(),
            chapter_id: job.chapter_id.clone(),
            chapter_title: job.chapter_title.clone(),
            user_id: job.user_id.clone(),
            audio_url: None,
            audio_size: None,
            error: Some(error),
            completed_at: Utc::now(),
        }
    }
}

/// Status reported to polling clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed {
        #[serde(rename = "audioUrl")]
        audio_url: String,
        #[serde(rename = "audioSize")]
        audio_size: Option<u64>,
        #[serde(rename = "chapterTitle")]
        chapter_title: String,
        #[serde(rename = "completedAt")]
        completed_at: DateTime<Utc>,
    },
    Failed {
        error: String,
    },
}

impl JobStatus {
    /// No record or a record with neither field set means the job is still
    /// running. A URL wins over an error.
    pub fn from_record(record: Option<&AudiobookJobRecord>) -> Self {
        let Some(record) = record else {
            return JobStatus::Processing;
        };

        if let Some(audio_url) = &record.audio_url {
            return JobStatus::Completed {
                audio_url: audio_url.clone(),
                audio_size: record.audio_size,
                chapter_title: record.chapter_title.clone(),
                completed_at: record.completed_at,
            };
        }

        match &record.error {
            Some(error) => JobStatus::Failed {
                error: error.clone(),
            },
            None => JobStatus::Processing,
        }
    }
}
