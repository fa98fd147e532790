//! Audiobook pipeline
//!
//! Runs one job end to end: synthesize every chunk, merge the audio, upload
//! the merged file and write the terminal job record.
//!
//! # Error Handling
//! - Each step runs under the [`RetryPolicy`]; only transient errors retry
//! - A job that fails after retries still gets a terminal record, carrying
//!   the error, so pollers stop waiting
//! - The chapter was reserved against the user's quota when it was queued;
//!   a failed job gives that reservation back

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use inkf_common::events::{EventBus, InkEvent};
use inkf_common::UsageKind;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::db::{jobs, profiles};
use crate::models::{AudiobookJob, AudiobookJobRecord};
use crate::services::{
    audiobook_key, merge_buffers, ObjectStore, SpeechError, SpeechSynthesizer, StorageError,
};
use crate::utils::{RetryPolicy, Retryable};

const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Job has no text to synthesize")]
    NoChunks,

    #[error("Synthesis failed for chunk {chunk}: {source}")]
    Synthesis {
        chunk: usize,
        #[source]
        source: SpeechError,
    },

    #[error("Upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Recording result failed: {0}")]
    Record(#[from] inkf_common::Error),
}

impl PipelineError {
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::NoChunks => false,
            PipelineError::Synthesis { source, .. } => source.is_transient(),
            PipelineError::Upload(e) => e.is_transient(),
            PipelineError::Record(e) => Retryable::is_transient(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    /// Chunks synthesized at once; 1 keeps requests strictly sequential
    pub synthesis_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            synthesis_concurrency: 1,
        }
    }
}

pub struct AudiobookPipeline {
    db: SqlitePool,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ObjectStore>,
    event_bus: EventBus,
    config: PipelineConfig,
}

impl AudiobookPipeline {
    pub fn new(
        db: SqlitePool,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn ObjectStore>,
        event_bus: EventBus,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            synthesizer,
            store,
            event_bus,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a job and record its outcome, success or failure
    pub async fn run(&self, job: &AudiobookJob) -> Result<AudiobookJobRecord, PipelineError> {
        info!(
            job_id = %job.job_id,
            chunks = job.chunks.len(),
            voice = %job.voice,
            model = job.quality.model(),
            "Audiobook job started"
        );

        match self.execute(job).await {
            Ok(record) => {
                let audio_url = record.audio_url.clone().unwrap_or_default();
                let audio_size = record.audio_size.unwrap_or_default();
                info!(job_id = %job.job_id, bytes = audio_size, url = %audio_url, "Audiobook job completed");

                self.event_bus.emit_lossy(InkEvent::AudiobookJobCompleted {
                    job_id: job.job_id.clone(),
                    audio_url,
                    audio_size,
                    timestamp: Utc::now(),
                });
                Ok(record)
            }
            Err(e) => {
                error!(job_id = %job.job_id, error = %e, "Audiobook job failed");
                // Released first so a poller that sees "failed" sees the refund too
                self.release_chapter(job).await;
                self.record_failure(job, &e).await;

                self.event_bus.emit_lossy(InkEvent::AudiobookJobFailed {
                    job_id: job.job_id.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Synthesize, merge, upload, record
    async fn execute(&self, job: &AudiobookJob) -> Result<AudiobookJobRecord, PipelineError> {
        if job.chunks.is_empty() {
            return Err(PipelineError::NoChunks);
        }

        let buffers = self.synthesize_all(job).await?;
        let merged = merge_buffers(&buffers);
        debug!(job_id = %job.job_id, bytes = merged.len(), "Merged chunk audio");

        let key = audiobook_key(&job.user_id, &job.project_id, &job.chapter_id);
        let stored = self
            .config
            .retry
            .run("upload", &job.job_id, || {
                self.store.put(&key, &merged, AUDIO_CONTENT_TYPE)
            })
            .await?;

        let record = AudiobookJobRecord::completed(job, stored.url, stored.size);
        self.config
            .retry
            .run("record", &job.job_id, || jobs::save_record(&self.db, &record))
            .await?;

        Ok(record)
    }

    /// Audio for every chunk, in chunk order
    async fn synthesize_all(&self, job: &AudiobookJob) -> Result<Vec<Vec<u8>>, PipelineError> {
        let concurrency = self.config.synthesis_concurrency.max(1);

        if concurrency == 1 {
            let mut buffers = Vec::with_capacity(job.chunks.len());
            for index in 0..job.chunks.len() {
                buffers.push(self.synthesize_chunk(job, index).await?);
            }
            return Ok(buffers);
        }

        // `buffered` yields in input order regardless of completion order
        stream::iter(0..job.chunks.len())
            .map(|index| self.synthesize_chunk(job, index))
            .buffered(concurrency)
            .try_collect()
            .await
    }

    async fn synthesize_chunk(
        &self,
        job: &AudiobookJob,
        index: usize,
    ) -> Result<Vec<u8>, PipelineError> {
        let text = job.chunks[index].as_str();
        let step = format!("synthesize chunk {}", index);

        let audio = self
            .config
            .retry
            .run(&step, &job.job_id, || {
                self.synthesizer.synthesize(text, job.voice, job.quality)
            })
            .await
            .map_err(|source| PipelineError::Synthesis {
                chunk: index,
                source,
            })?;

        debug!(
            job_id = %job.job_id,
            chunk = index,
            bytes = audio.len(),
            "Chunk synthesized"
        );

        self.event_bus.emit_lossy(InkEvent::AudiobookChunkSynthesized {
            job_id: job.job_id.clone(),
            chunk_index: index,
            chunk_count: job.chunks.len(),
            bytes: audio.len(),
            timestamp: Utc::now(),
        });

        Ok(audio)
    }

    async fn record_failure(&self, job: &AudiobookJob, cause: &PipelineError) {
        let record = AudiobookJobRecord::failed(job, cause.to_string());
        let saved = self
            .config
            .retry
            .run("record failure", &job.job_id, || {
                jobs::save_record(&self.db, &record)
            })
            .await;

        if let Err(e) = saved {
            error!(job_id = %job.job_id, error = %e, "Could not record job failure");
        }
    }

    /// Return the quota reservation taken when `job` was queued
    pub async fn release_chapter(&self, job: &AudiobookJob) {
        match profiles::release_usage(&self.db, &job.user_id, UsageKind::AudiobookChapter).await {
            Ok(true) => debug!(job_id = %job.job_id, user_id = %job.user_id, "Chapter reservation released"),
            Ok(false) => warn!(job_id = %job.job_id, user_id = %job.user_id, "No chapter reservation to release"),
            Err(e) => warn!(job_id = %job.job_id, error = %e, "Failed to release chapter reservation"),
        }
    }
}
