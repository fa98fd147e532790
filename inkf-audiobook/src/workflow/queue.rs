//! Background job queue
//!
//! A bounded channel feeds a single worker task that runs jobs one at a time
//! in arrival order. The worker stops when the cancellation token fires,
//! after finishing the job in hand; jobs still waiting are dropped and their
//! quota reservations released.

use chrono::Utc;
use inkf_common::events::{EventBus, InkEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::pipeline::AudiobookPipeline;
use crate::models::AudiobookJob;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Audiobook queue is full")]
    Full,

    #[error("Audiobook queue is shut down")]
    Closed,
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<AudiobookJob>,
    depth: Arc<AtomicUsize>,
    event_bus: EventBus,
}

impl JobQueue {
    /// Spawn the worker and return the queue handle plus the worker's handle
    pub fn start(
        pipeline: Arc<AudiobookPipeline>,
        capacity: usize,
        event_bus: EventBus,
        cancel_token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let depth = Arc::new(AtomicUsize::new(0));

        let worker = tokio::spawn(run_worker(pipeline, rx, depth.clone(), cancel_token));

        (
            Self {
                tx,
                depth,
                event_bus,
            },
            worker,
        )
    }

    /// Hand a job to the worker without waiting
    pub fn enqueue(&self, job: AudiobookJob) -> Result<(), QueueError> {
        let job_id = job.job_id.clone();
        let user_id = job.user_id.clone();
        let chunk_count = job.chunks.len();

        self.depth.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.tx.try_send(job) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            });
        }

        tracing::info!(job_id = %job_id, chunks = chunk_count, "Audiobook job queued");
        self.event_bus.emit_lossy(InkEvent::AudiobookJobQueued {
            job_id,
            user_id,
            chunk_count,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Jobs accepted but not yet picked up by the worker
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn run_worker(
    pipeline: Arc<AudiobookPipeline>,
    mut rx: mpsc::Receiver<AudiobookJob>,
    depth: Arc<AtomicUsize>,
    cancel_token: CancellationToken,
) {
    tracing::info!("Audiobook worker started");

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        depth.fetch_sub(1, Ordering::SeqCst);

        // Failures are recorded and logged by the pipeline itself
        let _ = pipeline.run(&job).await;
    }

    rx.close();
    let mut dropped = 0usize;
    while let Ok(job) = rx.try_recv() {
        depth.fetch_sub(1, Ordering::SeqCst);
        pipeline.release_chapter(&job).await;
        dropped += 1;
    }
    if dropped > 0 {
        tracing::warn!(dropped, "Audiobook worker stopped with jobs still queued");
    }
    tracing::info!("Audiobook worker stopped");
}
