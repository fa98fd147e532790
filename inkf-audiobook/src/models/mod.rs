//! Data models for inkf-audiobook

pub mod job;
pub mod profile;

pub use job::{job_key, AudiobookJob, AudiobookJobRecord, JobStatus};
pub use profile::{IncrementOutcome, SubscriptionUpdate, UserProfile};
