//! Background audiobook generation
//!
//! Jobs flow from the HTTP queue endpoint through [`JobQueue`] to a single
//! worker that runs each through the [`AudiobookPipeline`]:
//! synthesize (per chunk) → merge → upload → record.

pub mod pipeline;
pub mod queue;

pub use pipeline::{AudiobookPipeline, PipelineConfig, PipelineError};
pub use queue::{JobQueue, QueueError};
pub use crate::utils::retry::{RetryPolicy, Retryable};
