//! Utility modules for inkf-audiobook

pub mod retry;

pub use retry::{RetryPolicy, Retryable};
