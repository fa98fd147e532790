//! Services for inkf-audiobook

pub mod merger;
pub mod speech_client;
pub mod storage;
pub mod stripe;
pub mod subscriptions;

pub use merger::merge_buffers;
pub use speech_client::{OpenAiSpeechClient, SpeechError, SpeechQuality, SpeechSynthesizer, Voice};
pub use storage::{audiobook_key, LocalObjectStore, ObjectStore, StorageError, StoredObject};
