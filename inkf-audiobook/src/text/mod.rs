//! Text preparation for speech synthesis: HTML normalization and chunking

pub mod chunker;
pub mod normalize;

pub use chunker::{Chunker, OversizedSentence, DEFAULT_CHUNK_LIMIT};
pub use normalize::normalize_chapter_text;
