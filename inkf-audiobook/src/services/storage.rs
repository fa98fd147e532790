//! Object storage for generated audio
//!
//! The local store lays objects out under a directory that the HTTP server
//! exposes read-only at `/files`, so an object's key is also its URL path.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;
}

/// Key for a chapter's narration: `audiobooks/{user}/{project}/{chapter}.mp3`
pub fn audiobook_key(user_id: &str, project_id: &str, chapter_id: &str) -> String {
    format!(
        "audiobooks/{}/{}/{}.mp3",
        encode_segment(user_id),
        encode_segment(project_id),
        encode_segment(chapter_id)
    )
}

/// Map an id to a single path segment, one-to-one
///
/// Plain `[A-Za-z0-9_-]` ids pass through. Anything else becomes `~` plus
/// the hex of its bytes; `~` never appears in a plain id, so two distinct
/// ids cannot share a segment.
fn encode_segment(id: &str) -> String {
    let plain = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if plain {
        id.to_string()
    } else {
        format!("~{}", hex::encode(id.as_bytes()))
    }
}

/// Filesystem-backed store under `{root}/files`
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/files/{}", self.public_base_url, key)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write next to the target and rename so readers never see a partial file
        let tmp_path = path.with_extension("part");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::debug!(
            key = %key,
            bytes = bytes.len(),
            content_type = %content_type,
            "Stored object"
        );

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            size: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_audiobook_key_layout() {
        assert_eq!(
            audiobook_key("user-1", "proj_2", "ch3"),
            "audiobooks/user-1/proj_2/ch3.mp3"
        );
    }

    #[test]
    fn test_audiobook_key_encodes_path_tricks() {
        let key = audiobook_key("../etc", "a/b", "");
        assert_eq!(key, "audiobooks/~2e2e2f657463/~612f62/~.mp3");
        assert!(Path::new(&key)
            .components()
            .all(|c| matches!(c, Component::Normal(_))));
    }

    #[test]
    fn test_distinct_ids_never_share_a_key() {
        let ids = ["u.1", "u_1", "u 1", "u/1", "~75_31", "", "_", "~", "é"];
        let keys: std::collections::HashSet<_> =
            ids.iter().map(|id| audiobook_key(id, id, "c1")).collect();
        assert_eq!(keys.len(), ids.len());

        assert_ne!(
            audiobook_key("u.1", "p.1", "c1"),
            audiobook_key("u_1", "p_1", "c1")
        );
    }

    #[tokio::test]
    async fn test_put_writes_file_and_returns_url() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:5810/");

        let stored = store
            .put("audiobooks/u/p/c.mp3", b"ID3audio", "audio/mpeg")
            .await
            .unwrap();

        assert_eq!(stored.url, "http://localhost:5810/files/audiobooks/u/p/c.mp3");
        assert_eq!(stored.size, 8);
        let on_disk = std::fs::read(dir.path().join("audiobooks/u/p/c.mp3")).unwrap();
        assert_eq!(on_disk, b"ID3audio");
        assert!(!dir.path().join("audiobooks/u/p/c.part").exists());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_object() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://h");

        store.put("a/b.mp3", b"old", "audio/mpeg").await.unwrap();
        store.put("a/b.mp3", b"newer", "audio/mpeg").await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("a/b.mp3")).unwrap(), b"newer");
    }

    #[tokio::test]
    async fn test_put_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://h");

        let err = store.put("../outside.mp3", b"x", "audio/mpeg").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(!err.is_transient());
    }
}
