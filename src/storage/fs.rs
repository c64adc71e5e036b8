use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::BlobStore;
use crate::error::StorageError;

/// Spool directory laid out as `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object path. Bucket and key must each be a single plain
    /// path segment; anything else cannot exist in the spool.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        for segment in [bucket, key] {
            if !is_plain_segment(segment) {
                debug!(bucket, key, "Rejecting object path that is not a plain segment");
                return Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

fn is_plain_segment(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !segment.contains(['/', '\\'])
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        debug!(path = %path.display(), "Reading spooled message");

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => StorageError::Transport {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spool_with(bucket: &str, key: &str, bytes: &[u8]) -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(bucket)).unwrap();
        std::fs::write(dir.path().join(bucket).join(key), bytes).unwrap();
        let store = FsBlobStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn reads_object_from_bucket_directory() {
        let (_dir, store) = spool_with("inbox", "abc123", b"Subject: hi\r\n\r\nbody");
        let bytes = store.get("inbox", "abc123").await.unwrap();
        assert_eq!(bytes, b"Subject: hi\r\n\r\nbody");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (_dir, store) = spool_with("inbox", "abc123", b"x");
        let err = store.get("inbox", "nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { ref key, .. } if key == "nope"));
    }

    #[tokio::test]
    async fn traversal_rejected() {
        let (_dir, store) = spool_with("inbox", "abc123", b"x");
        for key in ["../inbox/abc123", "a/b", "..", ".", ""] {
            let err = store.get("inbox", key).await.unwrap_err();
            assert!(
                matches!(err, StorageError::NotFound { .. }),
                "key {key:?} should be rejected"
            );
        }
        assert!(store.get("..", "abc123").await.is_err());
    }

    #[test]
    fn plain_segments() {
        assert!(is_plain_segment("0000014a-f4d4-4f8e"));
        assert!(is_plain_segment("mail.eml"));
        assert!(!is_plain_segment(".."));
        assert!(!is_plain_segment("/etc"));
        assert!(!is_plain_segment("a\\b"));
    }
}
