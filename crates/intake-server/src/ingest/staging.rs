//! Staged import files
//!
//! Uploaded files are parked on local disk between preview and confirm.
//! Handles are UUIDs, and the handle is the only thing that leaves the server,
//! so a confirm request can never name an arbitrary path.

use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Handle to one staged upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedFileId(Uuid);

impl StagedFileId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for StagedFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for StagedFileId {
    type Err = StagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(StagedFileId)
            .map_err(|_| StagingError::InvalidHandle(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("upload exceeds the {limit} byte size cap ({size} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("upload is empty")]
    Empty,

    #[error("not a staged-file handle: {0}")]
    InvalidHandle(String),

    #[error("staged file not found: {0}")]
    NotFound(StagedFileId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Staging area rooted at one directory
#[derive(Debug, Clone)]
pub struct StagedFiles {
    dir: PathBuf,
    max_bytes: usize,
}

impl StagedFiles {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    /// Ensure the staging directory exists. Called once at startup.
    pub async fn init(&self) -> Result<(), StagingError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Park an upload and hand back its handle.
    pub async fn stage(&self, content: &[u8]) -> Result<StagedFileId, StagingError> {
        if content.is_empty() {
            return Err(StagingError::Empty);
        }
        if content.len() > self.max_bytes {
            return Err(StagingError::TooLarge {
                size: content.len(),
                limit: self.max_bytes,
            });
        }

        let id = StagedFileId::new();
        tokio::fs::write(self.path(id), content).await?;
        tracing::debug!(handle = %id, bytes = content.len(), "upload staged");
        Ok(id)
    }

    pub fn path(&self, id: StagedFileId) -> PathBuf {
        self.dir.join(format!("{id}.csv"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn exists(&self, id: StagedFileId) -> bool {
        tokio::fs::try_exists(self.path(id)).await.unwrap_or(false)
    }

    /// Remove a staged file. Losing a race to another remover is fine.
    pub async fn release(&self, id: StagedFileId) {
        match tokio::fs::remove_file(self.path(id)).await {
            Ok(()) => tracing::debug!(handle = %id, "staged file released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(handle = %id, error = %e, "failed to release staged file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging(max: usize) -> (tempfile::TempDir, StagedFiles) {
        let dir = tempfile::tempdir().unwrap();
        let files = StagedFiles::new(dir.path(), max);
        (dir, files)
    }

    #[tokio::test]
    async fn test_stage_and_release_roundtrip() {
        let (_guard, files) = staging(1024);

        let id = files.stage(b"a,b,c\n1,2,3\n").await.unwrap();
        assert!(files.exists(id).await);

        let content = tokio::fs::read(files.path(id)).await.unwrap();
        assert_eq!(content, b"a,b,c\n1,2,3\n");

        files.release(id).await;
        assert!(!files.exists(id).await);
    }

    #[tokio::test]
    async fn test_size_cap_enforced() {
        let (_guard, files) = staging(8);
        let result = files.stage(b"way past the cap").await;
        assert!(matches!(result, Err(StagingError::TooLarge { .. })));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (_guard, files) = staging(8);
        assert!(matches!(files.stage(b"").await, Err(StagingError::Empty)));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (_guard, files) = staging(1024);
        let id = files.stage(b"x\n").await.unwrap();
        files.release(id).await;
        files.release(id).await;
    }

    #[test]
    fn test_handle_rejects_path_traversal() {
        assert!("../../etc/passwd".parse::<StagedFileId>().is_err());
        assert!("not-a-uuid".parse::<StagedFileId>().is_err());

        let id = StagedFileId::new();
        let parsed: StagedFileId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
