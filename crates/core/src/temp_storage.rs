use crate::error::IngestError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

/// Hands out per-batch scratch directories under one root.
#[derive(Debug, Clone)]
pub struct TempStorage {
    root: PathBuf,
}

impl TempStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create_batch_scope(&self) -> Result<BatchScope, IngestError> {
        let dir = tempfile::Builder::new()
            .prefix("batch-")
            .tempdir_in(&self.root)?;
        debug!(path = %dir.path().display(), "created batch directory");
        Ok(BatchScope { dir: Some(dir) })
    }

    /// Copies the whole stream to `destination` and returns the byte count.
    pub async fn persist<R>(&self, upload: &mut R, destination: &Path) -> Result<u64, IngestError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut file = tokio::fs::File::create(destination).await?;
        let written = tokio::io::copy(upload, &mut file).await?;
        file.flush().await?;
        Ok(written)
    }
}

/// Scratch directory owned by a single upload batch.
///
/// The directory and everything under it is removed when the scope is
/// dropped. A failed removal is logged and swallowed.
#[derive(Debug)]
pub struct BatchScope {
    dir: Option<TempDir>,
}

impl BatchScope {
    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Destination for an uploaded file inside this scope. Only the final
    /// path component of the client supplied name is kept.
    pub fn file_path(&self, file_name: &str) -> Result<PathBuf, IngestError> {
        let base = Path::new(file_name)
            .file_name()
            .ok_or(crate::ValidationError::MissingFileName)?;
        Ok(self.path().join(base))
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => debug!(path = %path.display(), "removed batch directory"),
            Err(error) => warn!(path = %path.display(), %error, "could not remove batch directory"),
        }
    }
}
