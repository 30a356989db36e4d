//! Request-scoped temporary copies of uploaded images.

use crate::Result;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TempFileStore {
    dir: PathBuf,
}

/// A persisted upload. The file is deleted when the handle is released or
/// dropped, whichever happens first, and never twice.
#[derive(Debug)]
pub struct TempImage {
    path: Option<PathBuf>,
}

impl TempFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` to a fresh, uniquely named file in the store directory,
    /// creating the directory when needed.
    pub async fn acquire(&self, bytes: &[u8], extension: &str) -> Result<TempImage> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self
            .dir
            .join(format!("{}.{}", Uuid::new_v4().simple(), extension));

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let handle = TempImage {
            path: Some(path.clone()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!("Temporary file created: {}", path.display());
        Ok(handle)
    }
}

impl TempImage {
    pub fn path(&self) -> &Path {
        self.path
            .as_deref()
            .unwrap_or_else(|| Path::new(""))
    }

    /// Deletes the file now. Failures are logged, never returned.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => info!("Temporary file deleted: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Temporary file already gone: {}", path.display());
            }
            Err(e) => warn!(
                "Failed to delete temporary file: {} - {}",
                path.display(),
                e
            ),
        }
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        self.remove();
    }
}
