//! Scoped temp artifacts: decoded image bytes staged on disk for the
//! duration of a single relay call.
//!
//! An artifact is removed exactly once: by [`TempArtifact::release`] on the
//! normal path, or by `Drop` if the owning future returned early, panicked,
//! or was cancelled.

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to prepare scratch directory {path}: {source}")]
    ScratchDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create temp artifact {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write temp artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read temp artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("temp artifact task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Owned handle to one staged image file.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    /// Set once the file was opened by us; a handle never removes a path it
    /// did not create.
    created: bool,
    released: bool,
}

impl TempArtifact {
    /// Write `bytes` to a fresh `temp_<uuid>.jpg` inside `dir`.
    ///
    /// The file is opened with create-new semantics so two in-flight calls
    /// can never share a path. If the write fails the partial file is
    /// removed before the error is returned.
    ///
    /// Staging runs as one blocking task that hands back the owning handle.
    /// If the caller is cancelled mid-acquire, the task still finishes and
    /// tokio drops its output, so the file is removed by `Drop`.
    pub async fn acquire(dir: &Path, bytes: &[u8]) -> Result<Self, ArtifactError> {
        let dir = dir.to_path_buf();
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || Self::stage(&dir, &bytes)).await?
    }

    fn stage(dir: &Path, bytes: &[u8]) -> Result<Self, ArtifactError> {
        std::fs::create_dir_all(dir).map_err(|source| ArtifactError::ScratchDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut artifact = Self {
            path: dir.join(format!("temp_{}.jpg", Uuid::new_v4())),
            created: false,
            released: false,
        };

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&artifact.path)
            .map_err(|source| ArtifactError::Create {
                path: artifact.path.clone(),
                source,
            })?;
        artifact.created = true;

        let written = file.write_all(bytes).and_then(|()| file.flush());
        drop(file);

        if let Err(source) = written {
            // `artifact` drops here and removes the partial file.
            return Err(ArtifactError::Write {
                path: artifact.path.clone(),
                source,
            });
        }

        tracing::debug!(path = %artifact.path.display(), bytes = bytes.len(), "temp artifact staged");
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the staged bytes back.
    pub async fn read(&self) -> Result<Vec<u8>, ArtifactError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| ArtifactError::Read {
                path: self.path.clone(),
                source,
            })
    }

    /// Remove the artifact.
    ///
    /// A file that is already gone is fine. Other failures are logged and
    /// swallowed so they never mask the outcome of the relay call.
    pub async fn release(mut self) {
        self.released = true;
        if !self.created {
            return;
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "temp artifact released");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp artifact");
            }
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.released || !self.created {
            return;
        }
        // Blocking removal; only reached when `release` was skipped.
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "temp artifact removed on drop");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp artifact on drop");
            }
        }
    }
}
