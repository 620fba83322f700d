//! Frame sources for the capture loop.

use crate::frame::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// Anything that can hand the capture loop a still frame.
pub trait FrameSource {
    /// Grab the current frame.
    ///
    /// `Ok(None)` means the source has not produced a frame yet; the loop
    /// treats that tick as a no-op.
    fn capture(&mut self) -> Result<Option<Frame>, CameraError>;
}

const STILL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

/// Frame source backed by still images on disk.
///
/// Points at either a single image or a directory of images, which are
/// replayed in file-name order and looped. An empty directory is rescanned
/// on every capture, so frames dropped in later are picked up.
pub struct DirectoryCamera {
    root: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    sequence: u32,
}

impl DirectoryCamera {
    pub fn open(path: &Path) -> Result<Self, CameraError> {
        if !path.exists() {
            return Err(CameraError::DeviceNotFound(path.display().to_string()));
        }

        let mut camera = Self {
            root: path.to_path_buf(),
            files: Vec::new(),
            cursor: 0,
            sequence: 0,
        };
        camera.rescan()?;

        tracing::info!(
            source = %camera.root.display(),
            frames = camera.files.len(),
            "opened still-image camera"
        );
        Ok(camera)
    }

    /// Number of stills currently in rotation.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn rescan(&mut self) -> Result<(), CameraError> {
        if self.root.is_file() {
            self.files = vec![self.root.clone()];
            return Ok(());
        }

        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            CameraError::CaptureFailed(format!("failed to list {}: {e}", self.root.display()))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_still_image(p))
            .collect();
        files.sort();
        self.files = files;
        self.cursor = 0;
        Ok(())
    }
}

impl FrameSource for DirectoryCamera {
    fn capture(&mut self) -> Result<Option<Frame>, CameraError> {
        if self.files.is_empty() {
            self.rescan()?;
        }
        let Some(path) = self.files.get(self.cursor % self.files.len().max(1)).cloned() else {
            return Ok(None);
        };
        self.cursor = (self.cursor + 1) % self.files.len();

        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "still disappeared; rescanning");
                self.rescan()?;
                return Ok(None);
            }
            Err(e) => {
                return Err(CameraError::CaptureFailed(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let frame = Frame::from_encoded(data, self.sequence).map_err(|e| {
            CameraError::CaptureFailed(format!("{}: {e}", path.display()))
        })?;
        self.sequence = self.sequence.wrapping_add(1);

        tracing::trace!(
            path = %path.display(),
            seq = frame.sequence,
            width = frame.width,
            height = frame.height,
            "captured still"
        );
        Ok(Some(frame))
    }
}

fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| STILL_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
