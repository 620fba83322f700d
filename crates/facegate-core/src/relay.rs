//! Upstream relay client for the external face-recognition service.
//!
//! Every image call stages the payload as a [`TempArtifact`], uploads it as
//! multipart form data, and releases the artifact before returning. Calls
//! are attempted exactly once.

use crate::artifact::{ArtifactError, TempArtifact};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Detail string the recognition service uses to reject a duplicate name.
pub const DUPLICATE_NAME_DETAIL: &str = "Name must be unique.";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const UPLOAD_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("name is already registered")]
    DuplicateName,
    #[error("{detail}")]
    Upstream { status: Option<u16>, detail: String },
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl RelayError {
    /// Best available human-readable detail for this failure.
    pub fn detail(&self) -> String {
        match self {
            RelayError::Upstream { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Connection settings for [`RelayClient`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL of the recognition service, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Directory used for temp artifacts.
    pub scratch_dir: PathBuf,
    /// Whole-request timeout for a single upstream call.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Register,
    Recognize,
    ListFaces,
    DeleteAllFaces,
    Health,
}

impl Operation {
    fn path(self) -> &'static str {
        match self {
            Operation::Register => "/add_face/",
            Operation::Recognize => "/identify_face/",
            Operation::ListFaces => "/list_faces/",
            Operation::DeleteAllFaces => "/delete_all_faces/",
            Operation::Health => "/",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::Recognize => "recognize",
            Operation::ListFaces => "list_faces",
            Operation::DeleteAllFaces => "delete_all_faces",
            Operation::Health => "health",
        }
    }

    fn fallback_detail(self) -> &'static str {
        match self {
            Operation::Register => "Registration failed",
            Operation::Recognize => "Recognition failed",
            Operation::ListFaces => "Listing faces failed",
            Operation::DeleteAllFaces => "Deleting faces failed",
            Operation::Health => "Health check failed",
        }
    }
}

/// HTTP client for the recognition service.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
    scratch_dir: PathBuf,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .build()
            .map_err(RelayError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            scratch_dir: config.scratch_dir,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn scratch_dir(&self) -> &std::path::Path {
        &self.scratch_dir
    }

    /// Register `image` under `name` via `POST {base}/add_face/`.
    pub async fn register(&self, name: &str, image: &[u8]) -> Result<Value, RelayError> {
        self.relay_image(Operation::Register, Some(name), image).await
    }

    /// Identify faces in `image` via `POST {base}/identify_face/`.
    pub async fn recognize(&self, image: &[u8]) -> Result<Value, RelayError> {
        self.relay_image(Operation::Recognize, None, image).await
    }

    /// List registered names via `GET {base}/list_faces/`.
    pub async fn list_faces(&self) -> Result<Value, RelayError> {
        let req = self.client.get(self.url(Operation::ListFaces));
        self.send(Operation::ListFaces, req).await
    }

    /// Drop every registration via `DELETE {base}/delete_all_faces/`.
    pub async fn delete_all_faces(&self) -> Result<Value, RelayError> {
        let req = self.client.delete(self.url(Operation::DeleteAllFaces));
        self.send(Operation::DeleteAllFaces, req).await
    }

    /// Probe the service root.
    pub async fn health(&self) -> Result<Value, RelayError> {
        let req = self.client.get(self.url(Operation::Health));
        self.send(Operation::Health, req).await
    }

    fn url(&self, op: Operation) -> String {
        format!("{}{}", self.base_url, op.path())
    }

    async fn relay_image(
        &self,
        op: Operation,
        name: Option<&str>,
        image: &[u8],
    ) -> Result<Value, RelayError> {
        let artifact = TempArtifact::acquire(&self.scratch_dir, image).await?;
        let outcome = self.upload(op, name, &artifact).await;
        artifact.release().await;
        outcome
    }

    async fn upload(
        &self,
        op: Operation,
        name: Option<&str>,
        artifact: &TempArtifact,
    ) -> Result<Value, RelayError> {
        let bytes = artifact.read().await?;
        let size = bytes.len();

        let file = Part::bytes(bytes)
            .file_name(format!("{}_{}.jpg", op.as_str(), Uuid::new_v4()))
            .mime_str(UPLOAD_MIME)
            .map_err(|e| transport_error(op, &e))?;

        let mut form = Form::new();
        if let Some(name) = name {
            form = form.text("name", name.to_owned());
        }
        let form = form.part("file", file);

        tracing::debug!(op = op.as_str(), bytes = size, "uploading image");
        let req = self.client.post(self.url(op)).multipart(form);
        self.send(op, req).await
    }

    async fn send(&self, op: Operation, req: reqwest::RequestBuilder) -> Result<Value, RelayError> {
        let resp = req.send().await.map_err(|e| transport_error(op, &e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| transport_error(op, &e))?;

        if !status.is_success() {
            let err = upstream_error(op, status.as_u16(), &body);
            tracing::warn!(op = op.as_str(), status = status.as_u16(), error = %err, "upstream call failed");
            return Err(err);
        }

        tracing::info!(op = op.as_str(), status = status.as_u16(), "upstream call completed");

        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| RelayError::Upstream {
            status: Some(status.as_u16()),
            detail: format!("upstream returned invalid JSON: {e}"),
        })
    }
}

fn transport_error(op: Operation, err: &reqwest::Error) -> RelayError {
    tracing::warn!(op = op.as_str(), error = %err, "upstream transport failure");
    let message = err.to_string();
    RelayError::Upstream {
        status: None,
        detail: if message.is_empty() {
            op.fallback_detail().to_string()
        } else {
            message
        },
    }
}

/// Map a non-success upstream response to a [`RelayError`].
fn upstream_error(op: Operation, status: u16, body: &[u8]) -> RelayError {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned())
        .filter(|d| !d.is_null());

    let detail = match detail {
        Some(Value::String(s)) if s == DUPLICATE_NAME_DETAIL => return RelayError::DuplicateName,
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::String(_)) => op.fallback_detail().to_string(),
        Some(other) => other.to_string(),
        None => format!("upstream returned HTTP {status}"),
    };

    RelayError::Upstream {
        status: Some(status),
        detail,
    }
}
