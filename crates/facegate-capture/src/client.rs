//! HTTP client for the facegate edge API.

use facegate_core::{
    ErrorBody, RecognitionResult, RecognizeRequest, RecognizeResponse, RegisterRequest,
    RegisterResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{error} (HTTP {status}): {detail}")]
    Api {
        status: u16,
        error: String,
        detail: String,
    },
}

impl ClientError {
    /// Text suitable for showing to the user as-is.
    pub fn detail(&self) -> String {
        match self {
            ClientError::Api { detail, .. } => detail.clone(),
            ClientError::Http(e) => e.to_string(),
        }
    }
}

/// Client for the edge endpoints.
#[derive(Clone)]
pub struct EdgeClient {
    client: reqwest::Client,
    base_url: String,
}

impl EdgeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Register a face. `image` is a data URL or bare base64.
    pub async fn register(&self, name: &str, image: &str) -> Result<RegisterResponse, ClientError> {
        let body = RegisterRequest {
            name: Some(name.to_string()),
            image: Some(image.to_string()),
        };
        self.post("register", &body).await
    }

    /// Recognize faces in one frame.
    pub async fn recognize(&self, image: &str) -> Result<RecognitionResult, ClientError> {
        let body = RecognizeRequest {
            image: Some(image.to_string()),
        };
        let resp: RecognizeResponse<RecognitionResult> = self.post("recognize", &body).await?;
        Ok(resp.results)
    }

    pub async fn list_faces(&self) -> Result<Value, ClientError> {
        let resp = self.client.get(self.api_url("faces")).send().await?;
        check_response(resp).await
    }

    pub async fn delete_all_faces(&self) -> Result<Value, ClientError> {
        let resp = self.client.delete(self.api_url("faces")).send().await?;
        check_response(resp).await
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        let resp = self.client.get(self.api_url("health")).send().await?;
        check_response(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.client.post(self.api_url(path)).json(body).send().await?;
        check_response(resp).await
    }
}

async fn check_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let text = resp.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
        error: status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
        detail: text,
    });
    Err(ClientError::Api {
        status: status.as_u16(),
        error: body.error,
        detail: body.detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::MatchStatus;
    use serde_json::json;
    use warp::Filter;

    fn spawn_edge(status: u16, body: Value) -> String {
        let route = warp::any().map(move || {
            warp::reply::with_status(
                warp::reply::json(&body),
                warp::http::StatusCode::from_u16(status).unwrap(),
            )
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_recognize_parses_detections() {
        let base = spawn_edge(
            200,
            json!({
                "message": "Recognition successful",
                "results": [
                    {"bounding_box": [1, 2, 3, 4], "name": "ada", "status": "match"},
                    {"bounding_box": [5, 6, 7, 8], "name": "Unknown", "status": "unknown"}
                ]
            }),
        );
        let client = EdgeClient::new(&base, Duration::from_secs(5)).unwrap();

        let results = client.recognize("data:image/jpeg;base64,AAAA").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name.as_deref(), Some("ada"));
        assert_eq!(results[0].status, MatchStatus::Match);
        assert_eq!(results[1].bounding_box.left, 8.0);
    }

    #[tokio::test]
    async fn test_error_envelope_surfaces_detail() {
        let base = spawn_edge(
            400,
            json!({
                "error": "Name must be unique",
                "detail": "The name you provided is already registered."
            }),
        );
        let client = EdgeClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client.register("ada", "AAAA").await.unwrap_err();
        match &err {
            ClientError::Api { status, error, .. } => {
                assert_eq!(*status, 400);
                assert_eq!(error, "Name must be unique");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.detail(), "The name you provided is already registered.");
    }

    #[tokio::test]
    async fn test_non_envelope_error_body() {
        let base = spawn_edge(502, json!("upstream gone"));
        let client = EdgeClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 502, .. }));
        assert_eq!(err.detail(), "\"upstream gone\"");
    }
}
