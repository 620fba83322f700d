use serde::{Deserialize, Serialize};

/// Label drawn for any detection the recognition service could not match.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Face region in image coordinates.
///
/// On the wire this is a four-element array in `[top, right, bottom, left]`
/// order, the layout the recognition service emits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([top, right, bottom, left]: [f64; 4]) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.top, b.right, b.bottom, b.left]
    }
}

/// Whether a detected face matched a registered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Match,
    /// The service reports this as `"unknown"`; anything other than
    /// `"match"` lands here.
    #[serde(other)]
    Unmatched,
}

/// One face found by the recognition service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub name: Option<String>,
    pub status: MatchStatus,
}

impl Detection {
    /// Text to draw next to the box: the matched name, or [`UNKNOWN_LABEL`].
    pub fn label(&self) -> &str {
        match (self.status, self.name.as_deref()) {
            (MatchStatus::Match, Some(name)) => name,
            _ => UNKNOWN_LABEL,
        }
    }
}

/// Ordered detections for a single frame.
pub type RecognitionResult = Vec<Detection>;

/// Body of `POST /api/register`.
///
/// Both fields are optional at the type level so that a missing field
/// reaches the handler and is reported as a validation error rather than
/// a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Body of `POST /api/recognize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognizeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Success envelope for registration. `data` is the service's acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse<T = serde_json::Value> {
    pub message: String,
    pub data: T,
}

/// Success envelope for recognition.
///
/// The edge relays `results` as raw JSON; clients parse it as a
/// [`RecognitionResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizeResponse<T = serde_json::Value> {
    pub message: String,
    pub results: T,
}

/// Error envelope returned by every failing edge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: detail.into(),
        }
    }
}
