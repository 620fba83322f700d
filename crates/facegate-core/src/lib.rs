//! facegate-core: Relay plumbing between the edge API and the external
//! face-recognition service.
//!
//! Decodes browser image payloads, stages them as short-lived scratch
//! files, and forwards them as multipart uploads to the recognition
//! service, mapping its errors back into a small taxonomy.

pub mod artifact;
pub mod codec;
pub mod relay;
pub mod types;

pub use artifact::{ArtifactError, TempArtifact};
pub use codec::{decode_image_payload, encode_data_url, CodecError};
pub use relay::{RelayClient, RelayConfig, RelayError, DUPLICATE_NAME_DETAIL};
pub use types::{
    BoundingBox, Detection, ErrorBody, MatchStatus, RecognitionResult, RecognizeRequest,
    RecognizeResponse, RegisterRequest, RegisterResponse,
};
