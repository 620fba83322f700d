//! Image payload codec: data-URL prefix stripping and base64 decoding.
//!
//! Browsers hand us either a bare base64 string or a data URL of the form
//! `data:image/<fmt>;base64,<payload>`. Bytes are passed through untouched;
//! nothing is re-encoded.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use thiserror::Error;

const DATA_URL_SCHEME: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

/// Standard alphabet, accepting payloads with or without `=` padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("image payload is empty")]
    Empty,
    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Strip an optional `data:image/<word>;base64,` prefix.
///
/// `<word>` must be non-empty and made of ASCII alphanumerics or `_`; any
/// other shape is returned unchanged and will be decoded as-is.
pub fn strip_data_url_prefix(payload: &str) -> &str {
    let Some(rest) = payload.strip_prefix(DATA_URL_SCHEME) else {
        return payload;
    };
    let Some((format, body)) = rest.split_once(BASE64_MARKER) else {
        return payload;
    };
    let is_word = !format.is_empty()
        && format
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if is_word {
        body
    } else {
        payload
    }
}

/// Decode an image payload into raw bytes.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, CodecError> {
    let encoded = strip_data_url_prefix(payload.trim()).trim();
    if encoded.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(LENIENT.decode(encoded)?)
}

/// Build a `data:<mime>;base64,` URL for an encoded image.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // "hello jpeg" in base64
    const SAMPLE_B64: &str = "aGVsbG8ganBlZw==";

    #[test]
    fn test_prefix_and_bare_decode_identically() {
        let bare = decode_image_payload(SAMPLE_B64).unwrap();
        for fmt in ["jpeg", "png", "webp", "x_raw"] {
            let prefixed = format!("data:image/{fmt};base64,{SAMPLE_B64}");
            assert_eq!(decode_image_payload(&prefixed).unwrap(), bare, "format {fmt}");
        }
        assert_eq!(bare, b"hello jpeg");
    }

    #[test]
    fn test_missing_padding_accepted() {
        let unpadded = SAMPLE_B64.trim_end_matches('=');
        assert_eq!(decode_image_payload(unpadded).unwrap(), b"hello jpeg");
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let padded = format!("  data:image/jpeg;base64,{SAMPLE_B64}\n");
        assert_eq!(decode_image_payload(&padded).unwrap(), b"hello jpeg");
    }

    #[test]
    fn test_non_image_data_url_is_not_stripped() {
        let text = format!("data:text/plain;base64,{SAMPLE_B64}");
        assert_eq!(strip_data_url_prefix(&text), text);
        assert!(matches!(
            decode_image_payload(&text),
            Err(CodecError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_format_must_be_a_word() {
        let odd = format!("data:image/svg+xml;base64,{SAMPLE_B64}");
        assert_eq!(strip_data_url_prefix(&odd), odd);
        let empty = format!("data:image/;base64,{SAMPLE_B64}");
        assert_eq!(strip_data_url_prefix(&empty), empty);
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(decode_image_payload(""), Err(CodecError::Empty)));
        assert!(matches!(
            decode_image_payload("data:image/jpeg;base64,"),
            Err(CodecError::Empty)
        ));
    }

    #[test]
    fn test_malformed_base64() {
        assert!(matches!(
            decode_image_payload("not*base64!"),
            Err(CodecError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_encode_data_url_decodes_back() {
        let bytes = [0xFFu8, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let url = encode_data_url("image/jpeg", &bytes);
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decode_image_payload(&url).unwrap(), bytes);
    }
}
