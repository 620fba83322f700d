//! Frame type: one encoded still image ready for upload.

use facegate_core::encode_data_url;
use image::ImageFormat;
use std::io::Cursor;

/// A captured still frame, kept in its encoded form (JPEG, PNG, ...).
#[derive(Clone)]
pub struct Frame {
    /// Encoded image bytes, passed to the edge untouched.
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Wrap encoded bytes, probing format and dimensions from the header.
    pub fn from_encoded(data: Vec<u8>, sequence: u32) -> Result<Self, FrameError> {
        let reader = image::ImageReader::new(Cursor::new(&data))
            .with_guessed_format()
            .map_err(|e| FrameError::Probe(e.to_string()))?;
        let format = reader.format().ok_or(FrameError::UnknownFormat)?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| FrameError::Probe(e.to_string()))?;

        Ok(Self {
            data,
            format,
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// `data:<mime>;base64,...` form expected by the edge API.
    pub fn to_data_url(&self) -> String {
        encode_data_url(self.mime_type(), &self.data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unrecognised image format")]
    UnknownFormat,
    #[error("failed to read image header: {0}")]
    Probe(String),
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 90, 60]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}
