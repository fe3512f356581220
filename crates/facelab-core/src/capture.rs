//! Image capture: read one image file into a base64 data-URI.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A captured image, ready to hand to the wizard.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub data_uri: String,
    pub mime: String,
    pub byte_len: usize,
    /// Pixel dimensions, when the header could be decoded.
    pub dimensions: Option<(u32, u32)>,
    pub file_name: Option<String>,
}

impl CapturedImage {
    /// One-line preview shown after a successful capture.
    pub fn preview(&self) -> String {
        let name = self.file_name.as_deref().unwrap_or("image");
        match self.dimensions {
            Some((w, h)) => format!("{name} ({}, {w}x{h}, {} bytes)", self.mime, self.byte_len),
            None => format!("{name} ({}, {} bytes)", self.mime, self.byte_len),
        }
    }
}

/// Read the image at `path`.
///
/// An empty path or a path that does not exist means no file was selected
/// and yields `Ok(None)`.
pub fn capture_file(path: impl AsRef<Path>) -> Result<Option<CapturedImage>, CaptureError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || !path.is_file() {
        tracing::debug!(path = %path.display(), "no image selected");
        return Ok(None);
    }

    let bytes = std::fs::read(path).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let format = image::guess_format(&bytes)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok());
    let mime = format
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|| FALLBACK_MIME.to_string());

    let dimensions = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .ok()
        .and_then(|r| r.into_dimensions().ok());

    let captured = CapturedImage {
        data_uri: encode_data_uri(&mime, &bytes),
        mime,
        byte_len: bytes.len(),
        dimensions,
        file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
    };

    tracing::debug!(
        path = %path.display(),
        mime = %captured.mime,
        bytes = captured.byte_len,
        "image captured"
    );

    Ok(Some(captured))
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Split a data-URI into `(mime, payload)`.
///
/// A string without a comma is returned whole as the payload with no mime.
pub fn split_data_uri(uri: &str) -> (Option<&str>, &str) {
    match uri.split_once(',') {
        Some((header, payload)) => {
            let mime = header
                .strip_prefix("data:")
                .map(|h| h.split(';').next().unwrap_or(h))
                .filter(|m| !m.is_empty());
            (mime, payload)
        }
        None => (None, uri),
    }
}
