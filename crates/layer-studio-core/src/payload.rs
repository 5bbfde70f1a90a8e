//! Encoded image payloads carried by image layers.
//!
//! On the wire a payload is a `data:<mime>;base64,<bytes>` URL, which is also
//! what the scene markup embeds as an image `href`.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// An encoded bitmap (PNG, JPEG, ...) together with its MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImagePayload {
    mime_type: String,
    data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }

    /// Build a payload from raw file bytes, sniffing the MIME type from the
    /// magic number.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mime = sniff_mime(&data).ok_or_else(|| {
            StudioError::InvalidPayload("unrecognized image format".into())
        })?;
        Ok(Self::new(mime, data))
    }

    /// Build a payload from base64 text as returned by remote services.
    pub fn from_base64(mime_type: impl Into<String>, encoded: &str) -> Result<Self> {
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| StudioError::InvalidPayload(format!("bad base64: {e}")))?;
        Ok(Self::new(mime_type, data))
    }

    /// Parse a `data:` URL. Only base64-encoded data URLs are accepted.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| StudioError::InvalidPayload("missing data: prefix".into()))?;
        let (header, body) = rest
            .split_once(',')
            .ok_or_else(|| StudioError::InvalidPayload("missing ',' separator".into()))?;
        let mime = header.strip_suffix(";base64").ok_or_else(|| {
            StudioError::InvalidPayload("only base64 data URLs are supported".into())
        })?;
        if mime.is_empty() {
            return Err(StudioError::InvalidPayload("empty MIME type".into()));
        }
        Self::from_base64(mime, body)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

impl TryFrom<String> for ImagePayload {
    type Error = StudioError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_data_url(&value)
    }
}

impl From<ImagePayload> for String {
    fn from(payload: ImagePayload) -> Self {
        payload.to_data_url()
    }
}

// Payloads can be megabytes; keep debug output to the shape of the data.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}
