//! Core image types: formats and encoded (data URI) payloads.

use crate::error::{PfpError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
    /// GIF format.
    Gif,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Attempts to detect format from a MIME type.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// An image carried as a self-contained data URI
/// (`data:image/png;base64,...`).
///
/// Remote results are wrapped unmodified; the string is only inspected when
/// decoded or when its MIME type is asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    /// Wraps an already-encoded payload without validating it.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encodes raw bytes as a data URI with the given MIME type.
    pub fn from_bytes_with_mime(data: &[u8], mime_type: &str) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD.encode(data);
        Self(format!("data:{mime_type};base64,{b64}"))
    }

    /// Encodes raw bytes, detecting the format from magic bytes.
    ///
    /// Unknown content is labelled as PNG, which is what the generation
    /// backends assume anyway.
    pub fn from_bytes(data: &[u8]) -> Self {
        let format = ImageFormat::from_magic_bytes(data).unwrap_or_default();
        Self::from_bytes_with_mime(data, format.mime_type())
    }

    /// Returns the payload exactly as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the MIME type declared in the data URI header, if any.
    pub fn mime_type(&self) -> Option<&str> {
        let header = self.0.strip_prefix("data:")?;
        let end = header.find([';', ','])?;
        let mime = &header[..end];
        (!mime.is_empty()).then_some(mime)
    }

    /// Returns the image format declared in the header, if recognised.
    pub fn format(&self) -> Option<ImageFormat> {
        self.mime_type().and_then(ImageFormat::from_mime_type)
    }

    /// Returns the base64 body without the data URI header.
    pub fn base64_body(&self) -> &str {
        match self.0.find(";base64,") {
            Some(pos) => &self.0[pos + 8..],
            None => &self.0,
        }
    }

    /// Decodes the payload into raw bytes.
    ///
    /// Tolerates a bare base64 body, embedded whitespace and missing padding.
    pub fn decode(&self) -> Result<Vec<u8>> {
        if self.0.starts_with("data:") && !self.0.contains(";base64,") {
            return Err(PfpError::Decode(
                "data URI is not base64-encoded".to_string(),
            ));
        }

        let cleaned: String = self
            .base64_body()
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
            return Ok(data);
        }

        base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(cleaned.trim_end_matches('='))
            .map_err(|e| PfpError::Decode(e.to_string()))
    }

    /// Returns the length of the encoded string in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the payload is an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EncodedImage {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EncodedImage {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
