//! File-input boundary: size ceiling and encoding of user uploads.

use crate::error::{PfpError, Result};
use crate::image::types::{EncodedImage, ImageFormat};
use std::path::Path;

/// Largest accepted upload, in bytes (5 MB).
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Rejects sizes above [`MAX_UPLOAD_BYTES`].
pub fn check_upload_size(size: u64) -> Result<()> {
    if size > MAX_UPLOAD_BYTES {
        return Err(PfpError::FileTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Encodes in-memory upload bytes, using `file_name` as a format hint.
///
/// Magic bytes win over the extension; the extension is only consulted when
/// the content is not recognised.
pub fn encode_upload(data: &[u8], file_name: Option<&str>) -> Result<EncodedImage> {
    check_upload_size(data.len() as u64)?;

    let format = ImageFormat::from_magic_bytes(data).or_else(|| {
        file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
    });

    Ok(match format {
        Some(format) => EncodedImage::from_bytes_with_mime(data, format.mime_type()),
        None => EncodedImage::from_bytes(data),
    })
}

/// Reads and encodes an image file.
///
/// The size is checked from file metadata before the file is read, so an
/// oversized file is never loaded or encoded.
pub async fn load_upload(path: impl AsRef<Path>) -> Result<EncodedImage> {
    let path = path.as_ref();
    let metadata = tokio::fs::metadata(path).await?;
    check_upload_size(metadata.len())?;

    let data = tokio::fs::read(path).await?;
    tracing::debug!(path = %path.display(), size = data.len(), "loaded upload");
    encode_upload(&data, path.file_name().and_then(|n| n.to_str()))
}
