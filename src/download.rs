//! Local export of a generated image.

use crate::error::Result;
use crate::image::{EncodedImage, ImageFormat};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Builds the export file name for a result produced at `now`.
pub fn export_file_name(result: &EncodedImage, now: DateTime<Utc>) -> String {
    let format = result.format().unwrap_or(ImageFormat::Png);
    format!("baby-pfp-{}.{}", now.timestamp_millis(), format.extension())
}

/// Decodes `result` and writes it into `dir`. Returns the written path.
pub fn export(result: &EncodedImage, dir: impl AsRef<Path>, now: DateTime<Utc>) -> Result<PathBuf> {
    let data = result.decode()?;
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let path = dir.join(export_file_name(result, now));
    std::fs::write(&path, &data)?;
    tracing::debug!(path = %path.display(), size = data.len(), "exported result");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_from_timestamp() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let png = EncodedImage::new("data:image/png;base64,AAA");
        assert_eq!(export_file_name(&png, now), "baby-pfp-1700000000123.png");

        let jpeg = EncodedImage::new("data:image/jpeg;base64,AAA");
        assert_eq!(export_file_name(&jpeg, now), "baby-pfp-1700000000123.jpg");
    }

    #[test]
    fn test_export_writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let result = EncodedImage::from_bytes_with_mime(b"pixels", "image/png");
        let now = Utc.timestamp_millis_opt(42).unwrap();

        let path = export(&result, dir.path(), now).unwrap();
        assert_eq!(path, dir.path().join("baby-pfp-42.png"));
        assert_eq!(std::fs::read(path).unwrap(), b"pixels".to_vec());
    }
}
