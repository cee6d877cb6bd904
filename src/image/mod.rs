//! Image payloads and the upload boundary.

mod types;
mod upload;

pub use types::{EncodedImage, ImageFormat};
pub use upload::{check_upload_size, encode_upload, load_upload, MAX_UPLOAD_BYTES};
