//! Image encoding: rendered pages and uploaded photos → base64 `ImageData`.
//!
//! Vision APIs accept images as base64 data embedded in the JSON request
//! body. Rendered PDF pages are PNG-encoded (lossless, so small print on an
//! ID stays crisp). Uploaded photos are forwarded as-is with their own media
//! type; re-encoding a phone JPEG would only make it bigger.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as a base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Wrap uploaded image bytes without touching them.
pub fn encode_original(bytes: &[u8], media_type: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded original {} → {} bytes base64", media_type, b64.len());
    ImageData::new(b64, media_type).with_detail("high")
}
