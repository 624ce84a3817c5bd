//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG keeps rendered text lossless. `detail: "high"` asks GPT-4-class
//! models for the full tile budget so small print survives.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Side length of [`placeholder_image`].
pub const PLACEHOLDER_SIZE: u32 = 100;

/// Encode a page image as a base64 PNG ready for the API.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let buf = png_bytes(img)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Raw PNG bytes for `img`.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Blank white image sent when a document has no page image, since the
/// document signature always takes one.
pub fn placeholder_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(
        PLACEHOLDER_SIZE,
        PLACEHOLDER_SIZE,
        Rgb([255, 255, 255]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn placeholder_is_white_square() {
        let img = placeholder_image().to_rgb8();
        assert_eq!(img.dimensions(), (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255]));
    }
}
