//! Image codec - turns arbitrary image bytes into a square PNG thumbnail.
//!
//! The source image is scaled to cover the target square and center-cropped
//! (never letterboxed or stretched), using Lanczos3 resampling.
//!
//! Decoding and resampling are CPU-bound, so the async entry point runs them on
//! the blocking thread pool.

use bytes::Bytes;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, imageops::FilterType};
use std::io::Cursor;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::debug;

/// Content type of every thumbnail produced here.
pub const OUTPUT_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode thumbnail: {0}")]
    Encode(#[source] image::ImageError),
    #[error("thumbnail task failed: {0}")]
    Task(#[from] JoinError),
}

/// Square PNG thumbnailer with a fixed edge length.
#[derive(Clone, Debug)]
pub struct ImageCodec {
    size: u32,
}

impl ImageCodec {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    /// Decode, cover-fit to `size × size`, and encode as PNG (blocking).
    pub fn thumbnail(&self, original: &[u8]) -> Result<Vec<u8>, CodecError> {
        let img = image::load_from_memory(original).map_err(CodecError::Decode)?;

        let (orig_w, orig_h) = img.dimensions();
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            target = self.size,
            "Processing image for thumbnail"
        );

        let resized = img.resize_to_fill(self.size, self.size, FilterType::Lanczos3);
        // PNG has no float sample formats
        let resized = match resized.color() {
            ColorType::Rgb32F | ColorType::Rgba32F => DynamicImage::ImageRgba8(resized.to_rgba8()),
            _ => resized,
        };

        let mut out = Cursor::new(Vec::new());
        resized
            .write_to(&mut out, ImageFormat::Png)
            .map_err(CodecError::Encode)?;

        Ok(out.into_inner())
    }

    /// Same as [`ImageCodec::thumbnail`], on the blocking thread pool.
    pub async fn thumbnail_async(&self, original: Bytes) -> Result<Vec<u8>, CodecError> {
        let codec = self.clone();
        tokio::task::spawn_blocking(move || codec.thumbnail(&original)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::encoded_image;

    #[test]
    fn output_is_exact_square_for_any_aspect_ratio() {
        let codec = ImageCodec::new(128);
        for (w, h) in [(300, 100), (50, 400), (128, 128), (20, 10)] {
            let png = codec
                .thumbnail(&encoded_image(w, h, ImageFormat::Png))
                .unwrap();
            let decoded = image::load_from_memory(&png).unwrap();
            assert_eq!(decoded.dimensions(), (128, 128), "input {w}x{h}");
        }
    }

    #[test]
    fn output_is_png_regardless_of_input_format() {
        let codec = ImageCodec::new(32);
        let png = codec
            .thumbnail(&encoded_image(64, 48, ImageFormat::Jpeg))
            .unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = ImageCodec::new(32).thumbnail(b"not an image").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[tokio::test]
    async fn async_variant_matches_blocking_one() {
        let codec = ImageCodec::new(16);
        let input = encoded_image(40, 20, ImageFormat::Png);
        let png = codec.thumbnail_async(Bytes::from(input)).await.unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }
}
