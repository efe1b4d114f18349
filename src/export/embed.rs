//! Image embedding: fetched bytes → baseline RGB JPEG for a PDF XObject.
//!
//! Whatever the image provider served (PNG with alpha, greyscale, palette
//! PNG, CMYK JPEG), the PDF gets one shape: 8-bit DeviceRGB under
//! `DCTDecode`.

use crate::pipeline::proxy::EncodedImage;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// A decoded image ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PdfImage {
    /// Decode `encoded` and re-encode it as RGB JPEG.
    pub fn from_encoded(encoded: &EncodedImage) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(&encoded.bytes)?;
        Self::from_image(&img)
    }

    pub fn from_image(img: &DynamicImage) -> Result<Self, image::ImageError> {
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut jpeg = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;
        debug!(
            "Re-encoded {}x{} image → {} bytes JPEG",
            rgb.width(),
            rgb.height(),
            jpeg.len()
        );
        Ok(Self {
            jpeg,
            width: rgb.width(),
            height: rgb.height(),
        })
    }

    /// Width over height.
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}
