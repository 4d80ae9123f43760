use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat};

use crate::error::Result;

/// The image being inpainted, kept both decoded (for its size) and as the base64
/// PNG the service expects.
#[derive(Debug, Clone)]
pub struct SourceImage {
    width: u32,
    height: u32,
    png_base64: String,
}

impl SourceImage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let image = image::open(path)?;
        Self::from_image(&image)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        Self::from_image(&image)
    }

    /// Restores from a base64 PNG as persisted in the session.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(Self {
            width: image.width(),
            height: image.height(),
            png_base64: STANDARD.encode(buf),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_base64(&self) -> &str {
        &self.png_base64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_encodes_png_and_reloads() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 16, Rgb([10, 20, 30])));
        let source = SourceImage::from_image(&img).unwrap();
        assert_eq!(source.dimensions(), (32, 16));

        let again = SourceImage::from_base64(source.as_base64()).unwrap();
        assert_eq!(again.dimensions(), (32, 16));
        assert_eq!(again.as_base64(), source.as_base64());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(SourceImage::from_bytes(b"not an image").is_err());
        assert!(SourceImage::from_base64("%%%").is_err());
    }
}
