use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{GrayImage, ImageFormat, Luma};

use crate::coords::RasterPoint;
use crate::error::{Error, Result};

/// Pixel value for regions the generator should repaint.
pub const PAINTED: u8 = 255;
/// Pixel value for regions left alone.
pub const UNTOUCHED: u8 = 0;

/// Single-channel mask bitmap at the source image's native resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskRaster {
    pixels: GrayImage,
}

impl MaskRaster {
    /// A raster filled entirely with [`UNTOUCHED`].
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            pixels: GrayImage::from_pixel(width, height, Luma([UNTOUCHED])),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0[0])
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn fill(&mut self, value: u8) {
        for p in self.pixels.pixels_mut() {
            p.0[0] = value;
        }
    }

    /// Number of pixels currently set to [`PAINTED`].
    pub fn painted_count(&self) -> usize {
        self.pixels.pixels().filter(|p| p.0[0] == PAINTED).count()
    }

    /// Hard-edged filled circle.
    ///
    /// Pixel `(x, y)` is covered when `(x - cx)^2 + (y - cy)^2 <= r^2`; covered
    /// pixels are overwritten with `value`, there is no partial coverage. Parts
    /// of the circle outside the raster are clipped.
    pub fn stamp(&mut self, center: RasterPoint, radius: u32, value: u8) {
        let (w, h) = self.dimensions();
        let r = radius as f32;
        let r2 = r * r;

        let x0 = (center.x - r).floor().max(0.0) as u32;
        let y0 = (center.y - r).floor().max(0.0) as u32;
        let x1 = ((center.x + r).ceil().max(0.0) as u32).min(w - 1);
        let y1 = ((center.y + r).ceil().max(0.0) as u32).min(h - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }

        for y in y0..=y1 {
            let dy = y as f32 - center.y;
            for x in x0..=x1 {
                let dx = x as f32 - center.x;
                if dx * dx + dy * dy <= r2 {
                    self.pixels.put_pixel(x, y, Luma([value]));
                }
            }
        }
    }

    /// PNG bytes of the raster (8-bit grayscale).
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.pixels.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
        Ok(Self {
            pixels: decoded.to_luma8(),
        })
    }

    /// Base64 PNG, the form submitted to the generation service.
    pub fn to_base64_png(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_png()?))
    }

    pub fn from_base64_png(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded)?;
        Self::from_png(&bytes)
    }
}
