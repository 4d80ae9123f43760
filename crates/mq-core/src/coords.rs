/// A point in raster pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterPoint {
    pub x: f32,
    pub y: f32,
}

impl RasterPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One finger of a touch event, in client (display) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub client_x: f32,
    pub client_y: f32,
}

/// A pointer event as delivered by the windowing layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    Mouse { client_x: f32, client_y: f32 },
    Touch { touches: Vec<Contact> },
}

impl PointerInput {
    /// The primary contact point. A touch event with no contacts maps to the origin.
    pub fn primary(&self) -> (f32, f32) {
        match self {
            Self::Mouse { client_x, client_y } => (*client_x, *client_y),
            Self::Touch { touches } => touches
                .first()
                .map(|c| (c.client_x, c.client_y))
                .unwrap_or((0.0, 0.0)),
        }
    }
}

/// Where the mask surface is drawn on screen and how big its backing bitmap is.
///
/// The displayed size and the native size scale independently: the surface is
/// usually shrunk to fit the viewport while the raster keeps the source image's
/// full resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub display_left: f32,
    pub display_top: f32,
    pub display_width: f32,
    pub display_height: f32,
    pub raster_width: u32,
    pub raster_height: u32,
}

impl SurfaceGeometry {
    /// Fits a `raster_width` x `raster_height` bitmap into a box of at most
    /// `max_width` x `max_height`, preserving aspect ratio.
    pub fn fit(raster_width: u32, raster_height: u32, max_width: f32, max_height: f32) -> Self {
        let scale = (max_width / raster_width.max(1) as f32).min(max_height / raster_height.max(1) as f32);
        Self {
            display_left: 0.0,
            display_top: 0.0,
            display_width: raster_width as f32 * scale,
            display_height: raster_height as f32 * scale,
            raster_width,
            raster_height,
        }
    }

    /// Raster pixels per displayed pixel, per axis.
    pub fn scale(&self) -> (f32, f32) {
        let sx = if self.display_width > 0.0 {
            self.raster_width as f32 / self.display_width
        } else {
            1.0
        };
        let sy = if self.display_height > 0.0 {
            self.raster_height as f32 / self.display_height
        } else {
            1.0
        };
        (sx, sy)
    }

    /// Brush radius as it appears on screen, for drawing a cursor indicator.
    pub fn display_radius(&self, brush_radius: u32) -> f32 {
        let (sx, _) = self.scale();
        brush_radius as f32 / sx
    }

    /// Maps a pointer event to raster space, clamped to `[0, w-1] x [0, h-1]`.
    pub fn to_raster(&self, input: &PointerInput) -> RasterPoint {
        let (cx, cy) = input.primary();
        let (sx, sy) = self.scale();

        let x = (cx - self.display_left) * sx;
        let y = (cy - self.display_top) * sy;

        RasterPoint {
            x: clamp_axis(x, self.raster_width),
            y: clamp_axis(y, self.raster_height),
        }
    }
}

fn clamp_axis(value: f32, extent: u32) -> f32 {
    let max = extent.saturating_sub(1) as f32;
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_scale() -> SurfaceGeometry {
        SurfaceGeometry {
            display_left: 10.0,
            display_top: 20.0,
            display_width: 400.0,
            display_height: 300.0,
            raster_width: 800,
            raster_height: 600,
        }
    }

    #[test]
    fn test_scales_display_to_raster() {
        let geom = half_scale();
        let p = geom.to_raster(&PointerInput::Mouse { client_x: 210.0, client_y: 170.0 });
        assert_eq!(p, RasterPoint::new(400.0, 300.0));
    }

    #[test]
    fn test_clamps_outside_points() {
        let geom = half_scale();
        let p = geom.to_raster(&PointerInput::Mouse { client_x: -50.0, client_y: 5000.0 });
        assert_eq!(p, RasterPoint::new(0.0, 599.0));

        let p = geom.to_raster(&PointerInput::Mouse { client_x: 9000.0, client_y: f32::NAN });
        assert_eq!(p, RasterPoint::new(799.0, 0.0));
    }

    #[test]
    fn test_touch_uses_first_contact() {
        let geom = half_scale();
        let touch = PointerInput::Touch {
            touches: vec![
                Contact { client_x: 110.0, client_y: 70.0 },
                Contact { client_x: 300.0, client_y: 300.0 },
            ],
        };
        assert_eq!(geom.to_raster(&touch), RasterPoint::new(200.0, 100.0));

        let empty = PointerInput::Touch { touches: vec![] };
        assert_eq!(geom.to_raster(&empty), RasterPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_mapping_is_pure_and_bounded() {
        let geom = half_scale();
        for i in -20..60 {
            let input = PointerInput::Mouse { client_x: i as f32 * 9.7, client_y: i as f32 * 7.3 };
            let a = geom.to_raster(&input);
            let b = geom.to_raster(&input);
            assert_eq!(a, b);
            assert!(a.x >= 0.0 && a.x < 800.0);
            assert!(a.y >= 0.0 && a.y < 600.0);
        }
    }

    #[test]
    fn test_fit_preserves_aspect() {
        let geom = SurfaceGeometry::fit(1600, 900, 600.0, 600.0);
        assert_eq!(geom.display_width, 600.0);
        assert!((geom.display_height - 337.5).abs() < 1e-3);
        assert!((geom.display_radius(20) - 7.5).abs() < 1e-3);
    }
}
