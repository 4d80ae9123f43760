use log::debug;

use crate::coords::{PointerInput, RasterPoint, SurfaceGeometry};
use crate::error::{Error, Result};
use crate::history::{MaskHistory, MaskSnapshot};
use crate::raster::{MaskRaster, PAINTED, UNTOUCHED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrushMode {
    #[default]
    Paint,
    Erase,
}

impl BrushMode {
    pub fn value(&self) -> u8 {
        match self {
            Self::Paint => PAINTED,
            Self::Erase => UNTOUCHED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brush {
    radius: u32,
    pub mode: BrushMode,
}

impl Brush {
    pub const MIN_RADIUS: u32 = 5;
    pub const MAX_RADIUS: u32 = 100;

    pub fn new(radius: u32, mode: BrushMode) -> Self {
        Self {
            radius: radius.clamp(Self::MIN_RADIUS, Self::MAX_RADIUS),
            mode,
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }
}

impl Default for Brush {
    fn default() -> Self {
        Self::new(20, BrushMode::Paint)
    }
}

/// Painting surface for the region-of-interest mask.
///
/// Strokes write straight into the working raster; a snapshot lands in the
/// history only when the stroke ends (or on [`MaskEditor::clear`]), so undo
/// works per stroke.
#[derive(Debug, Clone)]
pub struct MaskEditor {
    raster: MaskRaster,
    history: MaskHistory,
    brush: Brush,
    stroking: bool,
}

impl MaskEditor {
    /// Blank (fully untouched) mask; the blank state is the sole history entry.
    pub fn initialize(width: u32, height: u32) -> Result<Self> {
        let raster = MaskRaster::blank(width, height)?;
        let mut history = MaskHistory::new();
        history.push(MaskSnapshot::capture(&raster)?);

        Ok(Self {
            raster,
            history,
            brush: Brush::default(),
            stroking: false,
        })
    }

    /// Rebuilds an editor from persisted snapshots. Snapshots that fail to decode
    /// or whose size differs from `width` x `height` are dropped; if nothing
    /// survives the editor starts blank.
    pub fn restore(width: u32, height: u32, snapshots: &[MaskSnapshot]) -> Result<Self> {
        let mut valid = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            match snapshot.decode() {
                Ok(raster) if raster.dimensions() == (width, height) => valid.push(snapshot.clone()),
                Ok(raster) => debug!(
                    "Dropping mask snapshot sized {:?}, expected {:?}",
                    raster.dimensions(),
                    (width, height)
                ),
                Err(e) => debug!("Dropping undecodable mask snapshot: {}", e),
            }
        }

        let history = MaskHistory::from_entries(valid);
        let Some(latest) = history.latest() else {
            return Self::initialize(width, height);
        };
        let raster = latest.decode()?;

        Ok(Self {
            raster,
            history,
            brush: Brush::default(),
            stroking: false,
        })
    }

    pub fn raster(&self) -> &MaskRaster {
        &self.raster
    }

    pub fn history(&self) -> &MaskHistory {
        &self.history
    }

    pub fn brush(&self) -> Brush {
        self.brush
    }

    /// Applies to strokes started after this call only.
    pub fn set_brush_size(&mut self, radius: u32) {
        self.brush = Brush::new(radius, self.brush.mode);
    }

    pub fn set_mode(&mut self, mode: BrushMode) {
        self.brush.mode = mode;
    }

    pub fn begin_stroke(&mut self, point: RasterPoint) {
        self.stroking = true;
        self.stamp(point);
    }

    /// Ignored unless a stroke is in progress.
    pub fn continue_stroke(&mut self, point: RasterPoint) {
        if self.stroking {
            self.stamp(point);
        }
    }

    /// Commits the stroke to history. Returns the new snapshot, or `None` when no
    /// stroke was in progress.
    pub fn end_stroke(&mut self) -> Result<Option<MaskSnapshot>> {
        if !self.stroking {
            return Ok(None);
        }
        self.stroking = false;
        self.commit().map(Some)
    }

    pub fn pointer_down(&mut self, input: &PointerInput, geometry: &SurfaceGeometry) {
        self.begin_stroke(geometry.to_raster(input));
    }

    pub fn pointer_move(&mut self, input: &PointerInput, geometry: &SurfaceGeometry) {
        self.continue_stroke(geometry.to_raster(input));
    }

    /// Reverts to the previous snapshot. Returns `false` at the floor.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(previous) = self.history.undo() else {
            return Ok(false);
        };
        self.raster = previous.decode()?;
        self.stroking = false;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<MaskSnapshot> {
        self.stroking = false;
        self.raster.fill(UNTOUCHED);
        self.commit()
    }

    /// Base64 PNG of the current raster.
    pub fn encode(&self) -> Result<String> {
        self.raster.to_base64_png()
    }

    /// Checks the mask can be submitted alongside a source image of the given size.
    pub fn ensure_matches(&self, width: u32, height: u32) -> Result<()> {
        let actual = self.raster.dimensions();
        if actual != (width, height) {
            return Err(Error::DimensionMismatch {
                expected: (width, height),
                actual,
            });
        }
        Ok(())
    }

    fn stamp(&mut self, point: RasterPoint) {
        let w = self.raster.width().saturating_sub(1) as f32;
        let h = self.raster.height().saturating_sub(1) as f32;
        let center = RasterPoint::new(point.x.clamp(0.0, w), point.y.clamp(0.0, h));
        self.raster.stamp(center, self.brush.radius, self.brush.mode.value());
    }

    fn commit(&mut self) -> Result<MaskSnapshot> {
        let snapshot = MaskSnapshot::capture(&self.raster)?;
        self.history.push(snapshot.clone());
        Ok(snapshot)
    }
}
