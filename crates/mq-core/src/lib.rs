pub mod coords;
pub mod editor;
pub mod error;
pub mod history;
pub mod raster;
pub mod source;

pub use coords::{Contact, PointerInput, RasterPoint, SurfaceGeometry};
pub use editor::{Brush, BrushMode, MaskEditor};
pub use error::{Error, Result};
pub use history::{MaskHistory, MaskSnapshot, HISTORY_LIMIT};
pub use raster::{MaskRaster, PAINTED, UNTOUCHED};
pub use source::SourceImage;
