//! Spatial reference systems and coordinate transformation.

mod srs;
mod transform;

pub use srs::{CrsKind, SpatialRef};
pub use transform::CoordTransform;
