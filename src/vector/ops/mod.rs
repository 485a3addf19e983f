//! Geometry operations used by the vector pipeline.

mod predicates;
mod transformations;

pub use predicates::{SpatialFilter, SpatialFilterPolicy};
pub use transformations::GeometryOps;
