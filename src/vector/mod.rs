//! Vector Data
//!
//! Layers hold [`Feature`]s whose geometries are plain [`geo_types`]
//! values, so the whole `geo` algorithm toolbox applies to them directly.
//!
//! ## Reading
//!
//! ```
//! use geo_types::{point, Geometry};
//! use geoconvert::vector::{Feature, FieldDefn, FieldType, GeometryType, LayerOptions};
//! use geoconvert::DriverManager;
//!
//! let driver = DriverManager::get_driver_by_name("MEM").unwrap();
//! let mut dataset = driver.create_vector_only("").unwrap();
//! let layer = dataset
//!     .create_layer(LayerOptions {
//!         name: "roads",
//!         ty: GeometryType::Point,
//!         ..Default::default()
//!     })
//!     .unwrap();
//! layer.create_field(FieldDefn::new("highway", FieldType::String)).unwrap();
//! let mut feature = Feature::new(layer.defn());
//! feature.set_geometry(Geometry::Point(point!(x: 1.0, y: 2.0)));
//! feature.set_field_string("highway", "primary").unwrap();
//! layer.create_feature(feature).unwrap();
//!
//! let layer = dataset.layer(0).unwrap();
//! for feature in layer.features() {
//!     let highway_field = feature.field("highway").unwrap().unwrap();
//!     println!("{} {:?}", highway_field.into_string().unwrap(), feature.geometry());
//! }
//! ```

mod defn;
mod feature;
pub(crate) mod geojson;
mod geometry;
mod layer;
pub mod ops;
mod options;
pub mod sql;

pub use defn::{Defn, FieldDefn, FieldType};
pub use feature::{Feature, FieldValue};
pub use geometry::{envelope, envelopes_intersect, explode, GeometryType};
pub use layer::Layer;
pub use ops::{GeometryOps, SpatialFilter, SpatialFilterPolicy};
pub use options::LayerOptions;

#[cfg(test)]
mod tests;
