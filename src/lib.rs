//! Raster and vector dataset translation for Rust.
//!
//! A pure Rust engine modelled on the GDAL data model: datasets opened
//! through a registry of format drivers, raster bands and vector layers
//! held in memory, plus the `translate`, `vector_translate` and `info`
//! programs working on top of them.
//!
//! ## Use
//!
//! ```
//! use geoconvert::programs::info::{info, InfoFormat, InfoOptions};
//! use geoconvert::programs::raster::{translate, TranslateOptions};
//! use geoconvert::raster::DataType;
//! use geoconvert::DriverManager;
//!
//! let driver = DriverManager::get_driver_by_name("MEM").unwrap();
//! let mut dataset = driver.create("", 64, 32, 1).unwrap();
//! dataset
//!     .set_geo_transform(&[440720.0, 60.0, 0.0, 3751320.0, 0.0, -60.0])
//!     .unwrap();
//!
//! let options = TranslateOptions {
//!     format: Some("MEM".to_string()),
//!     output_type: Some(DataType::Float32),
//!     x_size_pct: Some(50.0),
//!     y_size_pct: Some(50.0),
//!     ..Default::default()
//! };
//! let half = translate(&dataset, "", Some(options)).unwrap();
//! assert_eq!(half.raster_size(), (32, 16));
//!
//! let report = info(
//!     &half,
//!     Some(InfoOptions {
//!         format: InfoFormat::Json,
//!         ..Default::default()
//!     }),
//! )
//! .unwrap();
//! assert!(report.contains("\"driverShortName\": \"MEM\""));
//! ```

#![crate_name = "geoconvert"]
#![crate_type = "lib"]

pub mod config;
mod dataset;
mod driver;
pub mod errors;
mod geo_transform;
mod metadata;
mod options;
pub mod programs;
pub mod raster;
pub mod spatial_ref;
#[cfg(test)]
mod test_utils;
pub mod vector;

pub use dataset::Dataset;
pub use driver::{Driver, DriverCapabilities, DriverManager};
pub use geo_transform::{GeoTransform, GeoTransformEx};
pub use metadata::{is_xml_domain, Metadata, MetadataEntry, MetadataStore};
pub use options::{Access, DatasetOptions, OpenFlags};
