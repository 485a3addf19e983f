//! Conversion and reporting programs, modelled on `gdal_translate`,
//! `ogr2ogr` and `gdalinfo`/`ogrinfo`.

pub mod destination;
pub mod info;
pub mod raster;
pub mod vector;

pub use destination::DatasetDestination;
