//! Raster Data
//!
//! Bands hold their samples in memory as `f64`, coerced to the band's
//! [`DataType`]. Persistent formats read on open and write on flush.

mod buffer;
pub(crate) mod gtiff;
mod rasterband;
mod resample;
mod types;

pub use buffer::{Buffer, ByteBuffer};
pub use rasterband::{MinMaxStatistics, RasterBand};
pub(crate) use resample::pixel_count;
pub use resample::ResampleAlg;
pub use types::{DataType, RasterType};

#[derive(Debug)]
pub struct RasterCreationOption<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

#[cfg(test)]
mod tests;
