use crate::errors::{GeoError, Result};
use crate::metadata::{Metadata, MetadataStore};
use crate::raster::resample::{pixel_count, read_window, Grid, ResampleAlg};
use crate::raster::{Buffer, DataType, RasterType};

#[cfg(feature = "ndarray")]
use ndarray::Array2;

/// Primes cycled through by [`RasterBand::checksum`].
const CHECKSUM_PRIMES: [i64; 11] = [7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43];

/// Minimum and maximum of the valid (non-nodata) pixels of a band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxStatistics {
    pub min: f64,
    pub max: f64,
}

/// Represents a single band of a dataset.
///
/// Samples are held as `f64`, already coerced to the band's [`DataType`].
/// Complex bands keep their imaginary parts in a second plane.
#[derive(Clone, Debug)]
pub struct RasterBand {
    data_type: DataType,
    size: (usize, usize),
    data: Vec<f64>,
    imaginary: Option<Vec<f64>>,
    no_data: Option<f64>,
    scale: Option<f64>,
    offset: Option<f64>,
    metadata: MetadataStore,
}

impl RasterBand {
    /// A zero-filled band.
    pub(crate) fn new(data_type: DataType, size: (usize, usize)) -> RasterBand {
        let pixels = size.0 * size.1;
        RasterBand {
            data_type,
            size,
            data: vec![0.0; pixels],
            imaginary: data_type.is_complex().then(|| vec![0.0; pixels]),
            no_data: None,
            scale: None,
            offset: None,
            metadata: MetadataStore::new(),
        }
    }

    /// Build a band from decoded samples. Values are coerced to `data_type`.
    pub(crate) fn from_samples(
        data_type: DataType,
        size: (usize, usize),
        data: Vec<f64>,
        imaginary: Option<Vec<f64>>,
    ) -> Result<RasterBand> {
        let pixels = size.0 * size.1;
        if data.len() != pixels || imaginary.as_ref().is_some_and(|im| im.len() != pixels) {
            return Err(GeoError::BadArgument(format!(
                "sample count does not match band size {}x{}",
                size.0, size.1
            )));
        }
        let mut band = RasterBand::new(data_type, size);
        band.set_samples(data, imaginary);
        Ok(band)
    }

    /// Get x-size of the band
    pub fn x_size(&self) -> usize {
        self.size.0
    }

    /// Get y-size of the band
    pub fn y_size(&self) -> usize {
        self.size.1
    }

    /// Get dimensions of the band as `(cols, rows)`.
    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn band_type(&self) -> DataType {
        self.data_type
    }

    pub fn no_data_value(&self) -> Option<f64> {
        self.no_data
    }

    /// Set the nodata value, or remove it with `None`.
    ///
    /// The value must be representable in the band's data type.
    pub fn set_no_data_value(&mut self, no_data: Option<f64>) -> Result<()> {
        if let Some(value) = no_data {
            if !self.data_type.is_representable(value) {
                return Err(GeoError::BadArgument(format!(
                    "nodata value {value} is out of range for {}",
                    self.data_type
                )));
            }
        }
        self.no_data = no_data;
        Ok(())
    }

    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Option<f64>) {
        self.scale = scale;
    }

    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Option<f64>) {
        self.offset = offset;
    }

    pub(crate) fn samples(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn imaginary_samples(&self) -> Option<&[f64]> {
        self.imaginary.as_deref()
    }

    /// Replace every sample; a real-only input on a complex band zeroes the
    /// imaginary plane.
    pub(crate) fn set_samples(&mut self, data: Vec<f64>, imaginary: Option<Vec<f64>>) {
        let data_type = self.data_type;
        self.data = data.into_iter().map(|v| data_type.coerce(v)).collect();
        if data_type.is_complex() {
            let pixels = self.data.len();
            self.imaginary = Some(match imaginary {
                Some(im) => im.into_iter().map(|v| data_type.coerce(v)).collect(),
                None => vec![0.0; pixels],
            });
        }
    }

    fn check_window(&self, window: (isize, isize), window_size: (usize, usize)) -> Result<()> {
        if window_size.0 == 0 || window_size.1 == 0 {
            return Err(GeoError::BadArgument("empty access window".to_string()));
        }
        if window.0 < 0
            || window.1 < 0
            || window.0 as usize + window_size.0 > self.size.0
            || window.1 as usize + window_size.1 > self.size.1
        {
            return Err(GeoError::BadArgument(format!(
                "access window {:?}+{:?} is out of range for a {}x{} band",
                window, window_size, self.size.0, self.size.1
            )));
        }
        Ok(())
    }

    /// Resampled read of a window that may extend past the band edges; pixels
    /// outside are filled with the nodata value, or 0.
    pub(crate) fn read_window_samples(
        &self,
        window: (isize, isize),
        window_size: (usize, usize),
        size: (usize, usize),
        resample_alg: ResampleAlg,
    ) -> (Vec<f64>, Option<Vec<f64>>) {
        let grid = Grid {
            data: &self.data,
            size: self.size,
            no_data: self.no_data,
        };
        let real = read_window(&grid, window, window_size, size, resample_alg);
        let imaginary = self.imaginary.as_ref().map(|im| {
            let grid = Grid {
                data: im,
                size: self.size,
                no_data: None,
            };
            read_window(&grid, window, window_size, size, resample_alg)
        });
        (real, imaginary)
    }

    /// Read a 'Buffer<T>' from this band. T implements 'RasterType'
    ///
    /// # Arguments
    /// * window - the window position from top left
    /// * window_size - the window size (data is resampled if window_size != size)
    /// * size - the desired size of the 'Buffer'
    /// * resample_alg - the resample algorithm (nearest neighbour if `None`)
    pub fn read_as<T: RasterType>(
        &self,
        window: (isize, isize),
        window_size: (usize, usize),
        size: (usize, usize),
        resample_alg: Option<ResampleAlg>,
    ) -> Result<Buffer<T>> {
        self.check_window(window, window_size)?;
        if size.0 == 0 || size.1 == 0 {
            return Err(GeoError::BadArgument("empty buffer size".to_string()));
        }
        if pixel_count(size).is_none() {
            return Err(GeoError::BadArgument(format!(
                "buffer size {}x{} is too large",
                size.0, size.1
            )));
        }
        let (samples, _) =
            self.read_window_samples(window, window_size, size, resample_alg.unwrap_or_default());
        Buffer::new(size, samples.into_iter().map(T::from_f64).collect())
    }

    /// Read the full band as a 'Buffer<T>'.
    pub fn read_band_as<T: RasterType>(&self) -> Result<Buffer<T>> {
        let size = self.size();
        self.read_as::<T>((0, 0), size, size, None)
    }

    #[cfg(feature = "ndarray")]
    /// Read a 'Array2<T>' from this band. T implements 'RasterType'.
    ///
    /// The Matrix shape is (rows, cols) and raster shape is (cols in x-axis, rows in y-axis).
    pub fn read_as_array<T: RasterType>(
        &self,
        window: (isize, isize),
        window_size: (usize, usize),
        array_size: (usize, usize),
        resample_alg: Option<ResampleAlg>,
    ) -> Result<Array2<T>> {
        self.read_as::<T>(window, window_size, array_size, resample_alg)?
            .to_array()
    }

    /// Write a 'Buffer<T>' into this band.
    ///
    /// # Arguments
    /// * window - the window position from top left
    /// * window_size - the window size (nearest neighbour resampling if window_size != Buffer.shape)
    /// * buffer - the data to write; values are coerced to the band type
    pub fn write<T: RasterType>(
        &mut self,
        window: (isize, isize),
        window_size: (usize, usize),
        buffer: &Buffer<T>,
    ) -> Result<()> {
        self.check_window(window, window_size)?;
        let shape = buffer.shape();
        let values: Vec<f64> = buffer.data().iter().map(|v| v.to_f64()).collect();
        let values = if shape == window_size {
            values
        } else {
            let grid = Grid {
                data: &values,
                size: shape,
                no_data: None,
            };
            read_window(
                &grid,
                (0, 0),
                shape,
                window_size,
                ResampleAlg::NearestNeighbour,
            )
        };

        let (x_off, y_off) = (window.0 as usize, window.1 as usize);
        for row in 0..window_size.1 {
            let dst = (y_off + row) * self.size.0 + x_off;
            let src = row * window_size.0;
            for col in 0..window_size.0 {
                self.data[dst + col] = self.data_type.coerce(values[src + col]);
                if let Some(im) = self.imaginary.as_mut() {
                    im[dst + col] = 0.0;
                }
            }
        }
        Ok(())
    }

    /// Fill the band with `value` (and `imaginary` for complex bands).
    pub fn fill(&mut self, value: f64, imaginary: Option<f64>) {
        let value = self.data_type.coerce(value);
        self.data.iter_mut().for_each(|v| *v = value);
        if let Some(im) = self.imaginary.as_mut() {
            let imaginary = self.data_type.coerce(imaginary.unwrap_or(0.0));
            im.iter_mut().for_each(|v| *v = imaginary);
        }
    }

    /// Compute the 16-bit checksum of the band.
    ///
    /// Values are read as 32-bit integers (floating point samples rounded with
    /// `floor(v + 0.5)` and clamped), each taken modulo the next of a cycle of
    /// eleven primes. Complex bands contribute the real then the imaginary part
    /// of every pixel.
    pub fn checksum(&self) -> u16 {
        self.checksum_window((0, 0), self.size)
            .unwrap_or_default()
    }

    /// Checksum of a window of the band.
    pub fn checksum_window(
        &self,
        window: (isize, isize),
        window_size: (usize, usize),
    ) -> Result<u16> {
        self.check_window(window, window_size)?;
        let mut checksum: i64 = 0;
        let mut prime = 0usize;
        let (x_off, y_off) = (window.0 as usize, window.1 as usize);
        for row in y_off..y_off + window_size.1 {
            for col in x_off..x_off + window_size.0 {
                let idx = row * self.size.0 + col;
                let parts = [Some(self.data[idx]), self.imaginary.as_ref().map(|im| im[idx])];
                for value in parts.into_iter().flatten() {
                    checksum += checksum_value(value) % CHECKSUM_PRIMES[prime];
                    prime = (prime + 1) % CHECKSUM_PRIMES.len();
                }
            }
            checksum &= 0xffff;
        }
        Ok((checksum & 0xffff) as u16)
    }

    /// Compute the minimum and maximum of the valid pixels.
    ///
    /// Nodata and NaN samples are ignored. Fails if the band has no valid pixel.
    /// Values are always computed exactly, `is_approx_ok` is accepted for API
    /// compatibility.
    pub fn compute_raster_min_max(&self, _is_approx_ok: bool) -> Result<MinMaxStatistics> {
        let mut stats: Option<MinMaxStatistics> = None;
        for &v in &self.data {
            if v.is_nan() || self.no_data == Some(v) {
                continue;
            }
            stats = Some(match stats {
                Some(s) => MinMaxStatistics {
                    min: s.min.min(v),
                    max: s.max.max(v),
                },
                None => MinMaxStatistics { min: v, max: v },
            });
        }
        stats.ok_or_else(|| {
            GeoError::BadArgument("band contains no valid pixel".to_string())
        })
    }
}

/// Integer value of a sample as seen by the checksum.
fn checksum_value(value: f64) -> i64 {
    if !value.is_finite() {
        return i32::MIN as i64;
    }
    let value = value + 0.5;
    if value < -2_147_483_647.0 {
        -2_147_483_647
    } else if value > 2_147_483_647.0 {
        2_147_483_647
    } else {
        value.floor() as i64
    }
}

impl Metadata for RasterBand {
    fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    fn metadata_store_mut(&mut self) -> &mut MetadataStore {
        &mut self.metadata
    }
}
