use crate::errors::{GeoError, Result};
use crate::raster::RasterType;

#[cfg(feature = "ndarray")]
use ndarray::Array2;

/// A 2-D array backed by its `shape` (cols, rows) and a row-major `Vec<T>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer<T> {
    shape: (usize, usize),
    data: Vec<T>,
}

impl<T: RasterType> Buffer<T> {
    /// Construct a new buffer from `shape` (`(cols, rows)`) and `Vec<T>`.
    ///
    /// Fails if `shape.0 * shape.1 != data.len()`.
    pub fn new(shape: (usize, usize), data: Vec<T>) -> Result<Self> {
        if shape.0 * shape.1 != data.len() {
            return Err(GeoError::BadArgument(format!(
                "shape {:?} does not match length {}",
                shape,
                data.len()
            )));
        }
        Ok(Buffer { shape, data })
    }

    /// A buffer of `shape` filled with `value`.
    pub fn filled(shape: (usize, usize), value: T) -> Self {
        Buffer {
            shape,
            data: vec![value; shape.0 * shape.1],
        }
    }

    /// `(cols, rows)`
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_shape_and_vec(self) -> ((usize, usize), Vec<T>) {
        (self.shape, self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if x >= self.shape.0 || y >= self.shape.1 {
            return None;
        }
        self.data.get(y * self.shape.0 + x).copied()
    }

    #[cfg(feature = "ndarray")]
    /// Convert `self` into an [`ndarray::Array2`].
    pub fn to_array(self) -> Result<Array2<T>> {
        // Array2 shape is (rows, cols) and Buffer shape is (cols in x-axis, rows in y-axis)
        Ok(Array2::from_shape_vec(
            (self.shape.1, self.shape.0),
            self.data,
        )?)
    }
}

pub type ByteBuffer = Buffer<u8>;

#[cfg(feature = "ndarray")]
impl<T: RasterType> TryFrom<Buffer<T>> for Array2<T> {
    type Error = GeoError;

    fn try_from(value: Buffer<T>) -> Result<Self> {
        value.to_array()
    }
}

#[cfg(feature = "ndarray")]
impl<T: RasterType> From<Array2<T>> for Buffer<T> {
    fn from(value: Array2<T>) -> Self {
        // Array2 shape is (rows, cols) and Buffer shape is (cols in x-axis, rows in y-axis)
        let shape = value.shape();
        let (rows, cols) = (shape[0], shape[1]);
        let data = value
            .as_standard_layout()
            .iter()
            .copied()
            .collect::<Vec<T>>();
        Buffer {
            shape: (cols, rows),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::raster::Buffer;

    #[test]
    fn test_shape_mismatch() {
        assert!(Buffer::new((3, 2), vec![0u8; 5]).is_err());
        let b = Buffer::new((3, 2), vec![0u8, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(b.get(1, 1), Some(4));
        assert_eq!(b.get(3, 0), None);
    }

    #[cfg(feature = "ndarray")]
    #[test]
    fn convert_to() {
        let b = Buffer::new((5, 10), (0..5 * 10).collect()).unwrap();
        let a = b.clone().to_array().unwrap();
        let b2: Buffer<i32> = a.into();
        assert_eq!(b, b2);
    }

    #[cfg(feature = "ndarray")]
    #[test]
    fn convert_from() {
        use ndarray::Array2;
        let a = Array2::from_shape_fn((10, 5), |(y, x)| y as i32 * 10 + x as i32);
        let b: Buffer<_> = a.clone().into();
        let a2 = b.to_array().unwrap();
        assert_eq!(a, a2);
    }
}
