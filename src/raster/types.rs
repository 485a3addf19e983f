use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::{GeoError, Result};

/// Pixel data type of a raster band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
    CInt16,
    CInt32,
    CFloat32,
    CFloat64,
}

impl DataType {
    /// All supported data types.
    pub fn available_types() -> &'static [DataType] {
        use DataType::*;
        &[
            Byte, UInt16, Int16, UInt32, Int32, Float32, Float64, CInt16, CInt32, CFloat32,
            CFloat64,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Byte => "Byte",
            DataType::UInt16 => "UInt16",
            DataType::Int16 => "Int16",
            DataType::UInt32 => "UInt32",
            DataType::Int32 => "Int32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::CInt16 => "CInt16",
            DataType::CInt32 => "CInt32",
            DataType::CFloat32 => "CFloat32",
            DataType::CFloat64 => "CFloat64",
        }
    }

    /// Get the type size in **bits**.
    pub fn bits(&self) -> u8 {
        self.bytes() * 8
    }

    /// Get the type size in **bytes**.
    pub fn bytes(&self) -> u8 {
        match self {
            DataType::Byte => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 | DataType::CInt16 => 4,
            DataType::Float64 | DataType::CInt32 | DataType::CFloat32 => 8,
            DataType::CFloat64 => 16,
        }
    }

    /// Returns `true` if data type is integral (non-floating point)
    pub fn is_integer(&self) -> bool {
        matches!(
            self.component_type(),
            DataType::Byte | DataType::UInt16 | DataType::Int16 | DataType::UInt32 | DataType::Int32
        )
    }

    /// Returns `true` if data type is floating point (non-integral)
    pub fn is_floating(&self) -> bool {
        !self.is_integer()
    }

    /// Returns `true` if data type supports negative values.
    pub fn is_signed(&self) -> bool {
        !matches!(self, DataType::Byte | DataType::UInt16 | DataType::UInt32)
    }

    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            DataType::CInt16 | DataType::CInt32 | DataType::CFloat32 | DataType::CFloat64
        )
    }

    /// The type of each component of a complex type; `self` for real types.
    pub fn component_type(&self) -> DataType {
        match self {
            DataType::CInt16 => DataType::Int16,
            DataType::CInt32 => DataType::Int32,
            DataType::CFloat32 => DataType::Float32,
            DataType::CFloat64 => DataType::Float64,
            other => *other,
        }
    }

    /// Inclusive value range of one component.
    pub fn range(&self) -> (f64, f64) {
        match self.component_type() {
            DataType::Byte => (u8::MIN as f64, u8::MAX as f64),
            DataType::UInt16 => (u16::MIN as f64, u16::MAX as f64),
            DataType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            DataType::UInt32 => (u32::MIN as f64, u32::MAX as f64),
            DataType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            DataType::Float32 => (f32::MIN as f64, f32::MAX as f64),
            _ => (f64::MIN, f64::MAX),
        }
    }

    /// Convert `value` to the nearest value representable by one component
    /// of this type.
    ///
    /// Integer types round to nearest and clamp to their range; `NaN` becomes
    /// `0`. Float32 clamps finite values to its range and drops precision.
    pub fn coerce(&self, value: f64) -> f64 {
        let (min, max) = self.range();
        match self.component_type() {
            DataType::Float64 => value,
            DataType::Float32 => {
                if value.is_finite() {
                    value.clamp(min, max) as f32 as f64
                } else {
                    value
                }
            }
            _ if value.is_nan() => 0.0,
            _ => value.round().clamp(min, max),
        }
    }

    /// `true` if `value` is exactly representable by one component.
    pub fn is_representable(&self, value: f64) -> bool {
        (value.is_nan() && self.is_floating()) || self.coerce(value) == value
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        DataType::available_types()
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| GeoError::BadArgument(format!("unknown data type '{s}'")))
    }
}

/// Type-level constraint for limiting which primitive numeric values can be passed
/// to functions needing target data type.
pub trait RasterType: Copy + Default + PartialEq + std::fmt::Debug {
    fn datatype() -> DataType;

    /// Convert from the internal `f64` sample representation, rounding and
    /// clamping as [`DataType::coerce`] does.
    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! impl_raster_type {
    ($t:ty, $dt:expr) => {
        impl RasterType for $t {
            fn datatype() -> DataType {
                $dt
            }

            fn from_f64(value: f64) -> Self {
                $dt.coerce(value) as $t
            }

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_raster_type!(u8, DataType::Byte);
impl_raster_type!(u16, DataType::UInt16);
impl_raster_type!(i16, DataType::Int16);
impl_raster_type!(u32, DataType::UInt32);
impl_raster_type!(i32, DataType::Int32);
impl_raster_type!(f32, DataType::Float32);
impl_raster_type!(f64, DataType::Float64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for t in DataType::available_types() {
            assert_eq!(t.name().parse::<DataType>().unwrap(), *t);
        }
        assert!("Int64x".parse::<DataType>().is_err());
        assert_eq!("byte".parse::<DataType>().unwrap(), DataType::Byte);
    }

    #[test]
    fn test_sizes_and_flags() {
        assert_eq!(DataType::Byte.bits(), 8);
        assert_eq!(DataType::CFloat64.bytes(), 16);
        assert!(DataType::CInt16.is_integer());
        assert!(DataType::CInt16.is_complex());
        assert!(!DataType::UInt32.is_signed());
        assert!(DataType::Float32.is_floating());
    }

    #[test]
    fn test_coerce_exact_in_range() {
        assert_eq!(DataType::Int16.coerce(-123.0), -123.0);
        assert_eq!(DataType::Byte.coerce(255.0), 255.0);
        assert_eq!(DataType::Float32.coerce(0.5), 0.5);
    }

    #[test]
    fn test_coerce_rounds_and_clamps() {
        assert_eq!(DataType::Byte.coerce(300.0), 255.0);
        assert_eq!(DataType::Byte.coerce(-5.0), 0.0);
        assert_eq!(DataType::Byte.coerce(2.5), 3.0);
        assert_eq!(DataType::Int16.coerce(-2.5), -3.0);
        assert_eq!(DataType::Int16.coerce(40000.0), 32767.0);
        assert_eq!(DataType::UInt32.coerce(f64::NAN), 0.0);
        assert_eq!(DataType::Float32.coerce(1e300), f32::MAX as f64);
        assert!(DataType::Float32.coerce(f64::NAN).is_nan());
        assert_eq!(DataType::CInt16.coerce(1e6), 32767.0);
    }

    #[test]
    fn test_raster_type_conversion() {
        assert_eq!(u8::from_f64(254.6), 255);
        assert_eq!(i16::from_f64(-1e9), i16::MIN);
        assert_eq!(<f64 as RasterType>::datatype(), DataType::Float64);
        assert_eq!(7u16.to_f64(), 7.0);
    }
}
