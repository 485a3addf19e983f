use std::path::{Path, PathBuf};

use geo_types::{polygon, Geometry};

use crate::raster::Buffer;
use crate::spatial_ref::SpatialRef;
use crate::vector::{Feature, FieldDefn, FieldType, GeometryType, LayerOptions};
use crate::{Dataset, DriverManager};

/// A struct that contains a temporary directory and a path to a file in that directory.
pub struct TempFixture {
    _temp_dir: tempfile::TempDir,
    temp_path: PathBuf,
}

impl TempFixture {
    /// Creates a temporary directory and path to a non-existent file with given `name`.
    /// Useful for writing results to during testing
    ///
    /// Returns the struct `TempFixture` that contains the temp dir (for clean-up on `drop`)
    /// as well as the empty file path.
    pub fn empty(name: &str) -> Self {
        let _temp_dir = tempfile::tempdir().unwrap();
        let temp_path = _temp_dir.path().join(name);
        Self {
            _temp_dir,
            temp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.temp_path
    }
}

impl AsRef<Path> for TempFixture {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Geo-transform of the in-memory test rasters, in UTM zone 11N.
pub const TEST_GEO_TRANSFORM: [f64; 6] = [440720.0, 60.0, 0.0, 3751320.0, 0.0, -60.0];

/// A 20x20 `Byte` raster in EPSG:32611 with a diagonal gradient.
pub fn mem_byte_raster() -> Dataset {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver.create("", 20, 20, 1).unwrap();
    dataset.set_geo_transform(&TEST_GEO_TRANSFORM).unwrap();
    dataset.set_spatial_ref(Some(SpatialRef::from_epsg(32611).unwrap()));
    let data: Vec<u8> = (0..400).map(|i| ((i % 20) * 7 + (i / 20) * 3) as u8).collect();
    let buffer = Buffer::new((20, 20), data).unwrap();
    dataset
        .rasterband_mut(1)
        .unwrap()
        .write((0, 0), (20, 20), &buffer)
        .unwrap();
    dataset
}

/// A 20x10 three band `Byte` raster with a different pattern per band.
pub fn mem_rgb_raster() -> Dataset {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver.create("", 20, 10, 3).unwrap();
    dataset.set_geo_transform(&TEST_GEO_TRANSFORM).unwrap();
    for band in 1..=3usize {
        let data: Vec<u8> = (0..200usize)
            .map(|i| ((i * band * 11 + band * 40) % 256) as u8)
            .collect();
        let buffer = Buffer::new((20, 10), data).unwrap();
        dataset
            .rasterband_mut(band)
            .unwrap()
            .write((0, 0), (20, 10), &buffer)
            .unwrap();
    }
    dataset
}

const POLY_ROWS: [(f64, i64, &str); 10] = [
    (215229.266, 168, "35043411"),
    (247328.172, 179, "35043423"),
    (261752.781, 171, "35043414"),
    (547597.188, 173, "35043416"),
    (15775.758, 172, "35043415"),
    (101429.977, 169, "35043412"),
    (268597.625, 166, "35043409"),
    (1634833.375, 158, "35043369"),
    (596610.313, 165, "35043408"),
    (5268.813, 170, "35043413"),
];

/// An in-memory vector dataset with one `poly` layer of ten triangles and
/// the fields `AREA` (Real), `EAS_ID` (Integer64) and `PRFEDEA` (String).
pub fn mem_poly_dataset() -> Dataset {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver.create_vector_only("").unwrap();
    let layer = dataset
        .create_layer(LayerOptions {
            name: "poly",
            ty: GeometryType::Polygon,
            ..Default::default()
        })
        .unwrap();
    layer
        .create_field(FieldDefn::new("AREA", FieldType::Real))
        .unwrap();
    layer
        .create_field(FieldDefn::new("EAS_ID", FieldType::Integer64))
        .unwrap();
    layer
        .create_field(FieldDefn::new("PRFEDEA", FieldType::String))
        .unwrap();
    for (i, (area, eas_id, prfedea)) in POLY_ROWS.iter().enumerate() {
        let x = 479_000.0 + i as f64 * 100.0;
        let y = 4_764_000.0 + i as f64 * 100.0;
        let mut feature = Feature::new(layer.defn());
        feature.set_geometry(Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + 80.0, y: y),
            (x: x, y: y + 80.0),
        ]));
        feature.set_field_double("AREA", *area).unwrap();
        feature.set_field_integer64("EAS_ID", *eas_id).unwrap();
        feature.set_field_string("PRFEDEA", prfedea).unwrap();
        layer.create_feature(feature).unwrap();
    }
    dataset
}

/// Assert numerical difference between two expressions is less than
/// 64-bit machine epsilon or a specified epsilon.
///
/// # Examples:
/// ```rust, no_run
/// use geoconvert::assert_near;
/// use std::f64::consts::{PI, E};
/// assert_near!(PI / E, 1.1557273497909217);
/// // with specified epsilon
/// assert_near!(PI / E, 1.15572734, epsilon = 1e-8);
/// ```
#[macro_export]
macro_rules! assert_near {
    ($left:expr, $right:expr) => {
        $crate::assert_near!($left, $right, epsilon = f64::EPSILON)
    };
    ($left:expr, $right:expr, epsilon = $ep:expr) => {
        assert!(
            ($left - $right).abs() < $ep,
            "|{} - {}| = {} is greater than epsilon {:.4e}",
            $left,
            $right,
            ($left - $right).abs(),
            $ep
        )
    };
    ($left:expr, $right:expr, epsilon = $ep:expr, field = $field:expr) => {
        assert!(
            ($left - $right).abs() < $ep,
            "field {}: |{} - {}| = {} is greater than epsilon {:.4e}",
            $field,
            $left,
            $right,
            ($left - $right).abs(),
            $ep
        )
    };
    // Pseudo-specialization
    (MinMax, $left:expr, $right:expr, epsilon = $ep:expr) => {
        $crate::assert_near!($left.min, $right.min, epsilon = $ep, field = "min");
        $crate::assert_near!($left.max, $right.max, epsilon = $ep, field = "max");
    };
}
