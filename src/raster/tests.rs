use crate::dataset::Dataset;
use crate::errors::GeoError;
use crate::metadata::Metadata;
use crate::raster::{Buffer, ByteBuffer, DataType, RasterCreationOption, ResampleAlg};
use crate::test_utils::{mem_byte_raster, TempFixture};
use crate::DriverManager;

#[cfg(feature = "ndarray")]
use ndarray::arr2;

#[test]
fn test_get_raster_size() {
    let dataset = mem_byte_raster();
    let (size_x, size_y) = dataset.raster_size();
    assert_eq!(size_x, 20);
    assert_eq!(size_y, 20);
}

#[test]
fn test_get_raster_band_count() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let dataset = driver.create("", 4, 4, 3).unwrap();
    assert_eq!(dataset.raster_count(), 3);
}

#[test]
fn test_checksum() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver.create("", 3, 2, 1).unwrap();
    let buffer = ByteBuffer::new((3, 2), vec![0, 1, 2, 3, 4, 5]).unwrap();
    let band = dataset.rasterband_mut(1).unwrap();
    band.write((0, 0), (3, 2), &buffer).unwrap();
    // 0 % 7 + 1 % 11 + 2 % 13 + 3 % 17 + 4 % 19 + 5 % 23
    assert_eq!(band.checksum(), 15);
    assert_eq!(band.checksum_window((1, 1), (2, 1)).unwrap(), 4 % 7 + 5 % 11);
}

#[test]
fn test_checksum_of_floats_rounds_half_up() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver
        .create_with_band_type::<f64, _>("", 2, 1, 1)
        .unwrap();
    let band = dataset.rasterband_mut(1).unwrap();
    band.write((0, 0), (2, 1), &Buffer::new((2, 1), vec![1.5f64, 0.4]).unwrap())
        .unwrap();
    assert_eq!(band.checksum(), 2);
}

#[test]
fn test_checksum_is_reproducible() {
    let dataset = mem_byte_raster();
    let band = dataset.rasterband(1).unwrap();
    assert_eq!(band.checksum(), band.clone().checksum());
}

#[test]
fn test_read_raster_with_resampling() {
    let dataset = mem_byte_raster();
    let band = dataset.rasterband(1).unwrap();
    let full = band.read_band_as::<u8>().unwrap();
    let rv = band
        .read_as::<u8>((0, 0), (20, 20), (10, 10), Some(ResampleAlg::NearestNeighbour))
        .unwrap();
    assert_eq!(rv.shape(), (10, 10));
    // nearest neighbour picks the centre of each 2x2 block
    assert_eq!(rv.get(0, 0), full.get(1, 1));
    assert_eq!(rv.get(3, 2), full.get(7, 5));

    let avg = band
        .read_as::<f64>((0, 0), (2, 2), (1, 1), Some(ResampleAlg::Average))
        .unwrap();
    let expected = (0..2)
        .flat_map(|y| (0..2).map(move |x| (x, y)))
        .map(|(x, y)| full.get(x, y).unwrap() as f64)
        .sum::<f64>()
        / 4.0;
    assert_eq!(avg.data()[0], expected);
}

#[test]
fn test_read_window_out_of_range() {
    let dataset = mem_byte_raster();
    let band = dataset.rasterband(1).unwrap();
    assert!(band.read_as::<u8>((15, 15), (10, 10), (10, 10), None).is_err());
    assert!(band.read_as::<u8>((-1, 0), (2, 2), (2, 2), None).is_err());
}

#[test]
fn test_write_coerces_values() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver
        .create_with_band_type::<i16, _>("", 4, 1, 1)
        .unwrap();
    let band = dataset.rasterband_mut(1).unwrap();
    let buffer = Buffer::new((4, 1), vec![-40000.0f64, 40000.0, 1.5, f64::NAN]).unwrap();
    band.write((0, 0), (4, 1), &buffer).unwrap();
    let data = band.read_band_as::<i16>().unwrap();
    assert_eq!(data.data(), &[i16::MIN, i16::MAX, 2, 0]);
}

#[test]
fn test_no_data_value() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver.create("", 2, 2, 1).unwrap();
    let band = dataset.rasterband_mut(1).unwrap();
    assert_eq!(band.no_data_value(), None);
    band.set_no_data_value(Some(255.0)).unwrap();
    assert_eq!(band.no_data_value(), Some(255.0));
    assert!(band.set_no_data_value(Some(-1.0)).is_err());
    band.set_no_data_value(None).unwrap();
    assert_eq!(band.no_data_value(), None);
}

#[test]
fn test_compute_min_max_skips_no_data() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver.create("", 3, 1, 1).unwrap();
    let band = dataset.rasterband_mut(1).unwrap();
    band.write((0, 0), (3, 1), &ByteBuffer::new((3, 1), vec![0, 7, 200]).unwrap())
        .unwrap();
    band.set_no_data_value(Some(0.0)).unwrap();
    let stats = band.compute_raster_min_max(true).unwrap();
    assert_eq!(stats.min, 7.0);
    assert_eq!(stats.max, 200.0);

    band.fill(0.0, None);
    assert!(band.compute_raster_min_max(false).is_err());
}

#[test]
fn test_band_type_and_size() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let dataset = driver
        .create_with_band_type::<u16, _>("", 5, 3, 2)
        .unwrap();
    for band in dataset.rasterbands() {
        assert_eq!(band.band_type(), DataType::UInt16);
        assert_eq!(band.size(), (5, 3));
    }
}

#[test]
fn test_complex_band_checksum_includes_imaginary() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver
        .create_with_datatype("", 1, 1, 1, DataType::CInt16, &[])
        .unwrap();
    let band = dataset.rasterband_mut(1).unwrap();
    band.fill(3.0, Some(4.0));
    // 3 % 7 + 4 % 11
    assert_eq!(band.checksum(), 7);
}

#[test]
fn test_write_close_and_reopen() {
    let fixture = TempFixture::empty("written.tif");
    let checksum;
    {
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut dataset = driver
            .create_with_band_type_with_options::<u8, _>(
                &fixture,
                20,
                20,
                1,
                &[RasterCreationOption {
                    key: "TFW",
                    value: "NO",
                }],
            )
            .unwrap();
        let src = mem_byte_raster();
        let data = src.rasterband(1).unwrap().read_band_as::<u8>().unwrap();
        let band = dataset.rasterband_mut(1).unwrap();
        band.write((0, 0), (20, 20), &data).unwrap();
        band.set_description("gradient");
        checksum = band.checksum();
        dataset.close().unwrap();
    }
    let dataset = Dataset::open(&fixture).unwrap();
    let band = dataset.rasterband(1).unwrap();
    assert_eq!(band.checksum(), checksum);
    assert_eq!(band.description(), "gradient");
}

#[test]
fn test_create_rejects_unsupported_type() {
    let fixture = TempFixture::empty("complex.tif");
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let err = driver
        .create_with_datatype(&fixture, 2, 2, 1, DataType::CFloat32, &[])
        .unwrap_err();
    assert!(matches!(err, GeoError::CreateFailed { .. }));
}

#[test]
#[cfg(feature = "ndarray")]
fn test_read_raster_as_array() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut dataset = driver.create("", 3, 2, 1).unwrap();
    let band = dataset.rasterband_mut(1).unwrap();
    band.write((0, 0), (3, 2), &ByteBuffer::new((3, 2), vec![1, 2, 3, 4, 5, 6]).unwrap())
        .unwrap();
    let values = band.read_as_array::<u8>((1, 0), (2, 2), (2, 2), None).unwrap();
    assert_eq!(values, arr2(&[[2, 3], [5, 6]]));
}
