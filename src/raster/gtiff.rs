//! GeoTIFF driver.
//!
//! Writes baseline, uncompressed, pixel-interleaved TIFF files with a single
//! strip, plus the GeoTIFF georeferencing tags, the `GDAL_NODATA` tag and the
//! `GDAL_METADATA` XML tag. Reads any file the `tiff` crate decodes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;

use log::{debug, warn};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

use crate::config::get_config_bool;
use crate::dataset::Dataset;
use crate::driver::{Driver, DriverCapabilities};
use crate::errors::*;
use crate::geo_transform::GeoTransform;
use crate::metadata::{is_xml_domain, Metadata};
use crate::raster::{DataType, RasterBand};
use crate::spatial_ref::{CrsKind, SpatialRef};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_METADATA: u16 = 42112;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GT_CITATION: u16 = 1026;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Creation options understood by the driver.
const CREATION_OPTIONS: [&str; 2] = ["COMPRESS", "TFW"];

pub(crate) fn driver() -> Driver {
    Driver::new(
        "GTiff",
        "GeoTIFF",
        DriverCapabilities::RASTER
            | DriverCapabilities::CREATE
            | DriverCapabilities::UNIFORM_BAND_TYPE,
    )
    .with_extensions(&["tif", "tiff"])
    .with_creation_data_types(&[
        DataType::Byte,
        DataType::UInt16,
        DataType::Int16,
        DataType::UInt32,
        DataType::Int32,
        DataType::Float32,
        DataType::Float64,
    ])
    .with_probe(probe)
    .with_open(open)
    .with_save(save)
    .with_delete(delete)
}

fn probe(_path: &Path, header: &[u8]) -> bool {
    header.starts_with(b"II*\0") || header.starts_with(b"MM\0*")
}

fn delete(path: &Path) -> Result<()> {
    std::fs::remove_file(path).with_write_context(path)?;
    let world_file = path.with_extension("tfw");
    if world_file.is_file() {
        std::fs::remove_file(&world_file).with_write_context(&world_file)?;
    }
    Ok(())
}

/// TIFF `(BitsPerSample, SampleFormat)` of a data type.
fn sample_layout(data_type: DataType) -> Option<(u16, u16)> {
    match data_type {
        DataType::Byte => Some((8, 1)),
        DataType::UInt16 => Some((16, 1)),
        DataType::Int16 => Some((16, 2)),
        DataType::UInt32 => Some((32, 1)),
        DataType::Int32 => Some((32, 2)),
        DataType::Float32 => Some((32, 3)),
        DataType::Float64 => Some((64, 3)),
        _ => None,
    }
}

fn open(path: &Path, driver: &Driver) -> Result<Dataset> {
    let file = File::open(path).with_open_context(path)?;
    let mut decoder = Decoder::new(BufReader::new(file)).with_open_context(path)?;
    let (width, height) = decoder.dimensions().with_open_context(path)?;
    let samples = match decoder.find_tag(Tag::SamplesPerPixel).with_open_context(path)? {
        Some(value) => value.into_u16().with_open_context(path)? as usize,
        None => 1,
    };

    let geo_transform = read_geo_transform(&mut decoder).with_open_context(path)?;
    let geo_keys = read_geo_keys(&mut decoder).with_open_context(path)?;
    let no_data = decoder
        .find_tag(Tag::Unknown(GDAL_NODATA))
        .ok()
        .flatten()
        .and_then(|v| v.into_string().ok())
        .and_then(|s| parse_no_data(&s));
    let gdal_metadata = decoder
        .find_tag(Tag::Unknown(GDAL_METADATA))
        .ok()
        .flatten()
        .and_then(|v| v.into_string().ok());

    let (data_type, values): (DataType, Vec<f64>) = match decoder.read_image().with_open_context(path)? {
        DecodingResult::U8(v) => (DataType::Byte, v.into_iter().map(f64::from).collect()),
        DecodingResult::U16(v) => (DataType::UInt16, v.into_iter().map(f64::from).collect()),
        DecodingResult::I16(v) => (DataType::Int16, v.into_iter().map(f64::from).collect()),
        DecodingResult::U32(v) => (DataType::UInt32, v.into_iter().map(f64::from).collect()),
        DecodingResult::I32(v) => (DataType::Int32, v.into_iter().map(f64::from).collect()),
        DecodingResult::F32(v) => (DataType::Float32, v.into_iter().map(f64::from).collect()),
        DecodingResult::F64(v) => (DataType::Float64, v),
        _ => {
            return Err(GeoError::OpenFailed {
                path: path.display().to_string(),
                msg: "unsupported TIFF sample format".to_string(),
            })
        }
    };

    let size = (width as usize, height as usize);
    let pixels = size.0 * size.1;
    if samples == 0 || values.len() != pixels * samples {
        return Err(GeoError::OpenFailed {
            path: path.display().to_string(),
            msg: format!(
                "decoded {} samples, expected {}x{}x{samples}",
                values.len(),
                size.0,
                size.1
            ),
        });
    }

    let mut dataset = Dataset::empty(driver, Some(path));
    dataset.set_raster_size(size)?;
    for band_idx in 0..samples {
        let data = values.iter().skip(band_idx).step_by(samples).copied().collect();
        let mut band = RasterBand::from_samples(data_type, size, data, None)?;
        if let Some(no_data) = no_data.filter(|v| data_type.is_representable(*v)) {
            band.set_no_data_value(Some(no_data))?;
        }
        dataset.push_band(band)?;
    }

    if let Some(mut gt) = geo_transform {
        if geo_keys.raster_type == Some(RASTER_PIXEL_IS_POINT) {
            gt[0] -= 0.5 * gt[1] + 0.5 * gt[2];
            gt[3] -= 0.5 * gt[4] + 0.5 * gt[5];
        }
        dataset.set_geo_transform(&gt)?;
    }
    dataset.set_spatial_ref(geo_keys.spatial_ref(path));
    if let Some(xml) = gdal_metadata {
        apply_gdal_metadata(&mut dataset, &xml);
    }
    debug!(
        "read GeoTIFF '{}': {}x{}, {samples} {data_type} band(s)",
        path.display(),
        size.0,
        size.1
    );
    Ok(dataset)
}

fn parse_no_data(value: &str) -> Option<f64> {
    let value = value.trim_end_matches('\0').trim();
    match value.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => value.parse().ok(),
    }
}

fn read_geo_transform<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
) -> tiff::TiffResult<Option<GeoTransform>> {
    if decoder.find_tag(Tag::Unknown(MODEL_TRANSFORMATION))?.is_some() {
        let m = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TRANSFORMATION))?;
        if m.len() >= 8 {
            return Ok(Some([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }
    if decoder.find_tag(Tag::Unknown(MODEL_TIEPOINT))?.is_none()
        || decoder.find_tag(Tag::Unknown(MODEL_PIXEL_SCALE))?.is_none()
    {
        return Ok(None);
    }
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT))?;
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))?;
    if tiepoint.len() < 6 || scale.len() < 2 {
        return Ok(None);
    }
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let (sx, sy) = (scale[0], scale[1]);
    Ok(Some([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy]))
}

#[derive(Debug, Default)]
struct GeoKeys {
    model_type: Option<u16>,
    raster_type: Option<u16>,
    code: Option<u16>,
    citation: Option<String>,
}

impl GeoKeys {
    fn spatial_ref(&self, path: &Path) -> Option<SpatialRef> {
        let from_citation = || {
            self.citation
                .as_deref()
                .and_then(|wkt| SpatialRef::from_wkt(wkt).ok())
        };
        match self.code.filter(|c| *c != USER_DEFINED) {
            Some(code) => SpatialRef::from_epsg(code as u32).ok().or_else(from_citation).or_else(|| {
                warn!(
                    "'{}': EPSG:{code} is not in the built-in registry, ignoring coordinate system",
                    path.display()
                );
                None
            }),
            None => {
                let srs = from_citation();
                if srs.is_none() && self.model_type.is_some() {
                    warn!(
                        "'{}': user-defined coordinate system without WKT citation",
                        path.display()
                    );
                }
                srs
            }
        }
    }
}

fn read_geo_keys<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
) -> tiff::TiffResult<GeoKeys> {
    let mut keys = GeoKeys::default();
    if decoder.find_tag(Tag::Unknown(GEO_KEY_DIRECTORY))?.is_none() {
        return Ok(keys);
    }
    let directory = decoder.get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY))?;
    let ascii = match decoder.find_tag(Tag::Unknown(GEO_ASCII_PARAMS))? {
        Some(_) => decoder.get_tag_ascii_string(Tag::Unknown(GEO_ASCII_PARAMS))?,
        None => String::new(),
    };
    for entry in directory.chunks_exact(4).skip(1) {
        let (id, location, count, value) = (entry[0], entry[1], entry[2], entry[3]);
        match (id, location) {
            (GT_MODEL_TYPE, 0) => keys.model_type = Some(value),
            (GT_RASTER_TYPE, 0) => keys.raster_type = Some(value),
            (GEOGRAPHIC_TYPE, 0) | (PROJECTED_CS_TYPE, 0) => {
                if keys.code.map_or(true, |c| c == USER_DEFINED) {
                    keys.code = Some(value);
                }
            }
            (GT_CITATION, GEO_ASCII_PARAMS) => {
                let start = value as usize;
                let end = (start + count as usize).min(ascii.len());
                keys.citation = ascii
                    .get(start..end)
                    .map(|s| s.trim_end_matches(['|', '\0']).to_string())
                    .filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }
    Ok(keys)
}

fn save(dataset: &Dataset, path: &Path) -> Result<()> {
    let write_failed = |msg: String| GeoError::WriteFailed {
        path: path.display().to_string(),
        msg,
    };
    let bands: Vec<&RasterBand> = dataset.rasterbands().collect();
    let Some(first) = bands.first() else {
        return Err(write_failed("a GeoTIFF needs at least one band".to_string()));
    };
    let data_type = first.band_type();
    if bands.iter().any(|b| b.band_type() != data_type) {
        return Err(write_failed(
            "all bands of a GeoTIFF must share one data type".to_string(),
        ));
    }
    let (bits, format) = sample_layout(data_type)
        .ok_or_else(|| write_failed(format!("data type {data_type} is not supported")))?;

    let mut write_world_file = false;
    for (key, value) in dataset.creation_options() {
        match key.to_ascii_uppercase().as_str() {
            "COMPRESS" if value.eq_ignore_ascii_case("NONE") => {}
            "COMPRESS" => warn!("COMPRESS={value} is not supported, writing uncompressed data"),
            "TFW" => write_world_file = crate::config::parse_bool(value).unwrap_or(false),
            _ => warn!(
                "creation option '{key}' is not supported by GTiff (known: {})",
                CREATION_OPTIONS.join(", ")
            ),
        }
    }

    let file = File::create(path).with_write_context(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).with_write_context(path)?;
    write_image(&mut encoder, dataset, &bands, bits, format).with_write_context(path)?;
    drop(encoder);

    if write_world_file {
        if let Some(gt) = dataset.geo_transform_opt() {
            write_tfw(&path.with_extension("tfw"), &gt)?;
        }
    }
    debug!(
        "wrote GeoTIFF '{}' ({} {data_type} band(s))",
        path.display(),
        bands.len()
    );
    Ok(())
}

fn write_image<W: Write + Seek>(
    encoder: &mut TiffEncoder<W>,
    dataset: &Dataset,
    bands: &[&RasterBand],
    bits: u16,
    format: u16,
) -> tiff::TiffResult<()> {
    let (width, height) = dataset.raster_size();
    let band_count = bands.len();
    let mut dir = encoder.image_directory()?;

    dir.write_tag(Tag::ImageWidth, width as u32)?;
    dir.write_tag(Tag::ImageLength, height as u32)?;
    dir.write_tag(Tag::BitsPerSample, vec![bits; band_count].as_slice())?;
    dir.write_tag(Tag::Compression, 1u16)?;
    dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
    dir.write_tag(Tag::SamplesPerPixel, band_count as u16)?;
    dir.write_tag(Tag::SampleFormat, vec![format; band_count].as_slice())?;
    dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
    dir.write_tag(Tag::RowsPerStrip, height as u32)?;
    if band_count > 1 {
        dir.write_tag(Tag::ExtraSamples, vec![0u16; band_count - 1].as_slice())?;
    }

    write_georeferencing(&mut dir, dataset)?;
    if let Some(no_data) = bands[0].no_data_value() {
        dir.write_tag(Tag::Unknown(GDAL_NODATA), format_no_data(no_data).as_str())?;
    }
    if get_config_bool("GTIFF_WRITE_GDAL_METADATA", true) {
        if let Some(xml) = gdal_metadata_xml(dataset) {
            dir.write_tag(Tag::Unknown(GDAL_METADATA), xml.as_str())?;
        }
    }

    let data_type = bands[0].band_type();
    let mut bytes = Vec::with_capacity(width * height * band_count * data_type.bytes() as usize);
    for pixel in 0..width * height {
        for band in bands {
            push_sample(&mut bytes, data_type, band.samples()[pixel]);
        }
    }
    let offset = dir.write_data(bytes.as_slice())?;
    let offset = u32::try_from(offset).map_err(|_| tiff::TiffError::LimitsExceeded)?;
    dir.write_tag(Tag::StripOffsets, offset)?;
    dir.write_tag(Tag::StripByteCounts, bytes.len() as u32)?;
    dir.finish()
}

fn push_sample(bytes: &mut Vec<u8>, data_type: DataType, value: f64) {
    match data_type {
        DataType::Byte => bytes.push(value as u8),
        DataType::UInt16 => bytes.extend_from_slice(&(value as u16).to_ne_bytes()),
        DataType::Int16 => bytes.extend_from_slice(&(value as i16).to_ne_bytes()),
        DataType::UInt32 => bytes.extend_from_slice(&(value as u32).to_ne_bytes()),
        DataType::Int32 => bytes.extend_from_slice(&(value as i32).to_ne_bytes()),
        DataType::Float32 => bytes.extend_from_slice(&(value as f32).to_ne_bytes()),
        _ => bytes.extend_from_slice(&value.to_ne_bytes()),
    }
}

fn format_no_data(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

fn write_georeferencing<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    dataset: &Dataset,
) -> tiff::TiffResult<()> {
    let gt = dataset.geo_transform_opt();
    let srs = dataset.spatial_ref();
    if let Some(gt) = gt {
        if gt[2] == 0.0 && gt[4] == 0.0 {
            let scale = [gt[1], -gt[5], 0.0];
            dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), scale.as_slice())?;
            let tiepoint = [0.0, 0.0, 0.0, gt[0], gt[3], 0.0];
            dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())?;
        } else {
            let matrix = [
                gt[1], gt[2], 0.0, gt[0], gt[4], gt[5], 0.0, gt[3], 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 1.0,
            ];
            dir.write_tag(Tag::Unknown(MODEL_TRANSFORMATION), matrix.as_slice())?;
        }
    }
    if gt.is_none() && srs.is_none() {
        return Ok(());
    }

    let mut keys: Vec<[u16; 4]> = Vec::new();
    let mut ascii = String::new();
    if let Some(srs) = srs {
        let model_type = match srs.kind() {
            CrsKind::Projected => 1,
            CrsKind::Geographic => 2,
            CrsKind::Unknown => USER_DEFINED,
        };
        keys.push([GT_MODEL_TYPE, 0, 1, model_type]);
    }
    keys.push([GT_RASTER_TYPE, 0, 1, 1]);
    if let Some(srs) = srs {
        let code = srs
            .epsg_code()
            .and_then(|c| u16::try_from(c).ok())
            .filter(|c| *c != USER_DEFINED);
        if code.is_none() {
            ascii = format!("{}|", srs.to_wkt());
            keys.push([GT_CITATION, GEO_ASCII_PARAMS, ascii.len() as u16, 0]);
        }
        let key = if srs.kind() == CrsKind::Projected {
            PROJECTED_CS_TYPE
        } else {
            GEOGRAPHIC_TYPE
        };
        keys.push([key, 0, 1, code.unwrap_or(USER_DEFINED)]);
    }

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.iter().flatten());
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), directory.as_slice())?;
    if !ascii.is_empty() {
        dir.write_tag(Tag::Unknown(GEO_ASCII_PARAMS), ascii.as_str())?;
    }
    Ok(())
}

fn write_tfw(path: &Path, gt: &GeoTransform) -> Result<()> {
    let center_x = gt[0] + 0.5 * gt[1] + 0.5 * gt[2];
    let center_y = gt[3] + 0.5 * gt[4] + 0.5 * gt[5];
    let content = [gt[1], gt[4], gt[2], gt[5], center_x, center_y]
        .iter()
        .map(|v| format!("{v:.10}\n"))
        .collect::<String>();
    std::fs::write(path, content).with_write_context(path)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Serialize the metadata TIFF tags cannot hold as a `<GDALMetadata>` document.
fn gdal_metadata_xml(dataset: &Dataset) -> Option<String> {
    let mut items = Vec::new();
    let mut item = |name: &str, value: &str, domain: &str, sample: Option<usize>, role: &str| {
        let mut attrs = format!(r#" name="{}""#, escape_xml(name));
        if !domain.is_empty() {
            attrs.push_str(&format!(r#" domain="{}""#, escape_xml(domain)));
        }
        if let Some(sample) = sample {
            attrs.push_str(&format!(r#" sample="{sample}""#));
        }
        if !role.is_empty() {
            attrs.push_str(&format!(r#" role="{role}""#));
        }
        items.push(format!("  <Item{attrs}>{}</Item>", escape_xml(value)));
    };

    for entry in dataset.metadata() {
        item(&entry.key, &entry.value, &entry.domain, None, "");
    }
    for (idx, band) in dataset.rasterbands().enumerate() {
        for entry in band.metadata() {
            item(&entry.key, &entry.value, &entry.domain, Some(idx), "");
        }
        let description = band.description();
        if !description.is_empty() {
            item("DESCRIPTION", &description, "", Some(idx), "description");
        }
        if let Some(scale) = band.scale() {
            item("SCALE", &scale.to_string(), "", Some(idx), "scale");
        }
        if let Some(offset) = band.offset() {
            item("OFFSET", &offset.to_string(), "", Some(idx), "offset");
        }
    }
    let skipped = dataset
        .metadata_domains()
        .into_iter()
        .filter(|d| is_xml_domain(d))
        .count();
    if skipped > 0 {
        debug!("{skipped} XML metadata domain(s) are not written to GeoTIFF");
    }

    (!items.is_empty()).then(|| format!("<GDALMetadata>\n{}\n</GDALMetadata>\n", items.join("\n")))
}

#[derive(Debug, Default, PartialEq)]
struct MetadataItem {
    name: String,
    domain: String,
    sample: Option<usize>,
    role: String,
    value: String,
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = attrs.find(&needle)? + needle.len();
    let end = attrs[start..].find('"')? + start;
    Some(unescape_xml(&attrs[start..end]))
}

fn parse_gdal_metadata(xml: &str) -> Vec<MetadataItem> {
    let mut items = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<Item") {
        rest = &rest[start + 5..];
        let Some(tag_end) = rest.find('>') else {
            break;
        };
        let attrs = &rest[..tag_end];
        rest = &rest[tag_end + 1..];
        let value = if attrs.ends_with('/') {
            String::new()
        } else {
            let Some(close) = rest.find("</Item>") else {
                break;
            };
            let value = unescape_xml(&rest[..close]);
            rest = &rest[close + 7..];
            value
        };
        let Some(name) = attribute(attrs, "name") else {
            continue;
        };
        items.push(MetadataItem {
            name,
            domain: attribute(attrs, "domain").unwrap_or_default(),
            sample: attribute(attrs, "sample").and_then(|s| s.parse().ok()),
            role: attribute(attrs, "role").unwrap_or_default(),
            value,
        });
    }
    items
}

fn apply_gdal_metadata(dataset: &mut Dataset, xml: &str) {
    for item in parse_gdal_metadata(xml) {
        let res = match item.sample {
            None => dataset.set_metadata_item(&item.name, &item.value, &item.domain),
            Some(sample) => match dataset.rasterband_mut(sample + 1) {
                Ok(band) => match item.role.as_str() {
                    "description" => {
                        band.set_description(&item.value);
                        Ok(())
                    }
                    "scale" => {
                        band.set_scale(item.value.parse().ok());
                        Ok(())
                    }
                    "offset" => {
                        band.set_offset(item.value.parse().ok());
                        Ok(())
                    }
                    _ => band.set_metadata_item(&item.name, &item.value, &item.domain),
                },
                Err(e) => Err(e),
            },
        };
        if let Err(e) = res {
            warn!("ignoring GDAL metadata item '{}': {e}", item.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{clear_thread_local_config_option, set_thread_local_config_option};
    use crate::raster::Buffer;
    use crate::test_utils::TempFixture;
    use crate::{assert_near, DriverManager, GeoTransformEx};

    #[test]
    fn test_parse_gdal_metadata() {
        let xml = r#"<GDALMetadata>
  <Item name="AREA_OR_POINT">Area</Item>
  <Item name="A&amp;B" domain="TRE">x &lt; y</Item>
  <Item name="DESCRIPTION" sample="1" role="description">Green</Item>
  <Item name="EMPTY"/>
</GDALMetadata>"#;
        let items = parse_gdal_metadata(xml);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].name, "AREA_OR_POINT");
        assert_eq!(items[1].name, "A&B");
        assert_eq!(items[1].domain, "TRE");
        assert_eq!(items[1].value, "x < y");
        assert_eq!(items[2].sample, Some(1));
        assert_eq!(items[2].role, "description");
        assert_eq!(items[3].value, "");
    }

    #[test]
    fn test_write_read_all_types() {
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        for data_type in driver.creation_data_types().to_vec() {
            let fixture = TempFixture::empty("types.tif");
            let mut dataset = driver
                .create_with_datatype(fixture.path(), 3, 2, 2, data_type, &[])
                .unwrap();
            let values = Buffer::new((3, 2), vec![0.0, 1.0, 2.0, 3.0, 100.0, -1.0]).unwrap();
            dataset
                .rasterband_mut(2)
                .unwrap()
                .write((0, 0), (3, 2), &values)
                .unwrap();
            dataset.close().unwrap();

            let dataset = Dataset::open(fixture.path()).unwrap();
            assert_eq!(dataset.raster_count(), 2);
            let band = dataset.rasterband(2).unwrap();
            assert_eq!(band.band_type(), data_type);
            let read = band.read_band_as::<f64>().unwrap();
            let expected_last = data_type.coerce(-1.0);
            assert_eq!(read.data()[4], 100.0);
            assert_eq!(read.data()[5], expected_last);
            assert_eq!(dataset.rasterband(1).unwrap().checksum(), 0);
        }
    }

    #[test]
    fn test_georeferencing_round_trip() {
        let fixture = TempFixture::empty("geo.tif");
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut dataset = driver.create(fixture.path(), 10, 10, 1).unwrap();
        let gt = [440720.0, 60.0, 0.0, 3751320.0, 0.0, -60.0];
        dataset.set_geo_transform(&gt).unwrap();
        dataset.set_spatial_ref(Some(SpatialRef::from_epsg(32611).unwrap()));
        dataset
            .rasterband_mut(1)
            .unwrap()
            .set_no_data_value(Some(255.0))
            .unwrap();
        dataset.close().unwrap();

        let dataset = Dataset::open(fixture.path()).unwrap();
        assert_eq!(dataset.geo_transform().unwrap(), gt);
        assert_eq!(dataset.spatial_ref().unwrap().epsg_code(), Some(32611));
        assert_eq!(dataset.rasterband(1).unwrap().no_data_value(), Some(255.0));
    }

    #[test]
    fn test_rotated_transform_and_custom_srs() {
        let fixture = TempFixture::empty("rotated.tif");
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut dataset = driver.create(fixture.path(), 4, 4, 1).unwrap();
        let gt = [100.0, 2.0, 0.5, 200.0, 0.25, -2.0];
        dataset.set_geo_transform(&gt).unwrap();
        let wkt = r#"GEOGCS["Custom",DATUM["D",SPHEROID["S",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;
        dataset.set_spatial_ref(Some(SpatialRef::from_wkt(wkt).unwrap()));
        dataset.close().unwrap();

        let dataset = Dataset::open(fixture.path()).unwrap();
        let read = dataset.geo_transform().unwrap();
        let (x, y) = read.apply(1.0, 1.0);
        let (ex, ey) = gt.apply(1.0, 1.0);
        assert_near!(x, ex, epsilon = 1e-9);
        assert_near!(y, ey, epsilon = 1e-9);
        let srs = dataset.spatial_ref().unwrap();
        assert_eq!(srs.name(), "Custom");
        assert!(srs.is_geographic());
    }

    #[test]
    fn test_metadata_round_trip() {
        let fixture = TempFixture::empty("md.tif");
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut dataset = driver.create(fixture.path(), 2, 2, 2).unwrap();
        dataset.set_metadata_item("AUTHOR", "me & you", "").unwrap();
        dataset.set_metadata_item("ITEM", "1", "CUSTOM").unwrap();
        dataset.rasterband_mut(2).unwrap().set_description("Green");
        dataset.rasterband_mut(2).unwrap().set_scale(Some(0.5));
        dataset.close().unwrap();

        let dataset = Dataset::open(fixture.path()).unwrap();
        assert_eq!(
            dataset.metadata_item("AUTHOR", ""),
            Some("me & you".to_string())
        );
        assert_eq!(dataset.metadata_item("ITEM", "CUSTOM"), Some("1".to_string()));
        let band = dataset.rasterband(2).unwrap();
        assert_eq!(band.description(), "Green");
        assert_eq!(band.scale(), Some(0.5));
        assert_eq!(dataset.rasterband(1).unwrap().description(), "");
    }

    #[test]
    fn test_gdal_metadata_can_be_disabled() {
        let fixture = TempFixture::empty("nomd.tif");
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut dataset = driver.create(fixture.path(), 2, 2, 1).unwrap();
        dataset.set_metadata_item("AUTHOR", "me", "").unwrap();
        set_thread_local_config_option("GTIFF_WRITE_GDAL_METADATA", "NO");
        dataset.close().unwrap();
        clear_thread_local_config_option("GTIFF_WRITE_GDAL_METADATA");

        let dataset = Dataset::open(fixture.path()).unwrap();
        assert_eq!(dataset.metadata_item("AUTHOR", ""), None);
    }

    #[test]
    fn test_world_file() {
        use crate::raster::RasterCreationOption;
        let fixture = TempFixture::empty("world.tif");
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let options = [RasterCreationOption {
            key: "TFW",
            value: "YES",
        }];
        let mut dataset = driver
            .create_with_band_type_with_options::<u8, _>(fixture.path(), 2, 2, 1, &options)
            .unwrap();
        dataset
            .set_geo_transform(&[10.0, 2.0, 0.0, 20.0, 0.0, -2.0])
            .unwrap();
        dataset.close().unwrap();

        let tfw = std::fs::read_to_string(fixture.path().with_extension("tfw")).unwrap();
        let values: Vec<f64> = tfw.lines().map(|l| l.parse().unwrap()).collect();
        assert_eq!(values, vec![2.0, 0.0, 0.0, -2.0, 11.0, 19.0]);

        let dataset = Dataset::open(fixture.path()).unwrap();
        assert_eq!(dataset.files().len(), 2);
        drop(dataset);
        DriverManager::delete_dataset(fixture.path()).unwrap();
        assert!(!fixture.path().exists());
        assert!(!fixture.path().with_extension("tfw").exists());
    }

    #[test]
    fn test_complex_type_rejected() {
        let fixture = TempFixture::empty("complex.tif");
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let res = driver.create_with_datatype(fixture.path(), 2, 2, 1, DataType::CInt16, &[]);
        assert!(matches!(res, Err(GeoError::CreateFailed { .. })));
    }
}
