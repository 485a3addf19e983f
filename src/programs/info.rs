//! Dataset reports in the style of `gdalinfo` and `ogrinfo`.

use std::fmt::Write;

use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::errors::*;
use crate::geo_transform::GeoTransformEx;
use crate::metadata::{is_xml_domain, Metadata};
use crate::raster::RasterBand;
use crate::vector::Layer;
use crate::Dataset;

/// Output format of [`info`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InfoFormat {
    #[default]
    Text,
    Json,
}

/// Options of [`info`].
#[derive(Clone, Debug)]
pub struct InfoOptions {
    pub format: InfoFormat,
    /// Domains reported in addition to the default domain.
    pub extra_md_domains: Vec<String>,
    /// Report every domain the dataset exposes.
    pub all_metadata: bool,
    /// List the names of all metadata domains.
    pub list_md_domains: bool,
    /// Set to `false` to suppress metadata entirely.
    pub show_metadata: bool,
    pub compute_checksum: bool,
    pub compute_min_max: bool,
}

impl Default for InfoOptions {
    fn default() -> Self {
        InfoOptions {
            format: InfoFormat::Text,
            extra_md_domains: Vec::new(),
            all_metadata: false,
            list_md_domains: false,
            show_metadata: true,
            compute_checksum: false,
            compute_min_max: false,
        }
    }
}

impl InfoOptions {
    /// Domains to report for `object`, the default domain first.
    fn domains<M: Metadata>(&self, object: &M) -> Vec<String> {
        let mut domains = vec![String::new()];
        let requested = if self.all_metadata {
            object.metadata_domains()
        } else {
            self.extra_md_domains.clone()
        };
        for domain in requested {
            if !domains.iter().any(|d| d.eq_ignore_ascii_case(&domain)) {
                domains.push(domain);
            }
        }
        domains
    }
}

/// Describe `dataset` as text or as a JSON document, depending on
/// [`InfoOptions::format`].
///
/// # Example
///
/// ```
/// use geoconvert::programs::info::{info, InfoFormat, InfoOptions};
/// use geoconvert::DriverManager;
///
/// let driver = DriverManager::get_driver_by_name("MEM").unwrap();
/// let dataset = driver.create("", 4, 3, 1).unwrap();
/// let report = info(&dataset, None).unwrap();
/// assert!(report.contains("Size is 4, 3"));
///
/// let options = InfoOptions { format: InfoFormat::Json, ..Default::default() };
/// let report = info(&dataset, Some(options)).unwrap();
/// assert!(report.contains("\"driverShortName\": \"MEM\""));
/// ```
pub fn info(dataset: &Dataset, options: Option<InfoOptions>) -> Result<String> {
    let options = options.unwrap_or_default();
    debug!("reporting on '{}'", dataset.description());
    match options.format {
        InfoFormat::Json => serde_json::to_string_pretty(&info_json(dataset, &options))
            .map_err(|e| GeoError::BadArgument(e.to_string())),
        InfoFormat::Text => Ok(info_text(dataset, &options)),
    }
}

fn number(value: f64) -> Value {
    if value.is_finite() {
        json!(value)
    } else if value.is_nan() {
        json!("nan")
    } else if value > 0.0 {
        json!("inf")
    } else {
        json!("-inf")
    }
}

/// `domain` of `object` as a JSON value: an object of key/value items, or
/// the raw documents of an XML domain. Undeclared domains are empty.
fn domain_json<M: Metadata>(object: &M, domain: &str) -> Value {
    let items = object.metadata_domain(domain).unwrap_or_default();
    if is_xml_domain(domain) {
        return json!(items);
    }
    let mut map = Map::new();
    for item in items {
        let (key, value) = item.split_once('=').unwrap_or((item.as_str(), ""));
        map.insert(key.to_string(), json!(value));
    }
    Value::Object(map)
}

fn metadata_json<M: Metadata>(object: &M, options: &InfoOptions, keep_empty: bool) -> Value {
    let mut map = Map::new();
    for domain in options.domains(object) {
        let value = domain_json(object, &domain);
        let empty = match &value {
            Value::Object(m) => m.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        };
        if keep_empty || !empty {
            map.insert(domain, value);
        }
    }
    Value::Object(map)
}

/// The JSON report of [`info`] as a value.
pub fn info_json(dataset: &Dataset, options: &InfoOptions) -> Value {
    let driver = dataset.driver();
    let mut report = Map::new();
    report.insert("description".into(), json!(dataset.description()));
    report.insert("driverShortName".into(), json!(driver.short_name()));
    report.insert("driverLongName".into(), json!(driver.long_name()));
    let files: Vec<String> = dataset
        .files()
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    report.insert("files".into(), json!(files));

    let (cols, rows) = dataset.raster_size();
    let is_raster = cols > 0 && rows > 0;
    if is_raster {
        report.insert("size".into(), json!([cols, rows]));
    }
    if let Some(srs) = dataset.spatial_ref() {
        let mut crs = Map::new();
        crs.insert("wkt".into(), json!(srs.to_wkt()));
        if let Some(code) = srs.epsg_code() {
            crs.insert("epsg".into(), json!(code));
        }
        report.insert("coordinateSystem".into(), Value::Object(crs));
    }
    if let Some(gt) = dataset.geo_transform_opt() {
        report.insert("geoTransform".into(), json!(gt));
        if is_raster {
            let corner = |p: f64, l: f64| {
                let (x, y) = gt.apply(p, l);
                json!([x, y])
            };
            let (w, h) = (cols as f64, rows as f64);
            report.insert(
                "cornerCoordinates".into(),
                json!({
                    "upperLeft": corner(0.0, 0.0),
                    "lowerLeft": corner(0.0, h),
                    "lowerRight": corner(w, h),
                    "upperRight": corner(w, 0.0),
                    "center": corner(w / 2.0, h / 2.0),
                }),
            );
        }
    }
    if options.list_md_domains {
        report.insert("metadataDomains".into(), json!(dataset.metadata_domains()));
    }
    if options.show_metadata {
        report.insert("metadata".into(), metadata_json(dataset, options, true));
    }

    if dataset.raster_count() > 0 {
        let bands: Vec<Value> = dataset
            .rasterbands()
            .enumerate()
            .map(|(i, band)| band_json(i + 1, band, options))
            .collect();
        report.insert("bands".into(), Value::Array(bands));
    }
    if dataset.layer_count() > 0 {
        let layers: Vec<Value> = dataset
            .layers()
            .map(|layer| layer_json(layer, options))
            .collect();
        report.insert("layers".into(), Value::Array(layers));
    }
    Value::Object(report)
}

fn band_json(index: usize, band: &RasterBand, options: &InfoOptions) -> Value {
    let mut out = Map::new();
    out.insert("band".into(), json!(index));
    out.insert("type".into(), json!(band.band_type().name()));
    let description = band.description();
    if !description.is_empty() {
        out.insert("description".into(), json!(description));
    }
    if let Some(no_data) = band.no_data_value() {
        out.insert("noDataValue".into(), number(no_data));
    }
    if let Some(scale) = band.scale() {
        out.insert("scale".into(), number(scale));
    }
    if let Some(offset) = band.offset() {
        out.insert("offset".into(), number(offset));
    }
    if options.compute_checksum {
        out.insert("checksum".into(), json!(band.checksum()));
    }
    if options.compute_min_max {
        match band.compute_raster_min_max(false) {
            Ok(stats) => {
                out.insert("computedMin".into(), number(stats.min));
                out.insert("computedMax".into(), number(stats.max));
            }
            Err(e) => warn!("band {index}: cannot compute min/max: {e}"),
        }
    }
    if options.show_metadata {
        let metadata = metadata_json(band, options, false);
        if metadata.as_object().is_some_and(|m| !m.is_empty()) {
            out.insert("metadata".into(), metadata);
        }
    }
    Value::Object(out)
}

fn layer_json(layer: &Layer, options: &InfoOptions) -> Value {
    let mut out = Map::new();
    out.insert("name".into(), json!(layer.name()));
    out.insert("geometryType".into(), json!(layer.geometry_type().name()));
    out.insert("featureCount".into(), json!(layer.feature_count()));
    if let Some(extent) = layer.extent() {
        out.insert(
            "extent".into(),
            json!([extent.min().x, extent.min().y, extent.max().x, extent.max().y]),
        );
    }
    if let Some(srs) = layer.spatial_ref() {
        out.insert("coordinateSystem".into(), json!({ "wkt": srs.to_wkt() }));
    }
    let fields: Vec<Value> = layer
        .defn()
        .fields()
        .map(|f| {
            json!({
                "name": f.name(),
                "type": f.field_type().name(),
                "width": f.width(),
                "precision": f.precision(),
                "nullable": f.is_nullable(),
            })
        })
        .collect();
    out.insert("fields".into(), Value::Array(fields));
    if options.show_metadata {
        let metadata = metadata_json(layer, options, false);
        if metadata.as_object().is_some_and(|m| !m.is_empty()) {
            out.insert("metadata".into(), metadata);
        }
    }
    Value::Object(out)
}

fn write_metadata<M: Metadata>(
    out: &mut String,
    object: &M,
    options: &InfoOptions,
    indent: &str,
    keep_empty: bool,
) {
    for domain in options.domains(object) {
        let items = object.metadata_domain(&domain).unwrap_or_default();
        if items.is_empty() && !keep_empty {
            continue;
        }
        if domain.is_empty() {
            let _ = writeln!(out, "{indent}Metadata:");
        } else {
            let _ = writeln!(out, "{indent}Metadata ({domain}):");
        }
        for item in items {
            let _ = writeln!(out, "{indent}  {item}");
        }
    }
}

fn info_text(dataset: &Dataset, options: &InfoOptions) -> String {
    let mut out = String::new();
    let driver = dataset.driver();
    let _ = writeln!(out, "Driver: {}/{}", driver.short_name(), driver.long_name());
    let files = dataset.files();
    if files.is_empty() {
        let _ = writeln!(out, "Files: none associated");
    } else {
        let _ = writeln!(out, "Files: {}", files[0].display());
        for file in &files[1..] {
            let _ = writeln!(out, "       {}", file.display());
        }
    }

    let (cols, rows) = dataset.raster_size();
    if cols > 0 && rows > 0 {
        let _ = writeln!(out, "Size is {cols}, {rows}");
    }
    match dataset.spatial_ref() {
        Some(srs) => {
            let _ = writeln!(out, "Coordinate System is:\n{}", srs.to_wkt());
        }
        None if dataset.raster_count() > 0 => {
            let _ = writeln!(out, "Coordinate System is `'");
        }
        None => {}
    }
    let gt = dataset.geo_transform_opt();
    if let Some(gt) = gt {
        if gt.is_north_up() {
            let _ = writeln!(out, "Origin = ({:.15},{:.15})", gt[0], gt[3]);
            let _ = writeln!(out, "Pixel Size = ({:.15},{:.15})", gt[1], gt[5]);
        } else {
            let _ = writeln!(out, "GeoTransform =");
            let _ = writeln!(out, "  {}, {}, {}", gt[0], gt[1], gt[2]);
            let _ = writeln!(out, "  {}, {}, {}", gt[3], gt[4], gt[5]);
        }
    }
    if options.list_md_domains {
        let _ = writeln!(out, "Metadata domains:");
        for domain in dataset.metadata_domains() {
            let name = if domain.is_empty() { "(default)" } else { &domain };
            let _ = writeln!(out, "  {name}");
        }
    }
    if options.show_metadata {
        write_metadata(&mut out, dataset, options, "", false);
        for domain in &options.extra_md_domains {
            if dataset.metadata_domain(domain).is_none() {
                let _ = writeln!(out, "Metadata ({domain}):");
            }
        }
    }
    if let (Some(gt), true) = (gt, cols > 0 && rows > 0) {
        let _ = writeln!(out, "Corner Coordinates:");
        let (w, h) = (cols as f64, rows as f64);
        for (label, p, l) in [
            ("Upper Left ", 0.0, 0.0),
            ("Lower Left ", 0.0, h),
            ("Upper Right", w, 0.0),
            ("Lower Right", w, h),
            ("Center     ", w / 2.0, h / 2.0),
        ] {
            let (x, y) = gt.apply(p, l);
            let _ = writeln!(out, "{label} ({x:12.3}, {y:12.3})");
        }
    }

    for (i, band) in dataset.rasterbands().enumerate() {
        let _ = writeln!(out, "Band {} Type={}", i + 1, band.band_type());
        let description = band.description();
        if !description.is_empty() {
            let _ = writeln!(out, "  Description = {description}");
        }
        if options.compute_min_max {
            if let Ok(stats) = band.compute_raster_min_max(false) {
                let _ = writeln!(out, "  Computed Min/Max={:.3},{:.3}", stats.min, stats.max);
            }
        }
        if options.compute_checksum {
            let _ = writeln!(out, "  Checksum={}", band.checksum());
        }
        if let Some(no_data) = band.no_data_value() {
            let _ = writeln!(out, "  NoData Value={no_data}");
        }
        if band.scale().is_some() || band.offset().is_some() {
            let _ = writeln!(
                out,
                "  Offset: {},   Scale:{}",
                band.offset().unwrap_or(0.0),
                band.scale().unwrap_or(1.0)
            );
        }
        if options.show_metadata {
            write_metadata(&mut out, band, options, "  ", false);
        }
    }

    for (i, layer) in dataset.layers().enumerate() {
        let _ = writeln!(
            out,
            "Layer {}: {} ({})",
            i + 1,
            layer.name(),
            layer.geometry_type()
        );
        let _ = writeln!(out, "  Feature Count: {}", layer.feature_count());
        if let Some(extent) = layer.extent() {
            let _ = writeln!(
                out,
                "  Extent: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                extent.min().x,
                extent.min().y,
                extent.max().x,
                extent.max().y
            );
        }
        match layer.spatial_ref() {
            Some(srs) => {
                let _ = writeln!(out, "  Layer SRS WKT:\n{}", srs.to_wkt());
            }
            None => {
                let _ = writeln!(out, "  Layer SRS WKT:\n(unknown)");
            }
        }
        for field in layer.defn().fields() {
            let _ = writeln!(
                out,
                "  {}: {} ({}.{})",
                field.name(),
                field.field_type(),
                field.width(),
                field.precision()
            );
        }
        if options.show_metadata {
            write_metadata(&mut out, layer, options, "  ", false);
        }
    }
    out
}
