//! GeoJSON driver: one layer per file, stored as a `FeatureCollection`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geo::MapCoords;
use geo_types::Coord;
use geojson::feature::Id;
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use indexmap::IndexMap;
use log::{debug, warn};

use crate::config::parse_bool;
use crate::dataset::Dataset;
use crate::driver::{Driver, DriverCapabilities};
use crate::errors::*;
use crate::spatial_ref::SpatialRef;
use crate::vector::feature::{parse_date, parse_datetime};
use crate::vector::geometry::{envelope, union_envelope};
use crate::vector::{Defn, Feature, FieldDefn, FieldType, FieldValue, GeometryType, Layer};

/// Layer creation options understood by the driver.
const LAYER_CREATION_OPTIONS: [&str; 2] = ["COORDINATE_PRECISION", "WRITE_BBOX"];

const WGS84: u32 = 4326;

pub(crate) fn driver() -> Driver {
    Driver::new(
        "GeoJSON",
        "GeoJSON",
        DriverCapabilities::VECTOR | DriverCapabilities::CREATE,
    )
    .with_extensions(&["geojson", "json"])
    .with_probe(probe)
    .with_open(open)
    .with_save(save)
}

fn probe(path: &Path, header: &[u8]) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("geojson"));
    if by_extension {
        return true;
    }
    let header = String::from_utf8_lossy(header);
    header.trim_start().starts_with('{')
        && (header.contains("\"FeatureCollection\"") || header.contains("\"Feature\""))
}

/// EPSG code of a `crs` member name such as `urn:ogc:def:crs:EPSG::3857`.
fn crs_code(name: &str) -> Option<u32> {
    if name.ends_with("CRS84") {
        return Some(WGS84);
    }
    let upper = name.to_ascii_uppercase();
    let rest = &upper[upper.find("EPSG")? + 4..];
    rest.trim_start_matches(':').rsplit(':').next()?.parse().ok()
}

fn read_spatial_ref(members: &JsonObject, path: &Path) -> Option<SpatialRef> {
    let Some(crs) = members.get("crs") else {
        return SpatialRef::from_epsg(WGS84).ok();
    };
    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(JsonValue::as_str);
    match name.and_then(crs_code).map(SpatialRef::from_epsg) {
        Some(Ok(srs)) => Some(srs),
        _ => {
            warn!(
                "'{}': unsupported crs member {crs}, layer has no coordinate system",
                path.display()
            );
            None
        }
    }
}

fn infer_type(value: &JsonValue) -> Option<FieldType> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(_) => Some(FieldType::Integer),
        JsonValue::Number(n) => Some(match n.as_i64() {
            Some(v) if i32::try_from(v).is_ok() => FieldType::Integer,
            Some(_) => FieldType::Integer64,
            None => FieldType::Real,
        }),
        JsonValue::String(s) => Some(if parse_date(s).is_some() {
            FieldType::Date
        } else if parse_datetime(s).is_some() {
            FieldType::DateTime
        } else {
            FieldType::String
        }),
        JsonValue::Array(_) | JsonValue::Object(_) => Some(FieldType::String),
    }
}

fn merge_types(a: FieldType, b: FieldType) -> FieldType {
    use FieldType::*;
    match (a, b) {
        (a, b) if a == b => a,
        (Integer, Integer64) | (Integer64, Integer) => Integer64,
        (Integer | Integer64 | Real, Integer | Integer64 | Real) => Real,
        (Date, DateTime) | (DateTime, Date) => DateTime,
        _ => String,
    }
}

fn json_to_field_value(value: &JsonValue) -> Option<FieldValue> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(b) => Some(FieldValue::IntegerValue(*b as i32)),
        JsonValue::Number(n) => Some(match n.as_i64() {
            Some(v) => FieldValue::Integer64Value(v),
            None => FieldValue::RealValue(n.as_f64().unwrap_or(f64::NAN)),
        }),
        JsonValue::String(s) => Some(FieldValue::StringValue(s.clone())),
        other => Some(FieldValue::StringValue(other.to_string())),
    }
}

fn field_value_to_json(value: Option<&FieldValue>) -> JsonValue {
    match value {
        None => JsonValue::Null,
        Some(FieldValue::IntegerValue(v)) => JsonValue::from(*v),
        Some(FieldValue::Integer64Value(v)) => JsonValue::from(*v),
        Some(FieldValue::RealValue(v)) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(FieldValue::DateTimeValue(d)) => JsonValue::from(d.to_rfc3339()),
        Some(other) => other
            .clone()
            .into_string()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
    }
}

fn open(path: &Path, driver: &Driver) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).with_open_context(path)?;
    let geojson: GeoJson = text.parse().with_open_context(path)?;
    let (features, members) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members.unwrap_or_default()),
        GeoJson::Feature(feature) => (vec![feature], JsonObject::new()),
        GeoJson::Geometry(geometry) => (
            vec![geojson::Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            JsonObject::new(),
        ),
    };

    let name = members
        .get("name")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    let mut schema: IndexMap<String, Option<FieldType>> = IndexMap::new();
    for feature in &features {
        for (key, value) in feature.properties.iter().flatten() {
            let inferred = infer_type(value);
            let slot = schema.entry(key.clone()).or_insert(None);
            *slot = match (*slot, inferred) {
                (Some(a), Some(b)) => Some(merge_types(a, b)),
                (a, b) => a.or(b),
            };
        }
    }
    let mut defn = Defn::new(GeometryType::Unknown);
    for (key, field_type) in schema {
        if let Err(e) = defn.add_field(FieldDefn::new(&key, field_type.unwrap_or(FieldType::String)))
        {
            warn!("'{}': skipping property '{key}': {e}", path.display());
        }
    }

    let mut layer = Layer::with_defn(&name, defn, read_spatial_ref(&members, path));
    for (idx, gj_feature) in features.into_iter().enumerate() {
        let mut feature = Feature::new(layer.defn());
        let fid = match &gj_feature.id {
            Some(Id::Number(n)) => n.as_u64(),
            _ => None,
        };
        feature.set_fid(fid.filter(|fid| layer.feature(*fid).is_none()));
        if let Some(geometry) = gj_feature.geometry {
            let geometry = geo_types::Geometry::<f64>::try_from(geometry).map_err(|e| {
                GeoError::OpenFailed {
                    path: path.display().to_string(),
                    msg: format!("feature #{idx}: {e}"),
                }
            })?;
            feature.set_geometry(geometry);
        }
        for (key, value) in gj_feature.properties.iter().flatten() {
            if let Ok(field_idx) = layer.defn().field_index(key) {
                feature.set_field_by_index(field_idx, json_to_field_value(value));
            }
        }
        layer.create_feature(feature)?;
    }
    let geometry_type = layer.infer_geometry_type();
    layer.set_geometry_type(geometry_type);
    debug!(
        "read GeoJSON '{}': layer '{name}' with {} feature(s)",
        path.display(),
        layer.feature_count()
    );

    let mut dataset = Dataset::empty(driver, Some(path));
    dataset.push_layer(layer);
    Ok(dataset)
}

fn round_to(value: f64, factor: f64) -> f64 {
    (value * factor).round() / factor
}

struct WriteOptions {
    precision: Option<u32>,
    write_bbox: bool,
}

impl WriteOptions {
    fn from_layer(layer: &Layer, path: &Path) -> Result<WriteOptions> {
        let mut options = WriteOptions {
            precision: None,
            write_bbox: false,
        };
        for (key, value) in layer.creation_options() {
            match key.to_ascii_uppercase().as_str() {
                "COORDINATE_PRECISION" => {
                    options.precision = Some(value.trim().parse().map_err(|_| {
                        GeoError::WriteFailed {
                            path: path.display().to_string(),
                            msg: format!("invalid COORDINATE_PRECISION '{value}'"),
                        }
                    })?)
                }
                "WRITE_BBOX" => options.write_bbox = parse_bool(value).unwrap_or(false),
                _ => warn!(
                    "layer creation option '{key}' is not supported by GeoJSON (known: {})",
                    LAYER_CREATION_OPTIONS.join(", ")
                ),
            }
        }
        Ok(options)
    }
}

fn save(dataset: &Dataset, path: &Path) -> Result<()> {
    if dataset.layer_count() > 1 {
        return Err(GeoError::WriteFailed {
            path: path.display().to_string(),
            msg: "GeoJSON holds a single layer".to_string(),
        });
    }
    let mut members = JsonObject::new();
    let mut features = Vec::new();
    let mut extent = None;
    let mut write_bbox = false;

    if let Some(layer) = dataset.layers().next() {
        let options = WriteOptions::from_layer(layer, path)?;
        write_bbox = options.write_bbox;
        members.insert("name".to_string(), JsonValue::from(layer.name()));
        if let Some(srs) = layer.spatial_ref() {
            match srs.epsg_code() {
                Some(WGS84) => {}
                Some(code) => {
                    let mut crs = JsonObject::new();
                    crs.insert("type".to_string(), JsonValue::from("name"));
                    let mut properties = JsonObject::new();
                    properties.insert(
                        "name".to_string(),
                        JsonValue::from(format!("urn:ogc:def:crs:EPSG::{code}")),
                    );
                    crs.insert("properties".to_string(), JsonValue::Object(properties));
                    members.insert("crs".to_string(), JsonValue::Object(crs));
                }
                None => warn!(
                    "'{}': coordinate system without EPSG code is not written",
                    path.display()
                ),
            }
        }

        let factor = options.precision.map(|p| 10f64.powi(p as i32));
        for feature in layer.all_features() {
            let geometry = feature.geometry().map(|g| match factor {
                Some(factor) => g.map_coords(|c| Coord {
                    x: round_to(c.x, factor),
                    y: round_to(c.y, factor),
                }),
                None => g.clone(),
            });
            let envelope = geometry.as_ref().and_then(envelope);
            extent = union_envelope(extent, envelope);
            let properties: JsonObject = feature
                .fields()
                .map(|(name, value)| (name.to_string(), field_value_to_json(value)))
                .collect();
            features.push(geojson::Feature {
                bbox: envelope
                    .filter(|_| write_bbox)
                    .map(|r| vec![r.min().x, r.min().y, r.max().x, r.max().y]),
                geometry: geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: feature.fid().map(|fid| Id::Number(fid.into())),
                properties: Some(properties),
                foreign_members: None,
            });
        }
    }

    let collection = FeatureCollection {
        bbox: extent
            .filter(|_| write_bbox)
            .map(|r| vec![r.min().x, r.min().y, r.max().x, r.max().y]),
        features,
        foreign_members: Some(members),
    };
    let file = File::create(path).with_write_context(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &collection).with_write_context(path)?;
    writer.flush().with_write_context(path)?;
    debug!(
        "wrote GeoJSON '{}' ({} feature(s))",
        path.display(),
        collection.features.len()
    );
    Ok(())
}
