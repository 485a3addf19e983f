use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use geo_types::Geometry;

use crate::errors::*;
use crate::vector::{Defn, FieldType};

/// Value of an attribute field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    IntegerValue(i32),
    Integer64Value(i64),
    RealValue(f64),
    StringValue(String),
    DateValue(NaiveDate),
    DateTimeValue(DateTime<FixedOffset>),
    BinaryValue(Vec<u8>),
}

impl FieldValue {
    /// Interpret the value as `String`. Numbers and dates are formatted,
    /// binary values are rendered as upper case hex.
    pub fn into_string(self) -> Option<String> {
        Some(match self {
            FieldValue::StringValue(s) => s,
            FieldValue::IntegerValue(v) => v.to_string(),
            FieldValue::Integer64Value(v) => v.to_string(),
            FieldValue::RealValue(v) => v.to_string(),
            FieldValue::DateValue(d) => d.format("%Y/%m/%d").to_string(),
            FieldValue::DateTimeValue(d) => d.format("%Y/%m/%d %H:%M:%S%:z").to_string(),
            FieldValue::BinaryValue(b) => b.iter().map(|byte| format!("{byte:02X}")).collect(),
        })
    }

    /// Interpret the value as `f64`. Strings are parsed.
    pub fn into_real(self) -> Option<f64> {
        match self {
            FieldValue::IntegerValue(v) => Some(v as f64),
            FieldValue::Integer64Value(v) => Some(v as f64),
            FieldValue::RealValue(v) => Some(v),
            FieldValue::StringValue(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as `i32`. Reals are truncated, out of range values
    /// are clamped.
    pub fn into_int(self) -> Option<i32> {
        self.into_int64()
            .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }

    /// Interpret the value as `i64`. Reals are truncated.
    pub fn into_int64(self) -> Option<i64> {
        match self {
            FieldValue::IntegerValue(v) => Some(v as i64),
            FieldValue::Integer64Value(v) => Some(v),
            FieldValue::RealValue(v) if v.is_finite() => Some(v.trunc() as i64),
            FieldValue::StringValue(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
            }
            _ => None,
        }
    }

    pub fn into_date(self) -> Option<NaiveDate> {
        match self {
            FieldValue::DateValue(d) => Some(d),
            FieldValue::DateTimeValue(d) => Some(d.date_naive()),
            FieldValue::StringValue(s) => parse_date(&s),
            _ => None,
        }
    }

    pub fn into_datetime(self) -> Option<DateTime<FixedOffset>> {
        match self {
            FieldValue::DateTimeValue(d) => Some(d),
            FieldValue::DateValue(d) => d
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc().fixed_offset()),
            FieldValue::StringValue(s) => parse_datetime(&s),
            _ => None,
        }
    }

    /// The field type matching this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::IntegerValue(_) => FieldType::Integer,
            FieldValue::Integer64Value(_) => FieldType::Integer64,
            FieldValue::RealValue(_) => FieldType::Real,
            FieldValue::StringValue(_) => FieldType::String,
            FieldValue::DateValue(_) => FieldType::Date,
            FieldValue::DateTimeValue(_) => FieldType::DateTime,
            FieldValue::BinaryValue(_) => FieldType::Binary,
        }
    }

    /// Convert to the representation of a field of type `field_type`.
    ///
    /// Conversion is lenient: unparsable numbers become 0, unparsable dates
    /// become null.
    pub(crate) fn convert_to(self, field_type: FieldType) -> Option<FieldValue> {
        if self.field_type() == field_type {
            return Some(self);
        }
        match field_type {
            FieldType::Integer => Some(FieldValue::IntegerValue(self.into_int().unwrap_or(0))),
            FieldType::Integer64 => {
                Some(FieldValue::Integer64Value(self.into_int64().unwrap_or(0)))
            }
            FieldType::Real => Some(FieldValue::RealValue(self.into_real().unwrap_or(0.0))),
            FieldType::String => self.into_string().map(FieldValue::StringValue),
            FieldType::Date => self.into_date().map(FieldValue::DateValue),
            FieldType::DateTime => self.into_datetime().map(FieldValue::DateTimeValue),
            FieldType::Binary => match self {
                FieldValue::StringValue(s) => Some(FieldValue::BinaryValue(s.into_bytes())),
                _ => None,
            },
        }
    }
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d);
    }
    if let Ok(d) = DateTime::parse_from_str(s, "%Y/%m/%d %H:%M:%S%:z") {
        return Some(d);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// A vector feature: an optional geometry and one value per field of its
/// layer definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    defn: Arc<Defn>,
    fid: Option<u64>,
    geometry: Option<Geometry<f64>>,
    fields: Vec<Option<FieldValue>>,
}

impl Feature {
    /// Create an empty feature following `defn`, usually obtained from
    /// [`crate::vector::Layer::defn`].
    pub fn new(defn: &Arc<Defn>) -> Feature {
        Feature {
            defn: defn.clone(),
            fid: None,
            geometry: None,
            fields: vec![None; defn.field_count()],
        }
    }

    pub fn defn(&self) -> &Defn {
        &self.defn
    }

    pub(crate) fn defn_arc(&self) -> &Arc<Defn> {
        &self.defn
    }

    /// Get the feature id, `None` until the feature is stored in a layer.
    pub fn fid(&self) -> Option<u64> {
        self.fid
    }

    pub fn set_fid(&mut self, fid: Option<u64>) {
        self.fid = fid;
    }

    /// Get the feature's geometry.
    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Geometry<f64>) {
        self.geometry = Some(geometry);
    }

    pub fn clear_geometry(&mut self) {
        self.geometry = None;
    }

    pub(crate) fn take_geometry(&mut self) -> Option<Geometry<f64>> {
        self.geometry.take()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Get the index of the named field, compared case-insensitively.
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.defn.field_index(name)
    }

    /// Get the value of a named field. If the field exists, it returns a
    /// [`FieldValue`] wrapper, that you need to unpack to a base type
    /// (string, float, etc). If the field is null, returns `Ok(None)`.
    ///
    /// If the field is missing, returns [`GeoError::InvalidFieldName`].
    pub fn field(&self, name: &str) -> Result<Option<FieldValue>> {
        let idx = self.field_index(name)?;
        Ok(self.fields[idx].clone())
    }

    /// Get the value of the field at `index`, `None` if null or out of range.
    pub fn field_by_index(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index).and_then(Option::as_ref)
    }

    /// Iterate over `(name, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.defn
            .fields()
            .zip(self.fields.iter())
            .map(|(defn, value)| (defn.name(), value.as_ref()))
    }

    /// Set the value of a named field. The value is converted to the field's
    /// type.
    pub fn set_field(&mut self, field_name: &str, value: &FieldValue) -> Result<()> {
        let idx = self.field_index(field_name)?;
        self.set_field_by_index(idx, Some(value.clone()));
        Ok(())
    }

    pub fn set_field_string(&mut self, field_name: &str, value: &str) -> Result<()> {
        self.set_field(field_name, &FieldValue::StringValue(value.to_string()))
    }

    pub fn set_field_double(&mut self, field_name: &str, value: f64) -> Result<()> {
        self.set_field(field_name, &FieldValue::RealValue(value))
    }

    pub fn set_field_integer(&mut self, field_name: &str, value: i32) -> Result<()> {
        self.set_field(field_name, &FieldValue::IntegerValue(value))
    }

    pub fn set_field_integer64(&mut self, field_name: &str, value: i64) -> Result<()> {
        self.set_field(field_name, &FieldValue::Integer64Value(value))
    }

    pub fn set_field_null(&mut self, field_name: &str) -> Result<()> {
        let idx = self.field_index(field_name)?;
        self.fields[idx] = None;
        Ok(())
    }

    pub(crate) fn set_field_by_index(&mut self, index: usize, value: Option<FieldValue>) {
        let Some(field_type) = self.defn.field(index).map(|f| f.field_type()) else {
            return;
        };
        self.fields[index] = value.and_then(|v| v.convert_to(field_type));
    }

    /// Move the values of this feature onto `defn`, matching fields by name.
    /// Fields missing from `self` are null.
    pub(crate) fn remap(self, defn: &Arc<Defn>) -> Feature {
        if Arc::ptr_eq(&self.defn, defn) {
            return self;
        }
        let mut out = Feature::new(defn);
        out.fid = self.fid;
        out.geometry = self.geometry;
        for (src_idx, value) in self.fields.into_iter().enumerate() {
            let Some(name) = self.defn.field(src_idx).map(|f| f.name()) else {
                continue;
            };
            if let Ok(dst_idx) = defn.field_index(name) {
                out.set_field_by_index(dst_idx, value);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{FieldDefn, GeometryType};

    fn defn() -> Arc<Defn> {
        let mut defn = Defn::new(GeometryType::Point);
        defn.add_field(FieldDefn::new("name", FieldType::String)).unwrap();
        defn.add_field(FieldDefn::new("count", FieldType::Integer)).unwrap();
        defn.add_field(FieldDefn::new("when", FieldType::Date)).unwrap();
        Arc::new(defn)
    }

    #[test]
    fn test_field_lookup() {
        let defn = defn();
        let mut feature = Feature::new(&defn);
        feature.set_field_string("NAME", "abc").unwrap();
        assert_eq!(
            feature.field("name").unwrap().unwrap().into_string(),
            Some("abc".to_string())
        );
        assert_eq!(feature.field("count").unwrap(), None);
        assert!(matches!(
            feature.field("nope"),
            Err(GeoError::InvalidFieldName { .. })
        ));
    }

    #[test]
    fn test_set_field_converts() {
        let defn = defn();
        let mut feature = Feature::new(&defn);
        feature.set_field_double("count", 12.7).unwrap();
        assert_eq!(
            feature.field("count").unwrap(),
            Some(FieldValue::IntegerValue(12))
        );
        feature.set_field_string("count", "not a number").unwrap();
        assert_eq!(
            feature.field("count").unwrap(),
            Some(FieldValue::IntegerValue(0))
        );
        feature.set_field_string("when", "2021-03-04").unwrap();
        assert_eq!(
            feature.field("when").unwrap(),
            Some(FieldValue::DateValue(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()))
        );
        feature.set_field_string("when", "garbage").unwrap();
        assert_eq!(feature.field("when").unwrap(), None);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(FieldValue::StringValue("42".into()).into_int(), Some(42));
        assert_eq!(FieldValue::StringValue(" 4.5".into()).into_real(), Some(4.5));
        assert_eq!(FieldValue::Integer64Value(i64::MAX).into_int(), Some(i32::MAX));
        assert_eq!(
            FieldValue::BinaryValue(vec![0x01, 0xAB]).into_string(),
            Some("01AB".to_string())
        );
        assert_eq!(FieldValue::RealValue(2.0).into_string(), Some("2".to_string()));
        let dt = FieldValue::StringValue("2020-01-02T03:04:05+01:00".into())
            .into_datetime()
            .unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_remap_by_name() {
        let src = defn();
        let mut feature = Feature::new(&src);
        feature.set_fid(Some(7));
        feature.set_field_string("name", "x").unwrap();
        feature.set_field_integer("count", 3).unwrap();

        let mut dst = Defn::new(GeometryType::Point);
        dst.add_field(FieldDefn::new("COUNT", FieldType::Real)).unwrap();
        let dst = Arc::new(dst);
        let out = feature.remap(&dst);
        assert_eq!(out.fid(), Some(7));
        assert_eq!(out.field_count(), 1);
        assert_eq!(out.field("count").unwrap(), Some(FieldValue::RealValue(3.0)));
    }
}
