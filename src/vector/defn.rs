use std::fmt::{Display, Formatter};

use crate::errors::*;
use crate::vector::GeometryType;

/// Type of an attribute field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Integer64,
    Real,
    String,
    Date,
    DateTime,
    Binary,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "Integer",
            FieldType::Integer64 => "Integer64",
            FieldType::Real => "Real",
            FieldType::String => "String",
            FieldType::Date => "Date",
            FieldType::DateTime => "DateTime",
            FieldType::Binary => "Binary",
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Definition of a single attribute field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDefn {
    name: String,
    field_type: FieldType,
    width: usize,
    precision: usize,
    nullable: bool,
}

impl FieldDefn {
    pub fn new(name: &str, field_type: FieldType) -> FieldDefn {
        FieldDefn {
            name: name.to_string(),
            field_type,
            width: 0,
            precision: 0,
            nullable: true,
        }
    }

    /// Get the name of this field.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Get the data type of this field.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Get the formatting width for this field.
    ///
    /// Zero means no specified width.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set_width(&mut self, width: usize) {
        self.width = width;
    }

    /// Get the formatting precision for this field.
    ///
    /// This should normally be zero for fields of types other than Real.
    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn set_precision(&mut self, precision: usize) {
        self.precision = precision;
    }

    /// Return whether this field can receive null values.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn set_nullable(&mut self, nullable: bool) {
        self.nullable = nullable;
    }
}

/// Layer definition
///
/// Defines the geometry type and the fields available for features in a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Defn {
    geometry_type: GeometryType,
    fields: Vec<FieldDefn>,
}

impl Defn {
    pub fn new(geometry_type: GeometryType) -> Defn {
        Defn {
            geometry_type,
            fields: Vec::new(),
        }
    }

    /// Iterate over the field schema of this layer.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefn> {
        self.fields.iter()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&FieldDefn> {
        self.fields.get(index)
    }

    /// Get the geometry type of the layer.
    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub(crate) fn set_geometry_type(&mut self, geometry_type: GeometryType) {
        self.geometry_type = geometry_type;
    }

    /// Index of the field called `name`, compared case-insensitively.
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| GeoError::InvalidFieldName {
                field_name: name.to_string(),
                method_name: "field_index",
            })
    }

    /// Append a field. A field of the same name (ignoring case) must not exist.
    pub(crate) fn add_field(&mut self, field: FieldDefn) -> Result<usize> {
        if self.field_index(field.name()).is_ok() {
            return Err(GeoError::BadArgument(format!(
                "field '{}' already exists",
                field.name()
            )));
        }
        self.fields.push(field);
        Ok(self.fields.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_index_ignores_case() {
        let mut defn = Defn::new(GeometryType::Polygon);
        defn.add_field(FieldDefn::new("AREA", FieldType::Real)).unwrap();
        defn.add_field(FieldDefn::new("PRFEDEA", FieldType::String))
            .unwrap();
        assert_eq!(defn.field_index("prfedea").unwrap(), 1);
        assert_eq!(defn.field_index("Area").unwrap(), 0);
        assert!(matches!(
            defn.field_index("missing"),
            Err(GeoError::InvalidFieldName { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut defn = Defn::new(GeometryType::Point);
        defn.add_field(FieldDefn::new("name", FieldType::String))
            .unwrap();
        assert!(defn
            .add_field(FieldDefn::new("NAME", FieldType::Integer))
            .is_err());
        assert_eq!(defn.field_count(), 1);
    }
}
