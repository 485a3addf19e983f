use std::fmt::{Display, Formatter};
use std::str::FromStr;

use geo::BoundingRect;
use geo_types::{Geometry, Rect};

use crate::errors::{GeoError, Result};

/// Geometry type of a layer.
///
/// The `*25D` variants flag layers declared with a Z dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Unknown,
    None,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    Point25D,
    LineString25D,
    Polygon25D,
    MultiPoint25D,
    MultiLineString25D,
    MultiPolygon25D,
    GeometryCollection25D,
}

impl GeometryType {
    /// Geometry type of a single geometry.
    pub fn of(geometry: &Geometry<f64>) -> GeometryType {
        match geometry {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryType::Polygon
            }
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// Human readable name, as reported by info.
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Unknown => "Unknown (any)",
            GeometryType::None => "None",
            GeometryType::Point => "Point",
            GeometryType::LineString => "Line String",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "Multi Point",
            GeometryType::MultiLineString => "Multi Line String",
            GeometryType::MultiPolygon => "Multi Polygon",
            GeometryType::GeometryCollection => "Geometry Collection",
            GeometryType::Point25D => "3D Point",
            GeometryType::LineString25D => "3D Line String",
            GeometryType::Polygon25D => "3D Polygon",
            GeometryType::MultiPoint25D => "3D Multi Point",
            GeometryType::MultiLineString25D => "3D Multi Line String",
            GeometryType::MultiPolygon25D => "3D Multi Polygon",
            GeometryType::GeometryCollection25D => "3D Geometry Collection",
        }
    }

    pub fn is_25d(&self) -> bool {
        self.flatten() != *self
    }

    /// The 2D variant of this type.
    pub fn flatten(&self) -> GeometryType {
        match self {
            GeometryType::Point25D => GeometryType::Point,
            GeometryType::LineString25D => GeometryType::LineString,
            GeometryType::Polygon25D => GeometryType::Polygon,
            GeometryType::MultiPoint25D => GeometryType::MultiPoint,
            GeometryType::MultiLineString25D => GeometryType::MultiLineString,
            GeometryType::MultiPolygon25D => GeometryType::MultiPolygon,
            GeometryType::GeometryCollection25D => GeometryType::GeometryCollection,
            other => *other,
        }
    }

    /// The 2.5D variant of this type; `Unknown` and `None` are unchanged.
    pub fn with_z(&self) -> GeometryType {
        match self.flatten() {
            GeometryType::Point => GeometryType::Point25D,
            GeometryType::LineString => GeometryType::LineString25D,
            GeometryType::Polygon => GeometryType::Polygon25D,
            GeometryType::MultiPoint => GeometryType::MultiPoint25D,
            GeometryType::MultiLineString => GeometryType::MultiLineString25D,
            GeometryType::MultiPolygon => GeometryType::MultiPolygon25D,
            GeometryType::GeometryCollection => GeometryType::GeometryCollection25D,
            other => other,
        }
    }

    /// Single-part type of a multi-part type.
    pub fn single_part(&self) -> GeometryType {
        let single = match self.flatten() {
            GeometryType::MultiPoint => GeometryType::Point,
            GeometryType::MultiLineString => GeometryType::LineString,
            GeometryType::MultiPolygon => GeometryType::Polygon,
            GeometryType::GeometryCollection => GeometryType::Unknown,
            other => other,
        };
        if self.is_25d() {
            single.with_z()
        } else {
            single
        }
    }

    /// Common type of two geometry types, as used when inferring a layer type
    /// from its features.
    pub fn merge(self, other: GeometryType) -> GeometryType {
        if self == other {
            self
        } else {
            GeometryType::Unknown
        }
    }
}

impl Display for GeometryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeometryType {
    type Err = GeoError;

    /// Parses the names accepted by `-nlt`: `POINT`, `LINESTRING`, `POLYGON`,
    /// `MULTI*`, `GEOMETRYCOLLECTION`, `GEOMETRY`, `NONE`, optionally suffixed
    /// with `25D` or `Z`.
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let (base, z) = if let Some(base) = upper.strip_suffix("25D") {
            (base, true)
        } else if let Some(base) = upper.strip_suffix('Z') {
            (base.trim_end(), true)
        } else {
            (upper.as_str(), false)
        };
        let ty = match base {
            "GEOMETRY" | "UNKNOWN" => GeometryType::Unknown,
            "NONE" => GeometryType::None,
            "POINT" => GeometryType::Point,
            "LINESTRING" => GeometryType::LineString,
            "POLYGON" => GeometryType::Polygon,
            "MULTIPOINT" => GeometryType::MultiPoint,
            "MULTILINESTRING" => GeometryType::MultiLineString,
            "MULTIPOLYGON" => GeometryType::MultiPolygon,
            "GEOMETRYCOLLECTION" => GeometryType::GeometryCollection,
            _ => {
                return Err(GeoError::BadArgument(format!(
                    "unknown geometry type '{s}'"
                )))
            }
        };
        Ok(if z { ty.with_z() } else { ty })
    }
}

/// Bounding box of a geometry, `None` for empty geometries.
pub fn envelope(geometry: &Geometry<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

/// `true` if the two envelopes share at least one point.
pub fn envelopes_intersect(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

/// Merge two optional envelopes.
pub(crate) fn union_envelope(acc: Option<Rect<f64>>, other: Option<Rect<f64>>) -> Option<Rect<f64>> {
    match (acc, other) {
        (Some(a), Some(b)) => Some(Rect::new(
            (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
            (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
        )),
        (a, b) => a.or(b),
    }
}

/// Split a multi-part geometry or collection into its parts. Single-part
/// geometries are returned unchanged.
pub fn explode(geometry: Geometry<f64>) -> Vec<Geometry<f64>> {
    match geometry {
        Geometry::MultiPoint(mp) => mp.0.into_iter().map(Geometry::Point).collect(),
        Geometry::MultiLineString(ml) => ml.0.into_iter().map(Geometry::LineString).collect(),
        Geometry::MultiPolygon(mp) => mp.0.into_iter().map(Geometry::Polygon).collect(),
        Geometry::GeometryCollection(gc) => gc.0,
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon, MultiPoint};

    #[test]
    fn test_type_of_geometry() {
        let p: Geometry<f64> = point!(x: 1.0, y: 2.0).into();
        assert_eq!(GeometryType::of(&p), GeometryType::Point);
        let poly: Geometry<f64> =
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)].into();
        assert_eq!(GeometryType::of(&poly), GeometryType::Polygon);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("point".parse::<GeometryType>().unwrap(), GeometryType::Point);
        assert_eq!(
            "MULTIPOLYGON25D".parse::<GeometryType>().unwrap(),
            GeometryType::MultiPolygon25D
        );
        assert_eq!(
            "LINESTRING Z".parse::<GeometryType>().unwrap(),
            GeometryType::LineString25D
        );
        assert_eq!("GEOMETRY".parse::<GeometryType>().unwrap(), GeometryType::Unknown);
        assert!("CIRCLE".parse::<GeometryType>().is_err());
    }

    #[test]
    fn test_flags() {
        assert!(GeometryType::Polygon25D.is_25d());
        assert_eq!(GeometryType::Polygon25D.flatten(), GeometryType::Polygon);
        assert_eq!(GeometryType::MultiPolygon25D.single_part(), GeometryType::Polygon25D);
        assert_eq!(GeometryType::Point.with_z().name(), "3D Point");
        assert_eq!(
            GeometryType::Point.merge(GeometryType::Polygon),
            GeometryType::Unknown
        );
    }

    #[test]
    fn test_explode() {
        let mp: Geometry<f64> =
            MultiPoint::from(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]).into();
        let parts = explode(mp);
        assert_eq!(parts.len(), 3);
        assert_eq!(GeometryType::of(&parts[1]), GeometryType::Point);
        let ls: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into();
        assert_eq!(explode(ls.clone()), vec![ls]);
    }

    #[test]
    fn test_envelopes() {
        let a = Rect::new((0.0, 0.0), (1.0, 1.0));
        let b = Rect::new((1.0, 1.0), (2.0, 2.0));
        let c = Rect::new((1.5, -1.0), (2.0, 0.5));
        assert!(envelopes_intersect(&a, &b));
        assert!(!envelopes_intersect(&a, &c));
        let u = union_envelope(Some(a), Some(c)).unwrap();
        assert_eq!(u, Rect::new((0.0, -1.0), (2.0, 1.0)));
        assert_eq!(union_envelope(None, Some(b)), Some(b));
    }
}
