use geo_types::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPolygon, Polygon};

use crate::errors::{GeoError, Result};
use crate::spatial_ref::CoordTransform;

/// # Geometry Transformations
///
/// These methods provide geometric transformations on a [`Geometry`].
pub trait GeometryOps: Sized {
    /// Apply a coordinate transformation on a clone of `self`.
    fn transform(&self, transform: &CoordTransform) -> Result<Self>;

    /// Densify the geometry so that no segment is longer than `max_length`.
    ///
    /// A segment of length `d > max_length` is split into `ceil(d / max_length)`
    /// equal pieces. Points are returned unchanged; `Line`, `Rect` and `Triangle`
    /// are promoted to line strings and polygons. A segment with a non-finite
    /// length gives [`GeoError::TransformFailed`].
    fn segmentize(&self, max_length: f64) -> Result<Self>;

    /// Total length of all linear components and polygon rings.
    fn perimeter(&self) -> f64;

    /// Number of vertices.
    fn vertex_count(&self) -> usize;
}

impl GeometryOps for Geometry<f64> {
    fn transform(&self, transform: &CoordTransform) -> Result<Self> {
        transform.transform_geometry(self)
    }

    fn segmentize(&self, max_length: f64) -> Result<Self> {
        if !(max_length > 0.0 && max_length.is_finite()) {
            return Err(GeoError::BadArgument(format!(
                "segmentize length must be a positive number, got {max_length}"
            )));
        }
        segmentize_geometry(self, max_length)
    }

    fn perimeter(&self) -> f64 {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
            Geometry::Line(l) => coords_length(&[l.start, l.end]),
            Geometry::LineString(ls) => coords_length(&ls.0),
            Geometry::MultiLineString(ml) => ml.0.iter().map(|ls| coords_length(&ls.0)).sum(),
            Geometry::Polygon(p) => polygon_perimeter(p),
            Geometry::MultiPolygon(mp) => mp.0.iter().map(polygon_perimeter).sum(),
            Geometry::Rect(r) => polygon_perimeter(&r.to_polygon()),
            Geometry::Triangle(t) => polygon_perimeter(&t.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.0.iter().map(|g| g.perimeter()).sum(),
        }
    }

    fn vertex_count(&self) -> usize {
        use geo::CoordsIter;
        self.coords_count()
    }
}

fn coords_length(coords: &[Coord<f64>]) -> f64 {
    coords
        .windows(2)
        .map(|pair| (pair[1].x - pair[0].x).hypot(pair[1].y - pair[0].y))
        .sum()
}

fn polygon_perimeter(p: &Polygon<f64>) -> f64 {
    coords_length(&p.exterior().0)
        + p.interiors()
            .iter()
            .map(|ring| coords_length(&ring.0))
            .sum::<f64>()
}

fn segmentize_coords(coords: &[Coord<f64>], max_length: f64) -> Result<Vec<Coord<f64>>> {
    let mut out = Vec::with_capacity(coords.len());
    for pair in coords.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        out.push(a);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let length = dx.hypot(dy);
        let ratio = length / max_length;
        if !ratio.is_finite() {
            return Err(GeoError::TransformFailed(format!(
                "cannot segmentize the segment from ({}, {}) to ({}, {})",
                a.x, a.y, b.x, b.y
            )));
        }
        if length > max_length {
            let pieces = ratio.ceil() as usize;
            for i in 1..pieces {
                let t = i as f64 / pieces as f64;
                out.push(Coord {
                    x: a.x + dx * t,
                    y: a.y + dy * t,
                });
            }
        }
    }
    if let Some(last) = coords.last() {
        out.push(*last);
    }
    Ok(out)
}

fn segmentize_line_string(ls: &LineString<f64>, max_length: f64) -> Result<LineString<f64>> {
    Ok(LineString::new(segmentize_coords(&ls.0, max_length)?))
}

fn segmentize_polygon(p: &Polygon<f64>, max_length: f64) -> Result<Polygon<f64>> {
    Ok(Polygon::new(
        segmentize_line_string(p.exterior(), max_length)?,
        p.interiors()
            .iter()
            .map(|ring| segmentize_line_string(ring, max_length))
            .collect::<Result<_>>()?,
    ))
}

fn segmentize_geometry(geometry: &Geometry<f64>, max_length: f64) -> Result<Geometry<f64>> {
    Ok(match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => geometry.clone(),
        Geometry::Line(l) => Geometry::LineString(LineString::new(segmentize_coords(
            &[l.start, l.end],
            max_length,
        )?)),
        Geometry::LineString(ls) => Geometry::LineString(segmentize_line_string(ls, max_length)?),
        Geometry::MultiLineString(ml) => Geometry::MultiLineString(MultiLineString::new(
            ml.0.iter()
                .map(|ls| segmentize_line_string(ls, max_length))
                .collect::<Result<_>>()?,
        )),
        Geometry::Polygon(p) => Geometry::Polygon(segmentize_polygon(p, max_length)?),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon::new(
            mp.0.iter()
                .map(|p| segmentize_polygon(p, max_length))
                .collect::<Result<_>>()?,
        )),
        Geometry::Rect(r) => Geometry::Polygon(segmentize_polygon(&r.to_polygon(), max_length)?),
        Geometry::Triangle(t) => {
            Geometry::Polygon(segmentize_polygon(&t.to_polygon(), max_length)?)
        }
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection::new_from(
            gc.0.iter()
                .map(|g| segmentize_geometry(g, max_length))
                .collect::<Result<_>>()?,
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon};

    fn max_segment(ls: &LineString<f64>) -> f64 {
        ls.lines()
            .map(|l| (l.end.x - l.start.x).hypot(l.end.y - l.start.y))
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_segmentize_line() {
        let ls: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)].into();
        let out = ls.segmentize(3.0).unwrap();
        let Geometry::LineString(out) = out else {
            panic!("expected a line string");
        };
        // ceil(10 / 3) = 4 pieces
        assert_eq!(out.0.len(), 5);
        assert!(max_segment(&out) <= 3.0);
        assert_eq!(out.0[1], Coord { x: 2.5, y: 0.0 });
    }

    #[test]
    fn test_segmentize_exact_multiple() {
        let ls: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0)].into();
        let out = ls.segmentize(2.0).unwrap();
        assert_eq!(out.vertex_count(), 3);
    }

    #[test]
    fn test_segmentize_polygon_bounds() {
        let poly: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 7.0, y: 0.0),
            (x: 7.0, y: 5.0),
            (x: 0.0, y: 5.0),
            (x: 0.0, y: 0.0),
        ]
        .into();
        let max_length = 1.5;
        let out = poly.segmentize(max_length).unwrap();
        let expected_min = (poly.perimeter() / max_length).ceil() as usize;
        assert!(out.vertex_count() >= expected_min);
        let Geometry::Polygon(p) = &out else {
            panic!("expected a polygon");
        };
        assert!(max_segment(p.exterior()) <= max_length);
        assert!(p.exterior().is_closed());
    }

    #[test]
    fn test_segmentize_keeps_points_and_short_segments() {
        let p: Geometry<f64> = point!(x: 1.0, y: 1.0).into();
        assert_eq!(p.segmentize(0.1).unwrap(), p);
        let ls: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into();
        assert_eq!(ls.segmentize(5.0).unwrap(), ls);
    }

    #[test]
    fn test_segmentize_rejects_bad_length() {
        let ls: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into();
        assert!(ls.segmentize(0.0).is_err());
        assert!(ls.segmentize(f64::NAN).is_err());
    }

    #[test]
    fn test_segmentize_infinite_segment() {
        let ls: Geometry<f64> =
            line_string![(x: 0.0, y: 0.0), (x: f64::INFINITY, y: 0.0)].into();
        assert!(matches!(
            ls.segmentize(1.0),
            Err(GeoError::TransformFailed(_))
        ));

        let poly: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: f64::MAX, y: 0.0),
            (x: -f64::MAX, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
        .into();
        assert!(matches!(
            poly.segmentize(1.0),
            Err(GeoError::TransformFailed(_))
        ));
    }
}
