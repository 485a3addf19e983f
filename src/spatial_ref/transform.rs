use std::f64::consts::PI;

use geo::MapCoords;
use geo_types::{Coord, Geometry};

use crate::errors::{GeoError, Result};
use crate::spatial_ref::SpatialRef;

/// Half the earth's circumference in Web Mercator meters.
const HALF_EARTH: f64 = 20_037_508.342_789_244;

/// Latitude limit of the Web Mercator square.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    Identity,
    GeoToMerc,
    MercToGeo,
}

/// Transforms coordinates between two [`SpatialRef`]s.
///
/// Only the pairs the crate can compute exactly are supported: identical
/// references, and EPSG:4326 to and from EPSG:3857. Any other pair fails with
/// [`GeoError::TransformFailed`] at construction.
#[derive(Clone, Debug)]
pub struct CoordTransform {
    source: SpatialRef,
    target: SpatialRef,
    strategy: Strategy,
}

fn lon_to_merc_x(lon: f64) -> f64 {
    lon * HALF_EARTH / 180.0
}

fn lat_to_merc_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    ((90.0 + lat) * PI / 360.0).tan().ln() * HALF_EARTH / PI
}

fn merc_x_to_lon(x: f64) -> f64 {
    x * 180.0 / HALF_EARTH
}

fn merc_y_to_lat(y: f64) -> f64 {
    let y_rad = y * PI / HALF_EARTH;
    (2.0 * y_rad.exp().atan() - PI / 2.0) * 180.0 / PI
}

impl CoordTransform {
    pub fn new(source: &SpatialRef, target: &SpatialRef) -> Result<CoordTransform> {
        let strategy = if source == target {
            Strategy::Identity
        } else {
            match (source.epsg_code(), target.epsg_code()) {
                (Some(4326), Some(3857)) => Strategy::GeoToMerc,
                (Some(3857), Some(4326)) => Strategy::MercToGeo,
                _ => {
                    return Err(GeoError::TransformFailed(format!(
                        "no transformation available from {source} to {target}"
                    )))
                }
            }
        };
        Ok(CoordTransform {
            source: source.clone(),
            target: target.clone(),
            strategy,
        })
    }

    pub fn source(&self) -> &SpatialRef {
        &self.source
    }

    pub fn target(&self) -> &SpatialRef {
        &self.target
    }

    pub fn is_identity(&self) -> bool {
        self.strategy == Strategy::Identity
    }

    /// Transform a single `(x, y)` pair, in traditional GIS order (lon/lat).
    pub fn transform_coord(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return Err(GeoError::TransformFailed(format!(
                "non-finite coordinate ({x}, {y})"
            )));
        }
        match self.strategy {
            Strategy::Identity => Ok((x, y)),
            Strategy::GeoToMerc => {
                if y.abs() >= 90.0 || x.abs() > 180.0 {
                    return Err(GeoError::TransformFailed(format!(
                        "({x}, {y}) is outside the valid range of {}",
                        self.source
                    )));
                }
                Ok((lon_to_merc_x(x), lat_to_merc_y(y)))
            }
            Strategy::MercToGeo => Ok((merc_x_to_lon(x), merc_y_to_lat(y))),
        }
    }

    /// Transform coordinate arrays in place.
    pub fn transform_coords(&self, x: &mut [f64], y: &mut [f64]) -> Result<()> {
        if x.len() != y.len() {
            return Err(GeoError::BadArgument(format!(
                "coordinate arrays differ in length ({} != {})",
                x.len(),
                y.len()
            )));
        }
        for (x, y) in x.iter_mut().zip(y.iter_mut()) {
            (*x, *y) = self.transform_coord(*x, *y)?;
        }
        Ok(())
    }

    /// Transform every vertex of `geometry`.
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>> {
            let (x, y) = self.transform_coord(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }

    /// Transform a bounding box `[min_x, min_y, max_x, max_y]`, densifying each
    /// edge with `densify_pts` intermediate points.
    pub fn transform_bounds(&self, bounds: &[f64; 4], densify_pts: usize) -> Result<[f64; 4]> {
        let [min_x, min_y, max_x, max_y] = *bounds;
        let steps = densify_pts + 1;
        let mut out = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = min_x + (max_x - min_x) * t;
            let y = min_y + (max_y - min_y) * t;
            for (px, py) in [(x, min_y), (x, max_y), (min_x, y), (max_x, y)] {
                let (tx, ty) = self.transform_coord(px, py)?;
                out[0] = out[0].min(tx);
                out[1] = out[1].min(ty);
                out[2] = out[2].max(tx);
                out[3] = out[3].max(ty);
            }
        }
        Ok(out)
    }
}
