use geo::Intersects;
use geo_types::{Geometry, Rect};

use crate::config;
use crate::vector::geometry::{envelope, envelopes_intersect};

/// How a spatial filter tests candidate geometries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpatialFilterPolicy {
    /// Exact geometric intersection.
    Exact,
    /// Bounding box overlap only. Selects a superset of [`SpatialFilterPolicy::Exact`].
    Envelope,
}

impl Default for SpatialFilterPolicy {
    /// Read from the `OGR_EXACT_SPATIAL_FILTER` configuration option (default `YES`).
    fn default() -> Self {
        if config::get_config_bool("OGR_EXACT_SPATIAL_FILTER", true) {
            SpatialFilterPolicy::Exact
        } else {
            SpatialFilterPolicy::Envelope
        }
    }
}

/// A spatial filter installed on a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialFilter {
    geometry: Geometry<f64>,
    envelope: Option<Rect<f64>>,
    policy: SpatialFilterPolicy,
}

impl SpatialFilter {
    pub fn new(geometry: Geometry<f64>, policy: SpatialFilterPolicy) -> SpatialFilter {
        let envelope = envelope(&geometry);
        SpatialFilter {
            geometry,
            envelope,
            policy,
        }
    }

    /// Filter on the rectangle `(min_x, min_y)`-`(max_x, max_y)`.
    pub fn from_rect(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        policy: SpatialFilterPolicy,
    ) -> SpatialFilter {
        let rect = Rect::new((min_x, min_y), (max_x, max_y));
        SpatialFilter::new(Geometry::Polygon(rect.to_polygon()), policy)
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn policy(&self) -> SpatialFilterPolicy {
        self.policy
    }

    /// `true` if `candidate` passes the filter. Features without geometry never pass.
    pub fn matches(&self, candidate: Option<&Geometry<f64>>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        let (Some(filter_env), Some(candidate_env)) = (self.envelope, envelope(candidate)) else {
            return false;
        };
        if !envelopes_intersect(&filter_env, &candidate_env) {
            return false;
        }
        match self.policy {
            SpatialFilterPolicy::Envelope => true,
            SpatialFilterPolicy::Exact => self.geometry.intersects(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point};

    #[test]
    fn test_exact_is_stricter_than_envelope() {
        // A diagonal line whose envelope covers the filter but does not touch it.
        let line: Geometry<f64> = line_string![(x: 0.0, y: 10.0), (x: 10.0, y: 0.0)].into();
        let exact = SpatialFilter::from_rect(0.0, 0.0, 2.0, 2.0, SpatialFilterPolicy::Exact);
        let env = SpatialFilter::from_rect(0.0, 0.0, 2.0, 2.0, SpatialFilterPolicy::Envelope);
        assert!(!exact.matches(Some(&line)));
        assert!(env.matches(Some(&line)));
    }

    #[test]
    fn test_point_on_boundary_and_missing_geometry() {
        let filter = SpatialFilter::from_rect(0.0, 0.0, 1.0, 1.0, SpatialFilterPolicy::Exact);
        let p: Geometry<f64> = point!(x: 1.0, y: 0.5).into();
        assert!(filter.matches(Some(&p)));
        assert!(!filter.matches(None));
    }

    #[test]
    fn test_default_policy_follows_config() {
        crate::config::set_thread_local_config_option("OGR_EXACT_SPATIAL_FILTER", "NO");
        assert_eq!(SpatialFilterPolicy::default(), SpatialFilterPolicy::Envelope);
        crate::config::clear_thread_local_config_option("OGR_EXACT_SPATIAL_FILTER");
        assert_eq!(SpatialFilterPolicy::default(), SpatialFilterPolicy::Exact);
    }
}
