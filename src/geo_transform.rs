use crate::errors::{GeoError, Result};

/// An affine transform.
///
/// A six-element array storing the coefficients of an [affine transform]
/// used in mapping coordinates between pixel/line `(P, L)` (raster) space,
/// and `(Xp,Yp)` (projection/[`crate::spatial_ref::SpatialRef`]) space.
///
/// # Interpretation
///
/// A `GeoTransform`'s components have the following meanings:
///
///   * `GeoTransform[0]`: x-coordinate of the upper-left corner of the upper-left pixel.
///   * `GeoTransform[1]`: W-E pixel resolution (pixel width).
///   * `GeoTransform[2]`: row rotation (typically zero).
///   * `GeoTransform[3]`: y-coordinate of the upper-left corner of the upper-left pixel.
///   * `GeoTransform[4]`: column rotation (typically zero).
///   * `GeoTransform[5]`: N-S pixel resolution (pixel height), negative value for a North-up image.
///
/// # Usage
///  *  [`apply`](GeoTransformEx::apply): perform a `(P,L) -> (Xp,Yp)` transformation
///  *  [`invert`](GeoTransformEx::invert):  construct the inverse transformation coefficients
///     for computing `(Xp,Yp) -> (P,L)` transformations
///
/// # Example
///
/// ```rust
/// use geoconvert::GeoTransformEx;
/// let transform = [440720.0, 60.0, 0.0, 3751320.0, 0.0, -60.0];
/// let (x, y) = transform.apply(10.0, 20.0);
/// assert_eq!((x, y), (441320.0, 3750120.0));
/// let inverse = transform.invert().unwrap();
/// let (p, l) = inverse.apply(x, y);
/// assert!((p - 10.0).abs() < 1e-9 && (l - 20.0).abs() < 1e-9);
/// ```
///
/// [affine transform]: https://en.wikipedia.org/wiki/Affine_transformation
pub type GeoTransform = [f64; 6];

/// Extension methods on [`GeoTransform`]
pub trait GeoTransformEx {
    /// Apply GeoTransform to x/y coordinate.
    fn apply(&self, pixel: f64, line: f64) -> (f64, f64);

    /// Invert a [`GeoTransform`].
    ///
    /// Fails with [`GeoError::BadArgument`] if the transform is singular.
    fn invert(&self) -> Result<GeoTransform>;

    /// `true` when the row and column rotation terms are zero.
    fn is_north_up(&self) -> bool;
}

impl GeoTransformEx for GeoTransform {
    fn apply(&self, pixel: f64, line: f64) -> (f64, f64) {
        let geo_x = self[0] + pixel * self[1] + line * self[2];
        let geo_y = self[3] + pixel * self[4] + line * self[5];
        (geo_x, geo_y)
    }

    fn invert(&self) -> Result<GeoTransform> {
        // Fast path for the common north-up case.
        if self[2] == 0.0 && self[4] == 0.0 && self[1] != 0.0 && self[5] != 0.0 {
            return Ok([
                -self[0] / self[1],
                1.0 / self[1],
                0.0,
                -self[3] / self[5],
                0.0,
                1.0 / self[5],
            ]);
        }

        let det = self[1] * self[5] - self[2] * self[4];
        let magnitude = self[1]
            .abs()
            .max(self[2].abs())
            .max(self[4].abs().max(self[5].abs()));
        if det.abs() <= 1e-10 * magnitude * magnitude {
            return Err(GeoError::BadArgument(
                "Geo transform is uninvertible".to_string(),
            ));
        }
        let inv_det = 1.0 / det;
        Ok([
            (self[2] * self[3] - self[0] * self[5]) * inv_det,
            self[5] * inv_det,
            -self[2] * inv_det,
            (-self[1] * self[3] + self[0] * self[4]) * inv_det,
            -self[4] * inv_det,
            self[1] * inv_det,
        ])
    }

    fn is_north_up(&self) -> bool {
        self[2] == 0.0 && self[4] == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_near;

    #[test]
    fn test_apply_and_invert_rotated() {
        let gt: GeoTransform = [100.0, 2.0, 0.5, 200.0, 0.25, -2.0];
        let inv = gt.invert().unwrap();
        let (x, y) = gt.apply(3.0, 7.0);
        let (p, l) = inv.apply(x, y);
        assert_near!(p, 3.0, epsilon = 1e-9);
        assert_near!(l, 7.0, epsilon = 1e-9);
        assert!(!gt.is_north_up());
    }

    #[test]
    fn test_singular_transform() {
        let gt: GeoTransform = [0.0, 1.0, 2.0, 0.0, 2.0, 4.0];
        assert!(matches!(gt.invert(), Err(GeoError::BadArgument(_))));
        let gt: GeoTransform = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!(gt.invert().is_err());
    }
}
