use std::str::FromStr;

use crate::errors::{GeoError, Result};

/// Resampling algorithm used when a read window and the output size differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResampleAlg {
    /// Nearest neighbour
    #[default]
    NearestNeighbour,
    /// Bilinear (2x2 kernel)
    Bilinear,
    /// Average of all contributing non-nodata pixels
    Average,
    /// Most frequent value of all contributing non-nodata pixels
    Mode,
}

impl ResampleAlg {
    pub fn name(&self) -> &'static str {
        match self {
            ResampleAlg::NearestNeighbour => "nearest",
            ResampleAlg::Bilinear => "bilinear",
            ResampleAlg::Average => "average",
            ResampleAlg::Mode => "mode",
        }
    }
}

impl FromStr for ResampleAlg {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "near" | "nearest" | "nearestneighbour" => Ok(ResampleAlg::NearestNeighbour),
            "bilinear" => Ok(ResampleAlg::Bilinear),
            "average" => Ok(ResampleAlg::Average),
            "mode" => Ok(ResampleAlg::Mode),
            _ => Err(GeoError::BadArgument(format!(
                "unknown resampling algorithm '{s}'"
            ))),
        }
    }
}

/// A source raster: row-major samples and `(cols, rows)`.
pub(crate) struct Grid<'a> {
    pub data: &'a [f64],
    pub size: (usize, usize),
    pub no_data: Option<f64>,
}

impl Grid<'_> {
    fn get(&self, x: isize, y: isize) -> Option<f64> {
        if x < 0 || y < 0 || x as usize >= self.size.0 || y as usize >= self.size.1 {
            return None;
        }
        let v = self.data[y as usize * self.size.0 + x as usize];
        if self.is_no_data(v) {
            None
        } else {
            Some(v)
        }
    }

    fn is_no_data(&self, v: f64) -> bool {
        match self.no_data {
            Some(nd) if nd.is_nan() => v.is_nan(),
            Some(nd) => v == nd,
            None => false,
        }
    }

    fn fill_value(&self) -> f64 {
        self.no_data.unwrap_or(0.0)
    }
}

/// Number of pixels of a `size` grid of `f64` samples, or `None` when such a
/// grid cannot be allocated.
pub(crate) fn pixel_count(size: (usize, usize)) -> Option<usize> {
    size.0
        .checked_mul(size.1)
        .filter(|n| {
            n.checked_mul(std::mem::size_of::<f64>())
                .is_some_and(|bytes| bytes <= isize::MAX as usize)
        })
}

/// Read the window at `offset` of `window_size` pixels into a buffer of
/// `out_size` pixels.
///
/// Pixels falling outside the grid are set to the nodata value, or 0 when the
/// grid has none.
pub(crate) fn read_window(
    grid: &Grid<'_>,
    offset: (isize, isize),
    window_size: (usize, usize),
    out_size: (usize, usize),
    alg: ResampleAlg,
) -> Vec<f64> {
    let (out_w, out_h) = out_size;
    let x_ratio = window_size.0 as f64 / out_w as f64;
    let y_ratio = window_size.1 as f64 / out_h as f64;
    let mut out = Vec::with_capacity(pixel_count(out_size).unwrap_or(0));

    // Fast path: plain copy.
    if window_size == out_size {
        for j in 0..out_h as isize {
            for i in 0..out_w as isize {
                let (x, y) = (offset.0 + i, offset.1 + j);
                out.push(raw(grid, x, y).unwrap_or_else(|| grid.fill_value()));
            }
        }
        return out;
    }

    for j in 0..out_h {
        for i in 0..out_w {
            let value = match alg {
                ResampleAlg::NearestNeighbour => {
                    let x = offset.0 + ((i as f64 + 0.5) * x_ratio).floor() as isize;
                    let y = offset.1 + ((j as f64 + 0.5) * y_ratio).floor() as isize;
                    raw(grid, x, y)
                }
                ResampleAlg::Bilinear => {
                    let sx = offset.0 as f64 + (i as f64 + 0.5) * x_ratio - 0.5;
                    let sy = offset.1 as f64 + (j as f64 + 0.5) * y_ratio - 0.5;
                    bilinear(grid, sx, sy)
                }
                ResampleAlg::Average | ResampleAlg::Mode => {
                    let x0 = offset.0 as f64 + i as f64 * x_ratio;
                    let x1 = offset.0 as f64 + (i + 1) as f64 * x_ratio;
                    let y0 = offset.1 as f64 + j as f64 * y_ratio;
                    let y1 = offset.1 as f64 + (j + 1) as f64 * y_ratio;
                    let samples = box_samples(grid, (x0, x1), (y0, y1));
                    if alg == ResampleAlg::Average {
                        average(&samples)
                    } else {
                        mode(&samples)
                    }
                }
            };
            out.push(value.unwrap_or_else(|| grid.fill_value()));
        }
    }
    out
}

/// Sample at `(x, y)` including nodata values; `None` outside the grid.
fn raw(grid: &Grid<'_>, x: isize, y: isize) -> Option<f64> {
    if x < 0 || y < 0 || x as usize >= grid.size.0 || y as usize >= grid.size.1 {
        return None;
    }
    Some(grid.data[y as usize * grid.size.0 + x as usize])
}

fn bilinear(grid: &Grid<'_>, sx: f64, sy: f64) -> Option<f64> {
    let (w, h) = (grid.size.0 as f64, grid.size.1 as f64);
    // Centre outside the grid.
    if sx < -0.5 || sy < -0.5 || sx >= w - 0.5 || sy >= h - 0.5 {
        return None;
    }
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;
    let (x0, y0) = (x0 as isize, y0 as isize);
    let clamp_x = |x: isize| x.clamp(0, grid.size.0 as isize - 1);
    let clamp_y = |y: isize| y.clamp(0, grid.size.1 as isize - 1);

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (dx, dy, wgt) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        if wgt == 0.0 {
            continue;
        }
        if let Some(v) = grid.get(clamp_x(x0 + dx), clamp_y(y0 + dy)) {
            if !v.is_nan() {
                sum += v * wgt;
                weight += wgt;
            }
        }
    }
    if weight > 0.0 {
        Some(sum / weight)
    } else {
        None
    }
}

fn box_samples(grid: &Grid<'_>, xs: (f64, f64), ys: (f64, f64)) -> Vec<f64> {
    let x_start = xs.0.floor() as isize;
    let x_end = (xs.1.ceil() as isize).max(x_start + 1);
    let y_start = ys.0.floor() as isize;
    let y_end = (ys.1.ceil() as isize).max(y_start + 1);
    let mut samples = Vec::new();
    for y in y_start..y_end {
        for x in x_start..x_end {
            if let Some(v) = grid.get(x, y) {
                if !v.is_nan() {
                    samples.push(v);
                }
            }
        }
    }
    samples
}

fn average(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

fn mode(samples: &[f64]) -> Option<f64> {
    let mut best: Option<(f64, usize)> = None;
    for (idx, &v) in samples.iter().enumerate() {
        // Count each distinct value at its first occurrence only.
        if samples[..idx].contains(&v) {
            continue;
        }
        let count = samples[idx..].iter().filter(|&&s| s == v).count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((v, count));
        }
    }
    best.map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(data: &[f64], size: (usize, usize)) -> Grid<'_> {
        Grid {
            data,
            size,
            no_data: None,
        }
    }

    #[test]
    fn test_nearest_upsample() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let out = read_window(
            &grid(&data, (2, 2)),
            (0, 0),
            (2, 2),
            (4, 4),
            ResampleAlg::NearestNeighbour,
        );
        assert_eq!(
            out,
            vec![
                1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 3.0, 3.0, 4.0, 4.0
            ]
        );
    }

    #[test]
    fn test_nearest_downsample_picks_centre() {
        let data: Vec<f64> = (0..16).map(f64::from).collect();
        let out = read_window(
            &grid(&data, (4, 4)),
            (0, 0),
            (4, 4),
            (2, 2),
            ResampleAlg::NearestNeighbour,
        );
        assert_eq!(out, vec![5.0, 7.0, 13.0, 15.0]);
    }

    #[test]
    fn test_window_outside_is_filled() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let mut g = grid(&data, (2, 2));
        let out = read_window(&g, (1, 1), (2, 2), (2, 2), ResampleAlg::NearestNeighbour);
        assert_eq!(out, vec![4.0, 0.0, 0.0, 0.0]);
        g.no_data = Some(255.0);
        let out = read_window(&g, (-1, 0), (2, 1), (2, 1), ResampleAlg::NearestNeighbour);
        assert_eq!(out, vec![255.0, 1.0]);
    }

    #[test]
    fn test_average_and_mode() {
        let data = [1.0, 1.0, 2.0, 6.0];
        let g = grid(&data, (2, 2));
        let avg = read_window(&g, (0, 0), (2, 2), (1, 1), ResampleAlg::Average);
        assert_eq!(avg, vec![2.5]);
        let mode = read_window(&g, (0, 0), (2, 2), (1, 1), ResampleAlg::Mode);
        assert_eq!(mode, vec![1.0]);
    }

    #[test]
    fn test_average_skips_no_data() {
        let data = [1.0, 0.0, 3.0, 0.0];
        let g = Grid {
            data: &data,
            size: (2, 2),
            no_data: Some(0.0),
        };
        let avg = read_window(&g, (0, 0), (2, 2), (1, 1), ResampleAlg::Average);
        assert_eq!(avg, vec![2.0]);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let data = [0.0, 10.0];
        let out = read_window(
            &grid(&data, (2, 1)),
            (0, 0),
            (2, 1),
            (4, 1),
            ResampleAlg::Bilinear,
        );
        // Output centres map to source x = -0.25, 0.25, 0.75, 1.25.
        assert_eq!(out, vec![0.0, 2.5, 7.5, 10.0]);
    }

    #[test]
    fn test_parse_alg() {
        assert_eq!(
            "near".parse::<ResampleAlg>().unwrap(),
            ResampleAlg::NearestNeighbour
        );
        assert_eq!("Bilinear".parse::<ResampleAlg>().unwrap(), ResampleAlg::Bilinear);
        assert!("cubic".parse::<ResampleAlg>().is_err());
    }
}
