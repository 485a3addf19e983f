use std::path::Path;

use log::{debug, info, warn};

use crate::driver::{Driver, DriverCapabilities, DriverManager};
use crate::errors::*;
use crate::geo_transform::{GeoTransform, GeoTransformEx};
use crate::metadata::Metadata;
use crate::options::parse_key_values;
use crate::raster::{pixel_count, DataType, RasterCreationOption, ResampleAlg};
use crate::spatial_ref::SpatialRef;
use crate::Dataset;

/// Nodata handling of the output bands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoDataOption {
    /// Assign this nodata value to every output band.
    Value(f64),
    /// Remove the nodata value from every output band.
    Unset,
}

/// Options of [`translate`], in the spirit of `gdal_translate`.
///
/// All fields are optional; [`TranslateOptions::default`] copies every band
/// at full resolution into a GeoTIFF (or the format matching the output
/// extension).
#[derive(Clone, Debug, Default)]
pub struct TranslateOptions {
    /// Output driver short name.
    pub format: Option<String>,
    pub output_type: Option<DataType>,
    pub x_size_pixels: Option<usize>,
    pub y_size_pixels: Option<usize>,
    pub x_size_pct: Option<f64>,
    pub y_size_pct: Option<f64>,
    /// 1-based source bands in output order; repeats allowed.
    pub band_list: Option<Vec<usize>>,
    pub resample_alg: ResampleAlg,
    /// `(x_off, y_off, x_size, y_size)` in source pixels.
    pub src_win: Option<(isize, isize, usize, usize)>,
    /// `(ulx, uly, lrx, lry)` in georeferenced coordinates.
    pub proj_win: Option<(f64, f64, f64, f64)>,
    /// Spatial reference assigned to the output, without reprojection.
    pub output_srs: Option<String>,
    pub no_data: Option<NoDataOption>,
    /// `(src_min, src_max, dst_min, dst_max)` linear rescaling.
    pub scale: Option<(f64, f64, f64, f64)>,
    /// `KEY=VALUE` options passed to the output driver.
    pub creation_options: Vec<String>,
    /// `KEY=VALUE` items added to the default metadata domain.
    pub metadata_options: Vec<String>,
}

/// A validated, immutable [`TranslateOptions`] bound to one source dataset.
#[derive(Clone, Debug)]
pub struct TranslatePlan {
    driver: Driver,
    bands: Vec<usize>,
    band_types: Vec<DataType>,
    window: (isize, isize),
    window_size: (usize, usize),
    output_size: (usize, usize),
    resample_alg: ResampleAlg,
    geo_transform: Option<GeoTransform>,
    spatial_ref: Option<SpatialRef>,
    no_data: Option<NoDataOption>,
    scale: Option<(f64, f64)>,
    creation_options: Vec<(String, String)>,
    metadata_options: Vec<(String, String)>,
}

impl TranslatePlan {
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// 1-based source band of every output band.
    pub fn bands(&self) -> &[usize] {
        &self.bands
    }

    pub fn band_types(&self) -> &[DataType] {
        &self.band_types
    }

    /// Source window as `(x_off, y_off)` and `(x_size, y_size)`.
    pub fn source_window(&self) -> ((isize, isize), (usize, usize)) {
        (self.window, self.window_size)
    }

    pub fn output_size(&self) -> (usize, usize) {
        self.output_size
    }

    pub fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    pub fn spatial_ref(&self) -> Option<&SpatialRef> {
        self.spatial_ref.as_ref()
    }

    /// `(scale, offset)` applied to every sample, if any.
    pub fn scale(&self) -> Option<(f64, f64)> {
        self.scale
    }
}

fn invalid(option: &'static str, msg: impl Into<String>) -> GeoError {
    GeoError::InvalidOption {
        option,
        msg: msg.into(),
    }
}

fn percent_size(size: usize, pct: f64) -> usize {
    ((size as f64 * pct / 100.0).round() as usize).max(1)
}

impl TranslateOptions {
    /// Validate the options against `src` and compute the translation plan.
    ///
    /// No I/O is performed; every error is a resolution error.
    pub fn resolve(&self, src: &Dataset, dest: &Path) -> Result<TranslatePlan> {
        let driver = self.resolve_driver(dest)?;

        let count = src.raster_count();
        if count == 0 {
            return Err(invalid("band_list", "source dataset has no raster bands"));
        }
        let bands = match &self.band_list {
            Some(list) if list.is_empty() => {
                return Err(invalid("band_list", "at least one band is required"))
            }
            Some(list) => {
                if let Some(bad) = list.iter().find(|b| **b == 0 || **b > count) {
                    return Err(invalid(
                        "band_list",
                        format!("band {bad} does not exist, source has {count} band(s)"),
                    ));
                }
                list.clone()
            }
            None => (1..=count).collect(),
        };

        let mut band_types = Vec::with_capacity(bands.len());
        for b in &bands {
            let data_type = match self.output_type {
                Some(t) => t,
                None => src.rasterband(*b)?.band_type(),
            };
            if !driver.creation_data_types().is_empty()
                && !driver.creation_data_types().contains(&data_type)
            {
                let option = if self.output_type.is_some() {
                    "output_type"
                } else {
                    "band_list"
                };
                return Err(invalid(
                    option,
                    format!(
                        "driver {} does not support the {data_type} data type",
                        driver.short_name()
                    ),
                ));
            }
            band_types.push(data_type);
        }
        if driver.has_capability(DriverCapabilities::UNIFORM_BAND_TYPE) {
            if let Some(other) = band_types.iter().find(|t| **t != band_types[0]) {
                return Err(invalid(
                    "band_list",
                    format!(
                        "driver {} needs one data type for all bands, got {} and {other}; set output_type",
                        driver.short_name(),
                        band_types[0]
                    ),
                ));
            }
        }

        let (window, window_size) = self.resolve_window(src)?;
        let output_size = self.resolve_output_size(window_size)?;

        let geo_transform = src.geo_transform_opt().map(|gt| {
            let (x, y) = gt.apply(window.0 as f64, window.1 as f64);
            let x_ratio = window_size.0 as f64 / output_size.0 as f64;
            let y_ratio = window_size.1 as f64 / output_size.1 as f64;
            [
                x,
                gt[1] * x_ratio,
                gt[2] * y_ratio,
                y,
                gt[4] * x_ratio,
                gt[5] * y_ratio,
            ]
        });

        let spatial_ref = match &self.output_srs {
            Some(def) => Some(
                SpatialRef::from_definition(def).map_err(|e| invalid("output_srs", e.to_string()))?,
            ),
            None => src.spatial_ref().cloned(),
        };

        if let Some(NoDataOption::Value(v)) = self.no_data {
            if let Some(t) = band_types.iter().find(|t| !t.is_representable(v)) {
                return Err(invalid(
                    "no_data",
                    format!("{v} is not representable as {t}"),
                ));
            }
        }

        let scale = match self.scale {
            Some((src_min, src_max, dst_min, dst_max)) => {
                if src_max == src_min || !(src_max - src_min).is_finite() {
                    return Err(invalid(
                        "scale",
                        format!("degenerate source range {src_min}..{src_max}"),
                    ));
                }
                let ratio = (dst_max - dst_min) / (src_max - src_min);
                Some((ratio, dst_min - src_min * ratio))
            }
            None => None,
        };

        let plan = TranslatePlan {
            driver,
            bands,
            band_types,
            window,
            window_size,
            output_size,
            resample_alg: self.resample_alg,
            geo_transform,
            spatial_ref,
            no_data: self.no_data,
            scale,
            creation_options: parse_key_values("creation_options", &self.creation_options)?,
            metadata_options: parse_key_values("metadata_options", &self.metadata_options)?,
        };
        debug!("resolved raster translation plan: {plan:?}");
        Ok(plan)
    }

    fn resolve_driver(&self, dest: &Path) -> Result<Driver> {
        let driver = match &self.format {
            Some(name) => DriverManager::get_driver_by_name(name)
                .map_err(|_| invalid("format", format!("unknown driver '{name}'")))?,
            None => match DriverManager::get_output_driver_for_dataset_name(
                dest,
                DriverCapabilities::RASTER,
            ) {
                Some(driver) => driver,
                None => DriverManager::get_driver_by_name("GTiff")
                    .map_err(|e| invalid("format", e.to_string()))?,
            },
        };
        if !driver.has_capability(DriverCapabilities::RASTER | DriverCapabilities::CREATE) {
            return Err(invalid(
                "format",
                format!("driver {} cannot create raster datasets", driver.short_name()),
            ));
        }
        Ok(driver)
    }

    fn resolve_window(&self, src: &Dataset) -> Result<((isize, isize), (usize, usize))> {
        let (cols, rows) = src.raster_size();
        let (x_off, y_off, w, h) = match (self.src_win, self.proj_win) {
            (Some(_), Some(_)) => {
                return Err(GeoError::ConflictingOption(
                    "src_win and proj_win are mutually exclusive".to_string(),
                ))
            }
            (Some(win), None) => win,
            (None, Some((ulx, uly, lrx, lry))) => {
                let gt = src
                    .geo_transform_opt()
                    .ok_or_else(|| invalid("proj_win", "source has no geo-transform"))?;
                if !gt.is_north_up() {
                    return Err(invalid("proj_win", "source geo-transform is rotated"));
                }
                let x_off = ((ulx - gt[0]) / gt[1]).round();
                let y_off = ((uly - gt[3]) / gt[5]).round();
                let w = ((lrx - ulx) / gt[1]).round();
                let h = ((lry - uly) / gt[5]).round();
                if !(w >= 1.0 && h >= 1.0) {
                    return Err(invalid(
                        "proj_win",
                        format!("window ({ulx}, {uly}, {lrx}, {lry}) is empty"),
                    ));
                }
                (x_off as isize, y_off as isize, w as usize, h as usize)
            }
            (None, None) => (0, 0, cols, rows),
        };
        if w == 0 || h == 0 {
            return Err(invalid("src_win", "window size must be positive"));
        }
        let option = if self.proj_win.is_some() {
            "proj_win"
        } else {
            "src_win"
        };
        let outside = x_off >= cols as isize
            || y_off >= rows as isize
            || x_off + w as isize <= 0
            || y_off + h as isize <= 0;
        if outside {
            return Err(invalid(
                option,
                format!("window is entirely outside the {cols}x{rows} source raster"),
            ));
        }
        if x_off < 0 || y_off < 0 || x_off as usize + w > cols || y_off as usize + h > rows {
            warn!("{option} partially outside the source raster, filling with nodata");
        }
        Ok(((x_off, y_off), (w, h)))
    }

    fn resolve_output_size(&self, window_size: (usize, usize)) -> Result<(usize, usize)> {
        let size = self.requested_output_size(window_size)?;
        if pixel_count(size).is_none() {
            let option = if self.x_size_pct.is_some() {
                "size_pct"
            } else {
                "size_pixels"
            };
            return Err(invalid(
                option,
                format!("output size {}x{} is too large", size.0, size.1),
            ));
        }
        Ok(size)
    }

    fn requested_output_size(&self, window_size: (usize, usize)) -> Result<(usize, usize)> {
        let pixels = self.x_size_pixels.is_some() || self.y_size_pixels.is_some();
        let pct = self.x_size_pct.is_some() || self.y_size_pct.is_some();
        if pixels && pct {
            return Err(GeoError::ConflictingOption(
                "output size given both in pixels and in percent".to_string(),
            ));
        }
        if pixels {
            return match (self.x_size_pixels, self.y_size_pixels) {
                (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
                (Some(_), Some(_)) => Err(invalid("size_pixels", "sizes must be positive")),
                _ => Err(invalid("size_pixels", "both width and height are required")),
            };
        }
        if pct {
            return match (self.x_size_pct, self.y_size_pct) {
                (Some(x), Some(y)) if !x.is_finite() || !y.is_finite() => {
                    Err(invalid("size_pct", "percentages must be finite"))
                }
                (Some(x), Some(y)) if x > 0.0 && y > 0.0 => Ok((
                    percent_size(window_size.0, x),
                    percent_size(window_size.1, y),
                )),
                (Some(_), Some(_)) => Err(invalid("size_pct", "percentages must be positive")),
                _ => Err(invalid("size_pct", "both width and height are required")),
            };
        }
        Ok(window_size)
    }
}

/// Converts raster data between different formats.
///
/// The destination is overwritten if it exists. See [`TranslateOptions`].
pub fn translate<P: AsRef<Path>>(
    src: &Dataset,
    dest: P,
    options: Option<TranslateOptions>,
) -> Result<Dataset> {
    translate_with_progress(src, dest, options, &mut |_| true)
}

/// [`translate`] reporting the completed fraction after every band.
///
/// Returning `false` from `progress` stops the translation with
/// [`GeoError::Cancelled`]; the bands written so far are left in place.
pub fn translate_with_progress<P: AsRef<Path>>(
    src: &Dataset,
    dest: P,
    options: Option<TranslateOptions>,
    progress: &mut dyn FnMut(f64) -> bool,
) -> Result<Dataset> {
    let dest = dest.as_ref();
    let plan = options.unwrap_or_default().resolve(src, dest)?;
    info!(
        "translating '{}' to '{}' ({})",
        src.description(),
        dest.display(),
        plan.driver.short_name()
    );
    let mut out = create_destination(src, dest, &plan)
        .map_err(|e| e.in_translation(Stage::Write, dest.display().to_string()))?;

    let total = plan.bands.len();
    for (i, src_index) in plan.bands.iter().enumerate() {
        let context = format!("band {} (source band {src_index})", i + 1);
        copy_band(src, &mut out, &plan, i + 1, *src_index)
            .map_err(|e| {
                let stage = e.stage();
                e.in_translation(stage, &context)
            })?;
        if !progress((i + 1) as f64 / total as f64) {
            return Err(GeoError::Cancelled(context));
        }
    }

    out.flush_cache()
        .map_err(|e| e.in_translation(Stage::Write, dest.display().to_string()))?;
    info!("wrote {total} band(s) to '{}'", dest.display());
    Ok(out)
}

fn create_destination(src: &Dataset, dest: &Path, plan: &TranslatePlan) -> Result<Dataset> {
    let creation_options: Vec<RasterCreationOption> = plan
        .creation_options
        .iter()
        .map(|(key, value)| RasterCreationOption { key, value })
        .collect();
    let (w, h) = plan.output_size;
    let mut out =
        plan.driver
            .create_with_datatype(dest, w, h, 0, plan.band_types[0], &creation_options)?;
    for data_type in &plan.band_types {
        out.add_band(*data_type)?;
    }
    if let Some(gt) = &plan.geo_transform {
        out.set_geo_transform(gt)?;
    }
    out.set_spatial_ref(plan.spatial_ref.clone());
    for entry in src.metadata().into_iter().filter(|e| e.domain.is_empty()) {
        out.set_metadata_item(&entry.key, &entry.value, "")?;
    }
    for (key, value) in &plan.metadata_options {
        out.set_metadata_item(key, value, "")?;
    }
    Ok(out)
}

fn copy_band(
    src: &Dataset,
    out: &mut Dataset,
    plan: &TranslatePlan,
    dst_index: usize,
    src_index: usize,
) -> Result<()> {
    let src_band = src.rasterband(src_index)?;
    let (mut real, mut imaginary) = src_band.read_window_samples(
        plan.window,
        plan.window_size,
        plan.output_size,
        plan.resample_alg,
    );
    if let Some((scale, offset)) = plan.scale {
        let src_no_data = src_band.no_data_value();
        let rescale = |v: &mut f64| {
            if src_no_data.map_or(true, |nd| *v != nd) {
                *v = *v * scale + offset;
            }
        };
        real.iter_mut().for_each(rescale);
        if let Some(im) = imaginary.as_mut() {
            im.iter_mut().for_each(|v| *v *= scale);
        }
    }

    let dst_band = out.rasterband_mut(dst_index)?;
    dst_band.set_samples(real, imaginary);
    match plan.no_data {
        Some(NoDataOption::Value(v)) => dst_band.set_no_data_value(Some(v))?,
        Some(NoDataOption::Unset) => dst_band.set_no_data_value(None)?,
        None => {
            if let Some(v) = src_band.no_data_value() {
                if dst_band.band_type().is_representable(v) {
                    dst_band.set_no_data_value(Some(v))?;
                } else {
                    warn!(
                        "nodata value {v} of source band {src_index} is not representable as {}",
                        dst_band.band_type()
                    );
                }
            }
        }
    }
    if plan.scale.is_none() {
        dst_band.set_scale(src_band.scale());
        dst_band.set_offset(src_band.offset());
    }
    dst_band.set_description(&src_band.description());
    for entry in src_band.metadata().into_iter().filter(|e| e.domain.is_empty()) {
        dst_band.set_metadata_item(&entry.key, &entry.value, "")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_near;
    use crate::raster::Buffer;
    use crate::test_utils::{mem_byte_raster, mem_rgb_raster, TempFixture};

    #[test]
    fn test_band_list_validation() {
        let src = mem_rgb_raster();
        let dest = Path::new("out.tif");
        for list in [vec![], vec![0], vec![4]] {
            let options = TranslateOptions {
                band_list: Some(list),
                ..Default::default()
            };
            let err = options.resolve(&src, dest).unwrap_err();
            assert!(matches!(
                err,
                GeoError::InvalidOption {
                    option: "band_list",
                    ..
                }
            ));
        }
        let options = TranslateOptions {
            band_list: Some(vec![3, 1, 1]),
            ..Default::default()
        };
        let plan = options.resolve(&src, dest).unwrap();
        assert_eq!(plan.bands(), &[3, 1, 1]);
    }

    #[test]
    fn test_size_options() {
        let src = mem_byte_raster();
        let dest = Path::new("out.tif");
        let options = TranslateOptions {
            x_size_pixels: Some(10),
            x_size_pct: Some(50.0),
            y_size_pct: Some(50.0),
            ..Default::default()
        };
        assert!(matches!(
            options.resolve(&src, dest),
            Err(GeoError::ConflictingOption(_))
        ));

        let options = TranslateOptions {
            x_size_pixels: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            options.resolve(&src, dest),
            Err(GeoError::InvalidOption { .. })
        ));

        let options = TranslateOptions {
            x_size_pct: Some(12.0),
            y_size_pct: Some(1.0),
            ..Default::default()
        };
        // round(20 * 0.12) = 2, round(20 * 0.01) = 0 -> 1
        assert_eq!(options.resolve(&src, dest).unwrap().output_size(), (2, 1));
    }

    #[test]
    fn test_resize_keeps_footprint() {
        let src = mem_byte_raster();
        let options = TranslateOptions {
            format: Some("MEM".to_string()),
            x_size_pixels: Some(10),
            y_size_pixels: Some(5),
            ..Default::default()
        };
        let out = translate(&src, "", Some(options)).unwrap();
        assert_eq!(out.raster_size(), (10, 5));
        let gt = out.geo_transform().unwrap();
        let src_gt = src.geo_transform().unwrap();
        assert_eq!(gt[0], src_gt[0]);
        assert_eq!(gt[3], src_gt[3]);
        assert_near!(gt[1], src_gt[1] * 2.0, epsilon = 1e-12);
        assert_near!(gt[5], src_gt[5] * 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_percent_resize_matches_pixel_resize() {
        let src = mem_rgb_raster();
        let by_pct = TranslateOptions {
            format: Some("MEM".to_string()),
            x_size_pct: Some(50.0),
            y_size_pct: Some(30.0),
            ..Default::default()
        };
        let by_pixels = TranslateOptions {
            format: Some("MEM".to_string()),
            x_size_pixels: Some(10),
            y_size_pixels: Some(3),
            ..Default::default()
        };
        let a = translate(&src, "", Some(by_pct)).unwrap();
        let b = translate(&src, "", Some(by_pixels)).unwrap();
        assert_eq!(a.raster_size(), (10, 3));
        for (x, y) in a.rasterbands().zip(b.rasterbands()) {
            assert_eq!(x.checksum(), y.checksum());
        }
        assert_eq!(a.geo_transform().unwrap(), b.geo_transform().unwrap());
    }

    #[test]
    fn test_output_type_coercion() {
        let driver = DriverManager::get_driver_by_name("MEM").unwrap();
        let mut src = driver
            .create_with_band_type::<f32, _>("", 2, 2, 1)
            .unwrap();
        let buffer = Buffer::new((2, 2), vec![-3.0f32, 2.5, 300.7, f32::NAN]).unwrap();
        src.rasterband_mut(1)
            .unwrap()
            .write((0, 0), (2, 2), &buffer)
            .unwrap();
        let options = TranslateOptions {
            format: Some("MEM".to_string()),
            output_type: Some(DataType::Byte),
            ..Default::default()
        };
        let out = translate(&src, "", Some(options)).unwrap();
        let band = out.rasterband(1).unwrap();
        assert_eq!(band.band_type(), DataType::Byte);
        let data = band.read_band_as::<u8>().unwrap();
        assert_eq!(data.data(), &[0, 3, 255, 0]);
    }

    #[test]
    fn test_src_win_and_proj_win() {
        let src = mem_byte_raster();
        let gt = src.geo_transform().unwrap();
        let dest = Path::new("out.tif");

        let options = TranslateOptions {
            src_win: Some((0, 0, 5, 5)),
            proj_win: Some((gt[0], gt[3], gt[0] + 5.0 * gt[1], gt[3] + 5.0 * gt[5])),
            ..Default::default()
        };
        assert!(matches!(
            options.resolve(&src, dest),
            Err(GeoError::ConflictingOption(_))
        ));

        let options = TranslateOptions {
            proj_win: Some((
                gt[0] + 2.0 * gt[1],
                gt[3] + 3.0 * gt[5],
                gt[0] + 7.0 * gt[1],
                gt[3] + 13.0 * gt[5],
            )),
            ..Default::default()
        };
        let plan = options.resolve(&src, dest).unwrap();
        assert_eq!(plan.source_window(), ((2, 3), (5, 10)));
        assert_eq!(plan.output_size(), (5, 10));

        let options = TranslateOptions {
            src_win: Some((100, 100, 5, 5)),
            ..Default::default()
        };
        assert!(matches!(
            options.resolve(&src, dest),
            Err(GeoError::InvalidOption {
                option: "src_win",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_window_is_filled() {
        let src = mem_byte_raster();
        let options = TranslateOptions {
            format: Some("MEM".to_string()),
            src_win: Some((18, 0, 4, 1)),
            ..Default::default()
        };
        let out = translate(&src, "", Some(options)).unwrap();
        let data = out.rasterband(1).unwrap().read_band_as::<u8>().unwrap();
        let first = src.rasterband(1).unwrap().read_band_as::<u8>().unwrap();
        assert_eq!(&data.data()[..2], &first.data()[18..20]);
        assert_eq!(&data.data()[2..], &[0, 0]);
    }

    #[test]
    fn test_scale_and_nodata() {
        let src = mem_byte_raster();
        let dest = Path::new("out.tif");
        let options = TranslateOptions {
            scale: Some((5.0, 5.0, 0.0, 1.0)),
            ..Default::default()
        };
        assert!(matches!(
            options.resolve(&src, dest),
            Err(GeoError::InvalidOption { option: "scale", .. })
        ));

        let options = TranslateOptions {
            no_data: Some(NoDataOption::Value(-1.0)),
            ..Default::default()
        };
        assert!(matches!(
            options.resolve(&src, dest),
            Err(GeoError::InvalidOption {
                option: "no_data",
                ..
            })
        ));

        let options = TranslateOptions {
            format: Some("MEM".to_string()),
            output_type: Some(DataType::Float32),
            scale: Some((0.0, 255.0, 0.0, 1.0)),
            no_data: Some(NoDataOption::Value(-1.0)),
            metadata_options: vec!["SOURCE=test".to_string()],
            ..Default::default()
        };
        let out = translate(&src, "", Some(options)).unwrap();
        let band = out.rasterband(1).unwrap();
        assert_eq!(band.no_data_value(), Some(-1.0));
        let stats = band.compute_raster_min_max(false).unwrap();
        assert!(stats.max <= 1.0 && stats.min >= 0.0);
        assert_eq!(out.metadata_item("SOURCE", ""), Some("test".to_string()));
    }

    #[test]
    fn test_translate_to_gtiff_keeps_checksum() {
        let src = mem_rgb_raster();
        let fixture = TempFixture::empty("translated.tif");
        let options = TranslateOptions {
            band_list: Some(vec![3, 2]),
            ..Default::default()
        };
        let mut out = translate(&src, &fixture, Some(options)).unwrap();
        assert_eq!(out.driver().short_name(), "GTiff");
        out.close().unwrap();

        let reopened = Dataset::open(&fixture).unwrap();
        assert_eq!(reopened.raster_count(), 2);
        assert_eq!(
            reopened.rasterband(1).unwrap().checksum(),
            src.rasterband(3).unwrap().checksum()
        );
        assert_eq!(
            reopened.rasterband(2).unwrap().checksum(),
            src.rasterband(2).unwrap().checksum()
        );
        assert_eq!(reopened.geo_transform_opt(), src.geo_transform_opt());
    }

    #[test]
    fn test_translate_to_gtiff_with_wide_types() {
        let src = mem_rgb_raster();
        let fixture = TempFixture::empty("wide.tif");
        for output_type in [
            DataType::Int16,
            DataType::UInt16,
            DataType::Int32,
            DataType::Float32,
            DataType::Float64,
        ] {
            let options = TranslateOptions {
                band_list: Some(vec![3, 2, 1]),
                output_type: Some(output_type),
                ..Default::default()
            };
            let mut out = translate(&src, &fixture, Some(options)).unwrap();
            out.close().unwrap();

            let reopened = Dataset::open(&fixture).unwrap();
            assert_eq!(reopened.raster_count(), 3);
            for (dst, src_index) in [(1, 3), (2, 2), (3, 1)] {
                let band = reopened.rasterband(dst).unwrap();
                assert_eq!(band.band_type(), output_type);
                assert_eq!(
                    band.checksum(),
                    src.rasterband(src_index).unwrap().checksum(),
                    "band {dst} as {output_type}"
                );
            }
        }
    }

    #[test]
    fn test_mixed_band_types_need_output_type_for_gtiff() {
        let mut src = mem_rgb_raster();
        src.add_band(DataType::Int16).unwrap();
        let dest = Path::new("mixed.tif");

        let options = TranslateOptions {
            band_list: Some(vec![1, 4]),
            ..Default::default()
        };
        let err = options.resolve(&src, dest).unwrap_err();
        assert!(matches!(
            err,
            GeoError::InvalidOption {
                option: "band_list",
                ..
            }
        ));
        assert_eq!(err.stage(), Stage::Resolve);

        let options = TranslateOptions {
            band_list: Some(vec![1, 4]),
            output_type: Some(DataType::Int16),
            ..Default::default()
        };
        assert_eq!(
            options.resolve(&src, dest).unwrap().band_types(),
            [DataType::Int16, DataType::Int16]
        );

        let options = TranslateOptions {
            format: Some("MEM".to_string()),
            band_list: Some(vec![1, 4]),
            ..Default::default()
        };
        assert_eq!(
            options.resolve(&src, Path::new("")).unwrap().band_types(),
            [DataType::Byte, DataType::Int16]
        );
    }

    #[test]
    fn test_oversized_output_is_rejected() {
        let src = mem_byte_raster();
        let dest = Path::new("out.tif");
        let options = TranslateOptions {
            x_size_pixels: Some(usize::MAX / 2),
            y_size_pixels: Some(3),
            ..Default::default()
        };
        assert!(matches!(
            options.resolve(&src, dest),
            Err(GeoError::InvalidOption {
                option: "size_pixels",
                ..
            })
        ));

        for pct in [1e300, f64::INFINITY] {
            let options = TranslateOptions {
                x_size_pct: Some(pct),
                y_size_pct: Some(100.0),
                ..Default::default()
            };
            assert!(matches!(
                options.resolve(&src, dest),
                Err(GeoError::InvalidOption {
                    option: "size_pct",
                    ..
                })
            ));
        }

        let band = src.rasterband(1).unwrap();
        assert!(matches!(
            band.read_as::<u8>((0, 0), (20, 20), (usize::MAX / 2, 3), None),
            Err(GeoError::BadArgument(_))
        ));
    }

    #[test]
    fn test_cancel_after_first_band() {
        let src = mem_rgb_raster();
        let options = TranslateOptions {
            format: Some("MEM".to_string()),
            ..Default::default()
        };
        let mut calls = 0;
        let err = translate_with_progress(&src, "", Some(options), &mut |_| {
            calls += 1;
            false
        })
        .unwrap_err();
        assert!(matches!(err, GeoError::Cancelled(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_unknown_format() {
        let src = mem_byte_raster();
        let options = TranslateOptions {
            format: Some("NOPE".to_string()),
            ..Default::default()
        };
        let err = translate(&src, "out.nope", Some(options)).unwrap_err();
        assert_eq!(err.stage(), Stage::Resolve);
    }
}
