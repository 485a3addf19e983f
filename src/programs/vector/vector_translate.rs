use std::borrow::Borrow;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::dataset::open_for_update;
use crate::driver::{Driver, DriverCapabilities, DriverManager};
use crate::errors::*;
use crate::metadata::Metadata;
use crate::options::{parse_key_values, OpenFlags};
use crate::programs::destination::DatasetDestination;
use crate::spatial_ref::{CoordTransform, SpatialRef};
use crate::vector::ops::{GeometryOps, SpatialFilter, SpatialFilterPolicy};
use crate::vector::sql::{self, parse_expression, Dialect, Expr};
use crate::vector::{explode, Defn, Feature, GeometryType, Layer, LayerOptions};
use crate::Dataset;

/// How the destination is opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccessMode {
    /// Create a new dataset; fails if the destination exists.
    #[default]
    Create,
    /// Open an existing dataset and add new layers to it.
    Update,
    /// Add features to existing layers, creating missing ones.
    Append,
    /// Replace destination layers of the same name.
    Overwrite,
}

/// Geometry operation applied to every feature before it is written.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum GeometryOp {
    #[default]
    None,
    /// Insert vertices so that no segment is longer than the given length.
    Segmentize(f64),
}

/// Options of [`vector_translate`], in the spirit of `ogr2ogr`.
#[derive(Clone, Debug, Default)]
pub struct VectorTranslateOptions {
    /// Output driver short name. Guessed from the destination extension,
    /// `GeoJSON` otherwise.
    pub format: Option<String>,
    pub access_mode: AccessMode,
    /// Source layers to translate, all when `None`.
    pub source_layers: Option<Vec<String>>,
    /// Name of the output layer; only valid with a single source layer.
    pub new_layer_name: Option<String>,
    /// A `SELECT` statement whose result set is translated instead of the
    /// source layers. Layer and filter options are ignored.
    pub sql_statement: Option<String>,
    pub dialect: Dialect,
    pub where_clause: Option<String>,
    /// `(min_x, min_y, max_x, max_y)` in source layer coordinates.
    pub spatial_filter: Option<(f64, f64, f64, f64)>,
    /// Defaults to the `OGR_EXACT_SPATIAL_FILTER` configuration option.
    pub spatial_filter_policy: Option<SpatialFilterPolicy>,
    /// Fields to keep, matched case-insensitively, in output order.
    pub selected_fields: Option<Vec<String>>,
    /// Translate only this feature; filters are skipped.
    pub fid: Option<u64>,
    pub output_srs: Option<String>,
    /// Overrides the spatial reference of the source layers.
    pub source_srs: Option<String>,
    /// Reproject into `output_srs` when `true`, only assign it otherwise.
    pub transform: bool,
    pub geometry_op: GeometryOp,
    pub explode_collections: bool,
    /// Keep source FIDs when appending.
    pub preserve_fid: bool,
    /// Skip and count features that fail to translate instead of aborting.
    pub skip_failures: bool,
    pub dataset_creation_options: Vec<String>,
    pub layer_creation_options: Vec<String>,
}

/// Resolved translation of one source layer.
#[derive(Clone, Debug)]
pub struct LayerPlan {
    source_name: String,
    destination_name: String,
    selected_fields: Option<Vec<String>>,
    filter: Option<Expr>,
    spatial_ref: Option<SpatialRef>,
    transform: Option<CoordTransform>,
}

impl LayerPlan {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    /// Output fields in order, with the spelling of the source schema.
    pub fn selected_fields(&self) -> Option<&[String]> {
        self.selected_fields.as_deref()
    }

    /// Spatial reference of the output layer.
    pub fn spatial_ref(&self) -> Option<&SpatialRef> {
        self.spatial_ref.as_ref()
    }

    pub fn reprojects(&self) -> bool {
        self.transform.as_ref().is_some_and(|t| !t.is_identity())
    }
}

/// A validated, immutable [`VectorTranslateOptions`] bound to one source.
#[derive(Clone, Debug)]
pub struct VectorTranslatePlan {
    driver: Driver,
    access_mode: AccessMode,
    layers: Vec<LayerPlan>,
    sql_statement: Option<String>,
    dialect: Dialect,
    spatial_filter: Option<SpatialFilter>,
    fid: Option<u64>,
    geometry_op: GeometryOp,
    explode_collections: bool,
    preserve_fid: bool,
    skip_failures: bool,
    dataset_creation_options: Vec<(String, String)>,
    layer_creation_options: Vec<String>,
}

impl VectorTranslatePlan {
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    pub fn layers(&self) -> &[LayerPlan] {
        &self.layers
    }
}

/// Counts reported by [`vector_translate_with_summary`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VectorTranslateSummary {
    pub layers: usize,
    pub features_written: u64,
    /// Features dropped under [`VectorTranslateOptions::skip_failures`].
    pub features_skipped: u64,
}

fn invalid(option: &'static str, msg: impl Into<String>) -> GeoError {
    GeoError::InvalidOption {
        option,
        msg: msg.into(),
    }
}

fn parse_srs(option: &'static str, definition: &str) -> Result<SpatialRef> {
    SpatialRef::from_definition(definition).map_err(|e| invalid(option, e.to_string()))
}

/// Match `names` case-insensitively against `defn`.
fn resolve_fields(names: &[String], defn: &Defn, layer: &str) -> Result<Vec<String>> {
    names
        .iter()
        .map(|name| {
            defn.field_index(name)
                .ok()
                .and_then(|idx| defn.field(idx))
                .map(|f| f.name().to_string())
                .ok_or_else(|| GeoError::UnknownField {
                    field: name.clone(),
                    layer: layer.to_string(),
                })
        })
        .collect()
}

impl VectorTranslateOptions {
    /// Validate the options against `src` and compute the translation plan.
    ///
    /// No I/O is performed.
    pub fn resolve(&self, src: &Dataset, dest: &DatasetDestination) -> Result<VectorTranslatePlan> {
        if self.fid.is_some() && self.sql_statement.is_some() {
            return Err(GeoError::ConflictingOption(
                "fid and sql_statement are mutually exclusive".to_string(),
            ));
        }
        if self.preserve_fid && self.explode_collections {
            return Err(GeoError::ConflictingOption(
                "preserve_fid and explode_collections are mutually exclusive".to_string(),
            ));
        }
        if self.source_srs.is_some() && self.output_srs.is_none() {
            return Err(invalid("source_srs", "requires output_srs"));
        }
        if let GeometryOp::Segmentize(length) = self.geometry_op {
            if !(length > 0.0 && length.is_finite()) {
                return Err(invalid(
                    "geometry_op",
                    format!("segmentize length must be positive, got {length}"),
                ));
            }
        }
        let spatial_filter = match self.spatial_filter {
            Some((min_x, min_y, max_x, max_y)) => {
                if !(min_x <= max_x && min_y <= max_y) {
                    return Err(invalid(
                        "spatial_filter",
                        format!("({min_x}, {min_y}, {max_x}, {max_y}) is not a rectangle"),
                    ));
                }
                Some(SpatialFilter::from_rect(
                    min_x,
                    min_y,
                    max_x,
                    max_y,
                    self.spatial_filter_policy.unwrap_or_default(),
                ))
            }
            None => None,
        };
        let where_clause = self
            .where_clause
            .as_deref()
            .map(parse_expression)
            .transpose()?;

        let driver = self.resolve_driver(dest)?;
        let dataset_creation_options =
            parse_key_values("dataset_creation_options", &self.dataset_creation_options)?;
        parse_key_values("layer_creation_options", &self.layer_creation_options)?;

        let source_srs = self
            .source_srs
            .as_deref()
            .map(|def| parse_srs("source_srs", def))
            .transpose()?;
        let output_srs = self
            .output_srs
            .as_deref()
            .map(|def| parse_srs("output_srs", def))
            .transpose()?;

        let sources: Vec<&Layer> = match (&self.sql_statement, &self.source_layers) {
            (Some(statement), _) => vec![src.layer_by_name(&sql::statement_table(statement)?)?],
            (None, Some(names)) => names
                .iter()
                .map(|name| src.layer_by_name(name))
                .collect::<Result<_>>()?,
            (None, None) => src.layers().collect(),
        };
        if self.new_layer_name.is_some() && sources.len() != 1 {
            return Err(invalid(
                "new_layer_name",
                format!("requires exactly one source layer, got {}", sources.len()),
            ));
        }

        let mut layers = Vec::with_capacity(sources.len());
        for layer in sources {
            let is_sql = self.sql_statement.is_some();
            // SQL result sets are validated once executed.
            let selected_fields = match &self.selected_fields {
                Some(names) if !is_sql => Some(resolve_fields(names, layer.defn(), layer.name())?),
                Some(names) => Some(names.clone()),
                None => None,
            };
            let filter = match &where_clause {
                Some(expr) if !is_sql => Some(expr.clone().bind(layer.defn(), layer.name())?),
                _ => None,
            };
            let layer_srs = source_srs.clone().or_else(|| layer.spatial_ref().cloned());
            let transform = match (&output_srs, self.transform) {
                (Some(target), true) => {
                    let source = layer_srs.as_ref().ok_or_else(|| {
                        GeoError::TransformFailed(format!(
                            "layer '{}' has no spatial reference to transform from",
                            layer.name()
                        ))
                    })?;
                    Some(CoordTransform::new(source, target)?)
                }
                _ => None,
            };
            layers.push(LayerPlan {
                source_name: layer.name().to_string(),
                destination_name: self
                    .new_layer_name
                    .clone()
                    .unwrap_or_else(|| layer.name().to_string()),
                selected_fields,
                filter,
                spatial_ref: output_srs.clone().or(layer_srs),
                transform,
            });
        }

        let plan = VectorTranslatePlan {
            driver,
            access_mode: self.access_mode,
            layers,
            sql_statement: self.sql_statement.clone(),
            dialect: self.dialect,
            spatial_filter,
            fid: self.fid,
            geometry_op: self.geometry_op,
            explode_collections: self.explode_collections,
            preserve_fid: self.preserve_fid,
            skip_failures: self.skip_failures,
            dataset_creation_options,
            layer_creation_options: self.layer_creation_options.clone(),
        };
        debug!("resolved vector translation plan: {plan:?}");
        Ok(plan)
    }

    fn resolve_driver(&self, dest: &DatasetDestination) -> Result<Driver> {
        let driver = match (dest, &self.format) {
            (DatasetDestination::Dataset(dataset), format) => {
                let driver = dataset.driver().clone();
                if let Some(name) = format.as_deref() {
                    if !name.eq_ignore_ascii_case(&driver.short_name()) {
                        warn!(
                            "ignoring format {name}, destination is an open {} dataset",
                            driver.short_name()
                        );
                    }
                }
                driver
            }
            (DatasetDestination::Path(_), Some(name)) => DriverManager::get_driver_by_name(name)
                .map_err(|_| invalid("format", format!("unknown driver '{name}'")))?,
            (DatasetDestination::Path(path), None) => {
                match DriverManager::get_output_driver_for_dataset_name(
                    path,
                    DriverCapabilities::VECTOR,
                ) {
                    Some(driver) => driver,
                    None => DriverManager::get_driver_by_name("GeoJSON")
                        .map_err(|e| invalid("format", e.to_string()))?,
                }
            }
        };
        if !driver.has_capability(DriverCapabilities::VECTOR | DriverCapabilities::CREATE) {
            return Err(invalid(
                "format",
                format!("driver {} cannot write vector layers", driver.short_name()),
            ));
        }
        Ok(driver)
    }
}

/// Converts simple features data between file formats.
///
/// Only the first source dataset is used. See [`VectorTranslateOptions`].
pub fn vector_translate<D: Borrow<Dataset>>(
    src: &[D],
    dest: DatasetDestination,
    options: Option<VectorTranslateOptions>,
) -> Result<Dataset> {
    vector_translate_with_summary(src, dest, options, &mut |_| true).map(|(dataset, _)| dataset)
}

/// [`vector_translate`] returning the translation counts and reporting the
/// completed fraction after every feature.
///
/// Returning `false` from `progress` stops with [`GeoError::Cancelled`]; what
/// was written so far is left in the destination.
pub fn vector_translate_with_summary<D: Borrow<Dataset>>(
    src: &[D],
    dest: DatasetDestination,
    options: Option<VectorTranslateOptions>,
    progress: &mut dyn FnMut(f64) -> bool,
) -> Result<(Dataset, VectorTranslateSummary)> {
    let src = match src {
        [] => return Err(invalid("source", "no source dataset given")),
        [first, rest @ ..] => {
            if !rest.is_empty() {
                warn!("only the first of {} source datasets is translated", src.len());
            }
            first.borrow()
        }
    };
    let plan = options.unwrap_or_default().resolve(src, &dest)?;
    _vector_translate(src, dest, &plan, progress)
}

fn _vector_translate(
    src: &Dataset,
    dest: DatasetDestination,
    plan: &VectorTranslatePlan,
    progress: &mut dyn FnMut(f64) -> bool,
) -> Result<(Dataset, VectorTranslateSummary)> {
    let dest_name = dest.display_name();
    info!(
        "translating '{}' to '{dest_name}' ({}, {:?})",
        src.description(),
        plan.driver.short_name(),
        plan.access_mode
    );
    let mut out = open_destination(dest, plan).map_err(|e| {
        let stage = e.stage();
        e.in_translation(stage, &dest_name)
    })?;

    let mut summary = VectorTranslateSummary::default();
    let layer_count = plan.layers.len();
    for (layer_idx, layer_plan) in plan.layers.iter().enumerate() {
        let mut report = |fraction: f64| progress((layer_idx as f64 + fraction) / layer_count as f64);
        let (written, skipped) = translate_layer(src, &mut out, plan, layer_plan, &mut report)?;
        summary.layers += 1;
        summary.features_written += written;
        summary.features_skipped += skipped;
    }

    out.flush_cache()
        .map_err(|e| e.in_translation(Stage::Write, &dest_name))?;
    if summary.features_skipped > 0 {
        warn!(
            "skipped {} feature(s) that failed to translate",
            summary.features_skipped
        );
    }
    info!(
        "wrote {} feature(s) in {} layer(s) to '{dest_name}'",
        summary.features_written, summary.layers
    );
    Ok((out, summary))
}

fn open_destination(dest: DatasetDestination, plan: &VectorTranslatePlan) -> Result<Dataset> {
    let path = match dest {
        DatasetDestination::Dataset(dataset) => return Ok(dataset),
        DatasetDestination::Path(path) => path,
    };
    let exists = path.exists();
    match (plan.access_mode, exists) {
        (AccessMode::Create, true) => Err(GeoError::DestinationExists(path.display().to_string())),
        (AccessMode::Update, false) => Err(GeoError::OpenFailed {
            path: path.display().to_string(),
            msg: "update mode requires an existing dataset".to_string(),
        }),
        (_, true) => open_for_update(&path, OpenFlags::VECTOR),
        (_, false) => create_destination(&path, plan),
    }
}

fn create_destination(path: &Path, plan: &VectorTranslatePlan) -> Result<Dataset> {
    let mut dataset = plan.driver.create_vector_only(path)?;
    dataset.set_creation_options(plan.dataset_creation_options.clone());
    Ok(dataset)
}

/// Index of the destination layer features of `layer_plan` go to, creating
/// or replacing it as the access mode requires.
fn prepare_layer(
    out: &mut Dataset,
    plan: &VectorTranslatePlan,
    layer_plan: &LayerPlan,
    source: &Layer,
    fields: &Defn,
) -> Result<usize> {
    let name = layer_plan.destination_name.as_str();
    let existing = out
        .layers()
        .position(|l| l.name().eq_ignore_ascii_case(name));
    match (plan.access_mode, existing) {
        (AccessMode::Append, Some(idx)) => return Ok(idx),
        (AccessMode::Overwrite, Some(idx)) => {
            debug!("replacing layer '{name}'");
            out.delete_layer(idx)?;
        }
        (AccessMode::Create | AccessMode::Update, Some(_)) => {
            return Err(GeoError::DestinationExists(format!(
                "layer '{name}' of '{}'",
                out.description()
            )))
        }
        (_, None) => {}
    }

    let geometry_type = if plan.explode_collections {
        source.geometry_type().single_part()
    } else {
        source.geometry_type()
    };
    let options: Vec<&str> = plan
        .layer_creation_options
        .iter()
        .map(String::as_str)
        .collect();
    let layer = out.create_layer(LayerOptions {
        name,
        srs: layer_plan.spatial_ref.as_ref(),
        ty: geometry_type,
        options: Some(options.as_slice()),
    })?;
    for field in fields.fields() {
        layer.create_field(field.clone())?;
    }
    Ok(out.layer_count() - 1)
}

fn translate_layer(
    src: &Dataset,
    out: &mut Dataset,
    plan: &VectorTranslatePlan,
    layer_plan: &LayerPlan,
    progress: &mut dyn FnMut(f64) -> bool,
) -> Result<(u64, u64)> {
    let layer_context = format!("layer '{}'", layer_plan.source_name);
    let result_set = match &plan.sql_statement {
        Some(statement) => Some(
            src.execute_sql(statement, None, plan.dialect)
                .map_err(|e| e.in_translation(Stage::Resolve, &layer_context))?,
        ),
        None => None,
    };
    let source = match &result_set {
        Some(layer) => layer,
        None => src
            .layer_by_name(&layer_plan.source_name)
            .map_err(|e| e.in_translation(Stage::Open, &layer_context))?,
    };

    // Schema of the written features.
    let output_defn = match &layer_plan.selected_fields {
        Some(names) => {
            let names = resolve_fields(names, source.defn(), source.name())
                .map_err(|e| e.in_translation(Stage::Resolve, &layer_context))?;
            let mut defn = Defn::new(source.geometry_type());
            for name in names {
                if let Ok(idx) = source.defn().field_index(&name) {
                    if let Some(field) = source.defn().field(idx) {
                        defn.add_field(field.clone())?;
                    }
                }
            }
            Arc::new(defn)
        }
        None => source.defn().clone(),
    };

    let dst_idx = prepare_layer(out, plan, layer_plan, source, &output_defn).map_err(|e| {
        let stage = e.stage();
        e.in_translation(stage, &layer_context)
    })?;

    let candidates: Vec<&Feature> = match (plan.fid, &result_set) {
        (Some(fid), _) => {
            let feature = source.feature(fid).ok_or_else(|| {
                GeoError::FeatureNotFound {
                    fid,
                    layer: source.name().to_string(),
                }
                .in_translation(Stage::Resolve, &layer_context)
            })?;
            vec![feature]
        }
        (None, Some(result)) => result.all_features().collect(),
        (None, None) => source
            .features()
            .filter(|f| {
                plan.spatial_filter
                    .as_ref()
                    .map_or(true, |filter| filter.matches(f.geometry()))
                    && layer_plan.filter.as_ref().map_or(true, |e| e.matches(f))
            })
            .collect(),
    };
    debug!(
        "{} candidate feature(s) in {layer_context}",
        candidates.len()
    );

    let keep_fid = !plan.explode_collections
        && (plan.preserve_fid || plan.access_mode != AccessMode::Append);
    let total = candidates.len();
    let (mut written, mut skipped) = (0, 0);
    for (i, feature) in candidates.into_iter().enumerate() {
        let fid_label = feature
            .fid()
            .map_or_else(|| "without FID".to_string(), |fid| fid.to_string());
        let res = convert_feature(feature, &output_defn, plan, layer_plan, keep_fid).and_then(
            |features| {
                let dst = out.layer_mut(dst_idx)?;
                for f in features {
                    dst.create_feature(f)?;
                    written += 1;
                }
                Ok(())
            },
        );
        if let Err(e) = res {
            if !plan.skip_failures {
                let stage = e.stage();
                return Err(e.in_translation(
                    stage,
                    format!("feature {fid_label} of {layer_context}"),
                ));
            }
            warn!("skipping feature {fid_label} of {layer_context}: {e}");
            skipped += 1;
        }
        if !progress((i + 1) as f64 / total as f64) {
            return Err(GeoError::Cancelled(format!(
                "feature {fid_label} of {layer_context}"
            )));
        }
    }
    debug!("{layer_context}: {written} written, {skipped} skipped");
    Ok((written, skipped))
}

fn convert_feature(
    feature: &Feature,
    output_defn: &Arc<Defn>,
    plan: &VectorTranslatePlan,
    layer_plan: &LayerPlan,
    keep_fid: bool,
) -> Result<Vec<Feature>> {
    let mut base = feature.clone().remap(output_defn);
    let geometry = match base.take_geometry() {
        Some(geometry) => {
            let geometry = match &layer_plan.transform {
                Some(transform) => geometry.transform(transform)?,
                None => geometry,
            };
            match plan.geometry_op {
                GeometryOp::Segmentize(length) => Some(geometry.segmentize(length)?),
                GeometryOp::None => Some(geometry),
            }
        }
        None => None,
    };
    if !keep_fid {
        base.set_fid(None);
    }

    let parts = match geometry {
        Some(geometry) if plan.explode_collections => explode(geometry),
        Some(geometry) => vec![geometry],
        None => {
            return Ok(vec![base]);
        }
    };
    Ok(parts
        .into_iter()
        .map(|part| {
            let mut f = base.clone();
            f.set_geometry(part);
            f
        })
        .collect())
}
