use std::sync::Arc;

use geo_types::{Geometry, Rect};
use indexmap::IndexMap;
use log::debug;

use crate::errors::*;
use crate::metadata::{Metadata, MetadataStore};
use crate::spatial_ref::SpatialRef;
use crate::vector::geometry::{envelope, union_envelope};
use crate::vector::ops::{SpatialFilter, SpatialFilterPolicy};
use crate::vector::sql::{parse_expression, Expr};
use crate::vector::{Defn, Feature, FieldDefn, GeometryType};

/// Layer in a vector dataset
///
/// ```
/// use geoconvert::vector::{FieldDefn, FieldType, GeometryType, LayerOptions};
/// use geoconvert::DriverManager;
///
/// let driver = DriverManager::get_driver_by_name("MEM").unwrap();
/// let mut dataset = driver.create_vector_only("").unwrap();
/// let layer = dataset
///     .create_layer(LayerOptions {
///         name: "points",
///         ty: GeometryType::Point,
///         ..Default::default()
///     })
///     .unwrap();
/// layer.create_field(FieldDefn::new("name", FieldType::String)).unwrap();
/// for feature in layer.features() {
///     // do something with each feature
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Layer {
    name: String,
    defn: Arc<Defn>,
    srs: Option<SpatialRef>,
    features: IndexMap<u64, Feature>,
    next_fid: u64,
    attribute_filter: Option<(String, Expr)>,
    spatial_filter: Option<SpatialFilter>,
    creation_options: Vec<(String, String)>,
    metadata: MetadataStore,
}

impl Layer {
    pub(crate) fn new(name: &str, geometry_type: GeometryType, srs: Option<SpatialRef>) -> Layer {
        Layer::with_defn(name, Defn::new(geometry_type), srs)
    }

    pub(crate) fn with_defn(name: &str, defn: Defn, srs: Option<SpatialRef>) -> Layer {
        Layer {
            name: name.to_string(),
            defn: Arc::new(defn),
            srs,
            features: IndexMap::new(),
            next_fid: 0,
            attribute_filter: None,
            spatial_filter: None,
            creation_options: Vec::new(),
            metadata: MetadataStore::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The layer schema. Pass it to [`Feature::new`] to build features for
    /// this layer.
    pub fn defn(&self) -> &Arc<Defn> {
        &self.defn
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.defn.geometry_type()
    }

    pub fn spatial_ref(&self) -> Option<&SpatialRef> {
        self.srs.as_ref()
    }

    pub(crate) fn set_spatial_ref(&mut self, srs: Option<SpatialRef>) {
        self.srs = srs;
    }

    /// Driver-specific option given at creation, matched case-insensitively.
    pub fn creation_option(&self, key: &str) -> Option<&str> {
        self.creation_options
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn creation_options(&self) -> &[(String, String)] {
        &self.creation_options
    }

    pub(crate) fn set_creation_options(&mut self, options: Vec<(String, String)>) {
        self.creation_options = options;
    }

    pub(crate) fn set_geometry_type(&mut self, geometry_type: GeometryType) {
        Arc::make_mut(&mut self.defn).set_geometry_type(geometry_type);
        self.rebind_features();
    }

    /// Add a field to the schema. Existing features get a null value.
    pub fn create_field(&mut self, field: FieldDefn) -> Result<()> {
        Arc::make_mut(&mut self.defn).add_field(field)?;
        self.rebind_features();
        Ok(())
    }

    fn rebind_features(&mut self) {
        let defn = self.defn.clone();
        for feature in self.features.values_mut() {
            *feature = std::mem::replace(feature, Feature::new(&defn)).remap(&defn);
        }
    }

    /// Store a new feature and return its FID.
    ///
    /// A feature without FID gets the next free one. Values are matched to the
    /// layer's fields by name, so features built for another schema can be
    /// written directly.
    pub fn create_feature(&mut self, feature: Feature) -> Result<u64> {
        let mut feature = feature.remap(&self.defn);
        let fid = match feature.fid() {
            Some(fid) if self.features.contains_key(&fid) => {
                return Err(GeoError::BadArgument(format!(
                    "feature {fid} already exists in layer '{}'",
                    self.name
                )))
            }
            Some(fid) => fid,
            None => self.next_fid,
        };
        feature.set_fid(Some(fid));
        self.next_fid = self.next_fid.max(fid + 1);
        self.features.insert(fid, feature);
        Ok(fid)
    }

    /// Replace an existing feature, identified by its FID.
    pub fn set_feature(&mut self, feature: Feature) -> Result<()> {
        let fid = feature.fid().ok_or_else(|| {
            GeoError::BadArgument("set_feature requires a feature with a FID".to_string())
        })?;
        match self.features.get_mut(&fid) {
            Some(slot) => {
                *slot = feature.remap(&self.defn);
                Ok(())
            }
            None => Err(GeoError::FeatureNotFound {
                fid,
                layer: self.name.clone(),
            }),
        }
    }

    pub fn delete_feature(&mut self, fid: u64) -> Result<()> {
        self.features
            .shift_remove(&fid)
            .map(|_| ())
            .ok_or_else(|| GeoError::FeatureNotFound {
                fid,
                layer: self.name.clone(),
            })
    }

    /// Fetch a feature by its FID. Filters are not applied.
    pub fn feature(&self, fid: u64) -> Option<&Feature> {
        self.features.get(&fid)
    }

    /// Iterate over the features passing the attribute and spatial filters,
    /// in FID insertion order.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values().filter(move |f| self.passes_filters(f))
    }

    /// Iterate over every feature, ignoring filters.
    pub(crate) fn all_features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    /// Number of features passing the installed filters.
    pub fn feature_count(&self) -> u64 {
        if self.attribute_filter.is_none() && self.spatial_filter.is_none() {
            return self.features.len() as u64;
        }
        self.features().count() as u64
    }

    fn passes_filters(&self, feature: &Feature) -> bool {
        self.spatial_filter
            .as_ref()
            .map_or(true, |filter| filter.matches(feature.geometry()))
            && self
                .attribute_filter
                .as_ref()
                .map_or(true, |(_, expr)| expr.matches(feature))
    }

    /// Set a filter on the attributes of the features, using the syntax of a
    /// SQL `WHERE` clause.
    ///
    /// Features for which the predicate is false, null or fails to evaluate are
    /// skipped. Unknown field names fail with [`GeoError::UnknownField`].
    pub fn set_attribute_filter(&mut self, query: &str) -> Result<()> {
        let expr = parse_expression(query)?.bind(&self.defn, &self.name)?;
        debug!("attribute filter on '{}': {query}", self.name);
        self.attribute_filter = Some((query.to_string(), expr));
        Ok(())
    }

    pub fn attribute_filter(&self) -> Option<&str> {
        self.attribute_filter.as_ref().map(|(query, _)| query.as_str())
    }

    /// Clear the attribute filter set on this layer
    pub fn clear_attribute_filter(&mut self) {
        self.attribute_filter = None;
    }

    /// Set a spatial filter on this layer, using the policy set by the
    /// `OGR_EXACT_SPATIAL_FILTER` configuration option.
    pub fn set_spatial_filter(&mut self, geometry: &Geometry<f64>) {
        self.set_spatial_filter_with_policy(geometry, SpatialFilterPolicy::default());
    }

    pub fn set_spatial_filter_with_policy(
        &mut self,
        geometry: &Geometry<f64>,
        policy: SpatialFilterPolicy,
    ) {
        self.spatial_filter = Some(SpatialFilter::new(geometry.clone(), policy));
    }

    /// Set a spatial filter on this layer.
    ///
    /// Refer [OGR_L_SetSpatialFilterRect](https://gdal.org/doxygen/classOGRLayer.html#aa6f6d7ac2c8abde6c0f21c8fdb78b08f)
    pub fn set_spatial_filter_rect(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) {
        self.spatial_filter = Some(SpatialFilter::from_rect(
            min_x,
            min_y,
            max_x,
            max_y,
            SpatialFilterPolicy::default(),
        ));
    }

    pub fn spatial_filter(&self) -> Option<&SpatialFilter> {
        self.spatial_filter.as_ref()
    }

    /// Clear spatial filters set on this layer.
    pub fn clear_spatial_filter(&mut self) {
        self.spatial_filter = None;
    }

    /// Extent of all geometries of the layer, ignoring filters. `None` if the
    /// layer has no geometry.
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.features
            .values()
            .filter_map(|f| f.geometry().and_then(envelope))
            .fold(None, |acc, env| union_envelope(acc, Some(env)))
    }

    /// Geometry type of the features actually present, `Unknown` when mixed.
    pub(crate) fn infer_geometry_type(&self) -> GeometryType {
        self.features
            .values()
            .filter_map(|f| f.geometry().map(GeometryType::of))
            .reduce(GeometryType::merge)
            .unwrap_or(GeometryType::Unknown)
    }

    pub(crate) fn clear_features(&mut self) {
        self.features.clear();
        self.next_fid = 0;
    }
}

impl Metadata for Layer {
    fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    fn metadata_store_mut(&mut self) -> &mut MetadataStore {
        &mut self.metadata
    }
}
