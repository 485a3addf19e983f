use std::path::{Path, PathBuf};

use geo_types::Geometry;
use log::{debug, warn};

use crate::driver::{unlock_for_writing, Driver, DriverCapabilities, DriverManager};
use crate::errors::*;
use crate::geo_transform::GeoTransform;
use crate::metadata::{Metadata, MetadataStore};
use crate::options::{parse_key_values, Access, DatasetOptions, OpenFlags};
use crate::raster::{DataType, RasterBand};
use crate::spatial_ref::SpatialRef;
use crate::vector::sql::{self, Dialect};
use crate::vector::{Layer, LayerOptions};

/// Wrapper around a raster or vector dataset.
///
/// Data is held in memory. Datasets of persistent drivers opened in update
/// mode or newly created are written back by [`Dataset::flush_cache`] and
/// [`Dataset::close`]; dropping an unclosed dataset closes it.
#[derive(Debug)]
pub struct Dataset {
    driver: Driver,
    path: Option<PathBuf>,
    access: Access,
    raster_size: (usize, usize),
    bands: Vec<RasterBand>,
    geo_transform: Option<GeoTransform>,
    spatial_ref: Option<SpatialRef>,
    layers: Vec<Layer>,
    metadata: MetadataStore,
    creation_options: Vec<(String, String)>,
    dirty: bool,
    closed: bool,
    write_locked: bool,
}

impl Dataset {
    /// An empty, read-only dataset, for use by driver open hooks.
    pub fn empty(driver: &Driver, path: Option<&Path>) -> Dataset {
        let mut metadata = MetadataStore::new();
        if let Some(path) = path {
            metadata.set_description(&path.to_string_lossy());
        }
        Dataset {
            driver: driver.clone(),
            path: path.map(Path::to_path_buf),
            access: Access::ReadOnly,
            raster_size: (0, 0),
            bands: Vec::new(),
            geo_transform: None,
            spatial_ref: None,
            layers: Vec::new(),
            metadata,
            creation_options: Vec::new(),
            dirty: false,
            closed: false,
            write_locked: false,
        }
    }

    /// Open a dataset at the given `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        Self::open_ex(path, DatasetOptions::default())
    }

    /// Open a dataset with extended options. See [`DatasetOptions`].
    ///
    /// Opening with [`OpenFlags::UPDATE`] takes the write lock on `path`;
    /// a second writer fails with [`GeoError::OpenFailed`].
    pub fn open_ex<P: AsRef<Path>>(path: P, options: DatasetOptions) -> Result<Dataset> {
        let path = path.as_ref();
        let open_failed = |msg: String| GeoError::OpenFailed {
            path: path.display().to_string(),
            msg,
        };
        let driver = DriverManager::identify(path, options.allowed_drivers, options.open_flags)?;
        let open = driver
            .open_hook()
            .ok_or_else(|| open_failed(format!("driver {} cannot open files", driver.short_name())))?;

        let access = Access::from(options.open_flags);
        if access == Access::Update {
            if driver.save_hook().is_none() {
                return Err(open_failed(format!(
                    "driver {} does not support update access",
                    driver.short_name()
                )));
            }
            if !crate::driver::lock_for_writing(path) {
                return Err(open_failed("dataset is already opened for writing".to_string()));
            }
        }

        let mut dataset = match open(path, &driver) {
            Ok(dataset) => dataset,
            Err(e) => {
                if access == Access::Update {
                    unlock_for_writing(path);
                }
                return Err(e);
            }
        };
        dataset.driver = driver;
        dataset.path = Some(path.to_path_buf());
        dataset.access = access;
        dataset.dirty = false;
        dataset.write_locked = access == Access::Update;
        dataset.metadata.set_description(&path.to_string_lossy());
        debug!(
            "opened '{}' with {} ({:?})",
            path.display(),
            dataset.driver.short_name(),
            access
        );
        Ok(dataset)
    }

    /// Copy this dataset into a new one created by `driver` at `path`. The copy
    /// is written immediately and returned open in update mode.
    pub fn create_copy<P: AsRef<Path>>(&self, driver: &Driver, path: P) -> Result<Dataset> {
        let path = path.as_ref();
        let mut copy = if self.raster_count() > 0 {
            let data_type = self.bands[0].band_type();
            let (x, y) = self.raster_size;
            let mut copy = driver.create_with_datatype(path, x, y, 0, data_type, &[])?;
            copy.bands = self.bands.clone();
            copy
        } else {
            driver.create_vector_only(path)?
        };
        copy.geo_transform = self.geo_transform;
        copy.spatial_ref = self.spatial_ref.clone();
        for domain in self.metadata_domains() {
            copy.set_metadata_domain(&domain, self.metadata_domain(&domain).unwrap_or_default());
        }
        for layer in &self.layers {
            let options = LayerOptions {
                name: layer.name(),
                srs: layer.spatial_ref(),
                ty: layer.geometry_type(),
                options: None,
            };
            let dst = copy.create_layer(options)?;
            for field in layer.defn().fields() {
                dst.create_field(field.clone())?;
            }
            for feature in layer.all_features() {
                dst.create_feature(feature.clone())?;
            }
        }
        copy.flush_cache()?;
        Ok(copy)
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Path the dataset was opened from or will be written to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Files making up the dataset, empty for in-memory datasets.
    pub fn files(&self) -> Vec<PathBuf> {
        let Some(path) = self.path.as_ref().filter(|_| self.driver.is_persistent()) else {
            return Vec::new();
        };
        let mut files = vec![path.clone()];
        let world_file = path.with_extension("tfw");
        if world_file.is_file() {
            files.push(world_file);
        }
        files
    }

    /// Switch a freshly created dataset to update mode so that it is written
    /// on close.
    pub(crate) fn mark_created(&mut self, write_locked: bool) {
        self.access = Access::Update;
        self.dirty = true;
        self.write_locked = write_locked;
    }

    pub(crate) fn set_creation_options(&mut self, options: Vec<(String, String)>) {
        self.creation_options = options;
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

    /// Fetch the projection definition string for this dataset, empty without
    /// spatial reference.
    pub fn projection(&self) -> String {
        self.spatial_ref
            .as_ref()
            .map(SpatialRef::to_wkt)
            .unwrap_or_default()
    }

    pub fn spatial_ref(&self) -> Option<&SpatialRef> {
        self.spatial_ref.as_ref()
    }

    /// Set the spatial reference system, or remove it with `None`.
    pub fn set_spatial_ref(&mut self, spatial_ref: Option<SpatialRef>) {
        self.spatial_ref = spatial_ref;
        self.dirty = true;
    }

    /// Returns the affine transform from pixel/line to georeferenced
    /// coordinates.
    pub fn geo_transform(&self) -> Result<GeoTransform> {
        self.geo_transform
            .ok_or_else(|| GeoError::BadArgument("dataset has no geo-transform".to_string()))
    }

    /// Affine transform coefficients, `None` if the dataset is not
    /// georeferenced.
    pub fn geo_transform_opt(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    pub fn set_geo_transform(&mut self, transformation: &GeoTransform) -> Result<()> {
        if transformation.iter().any(|c| !c.is_finite()) {
            return Err(GeoError::BadArgument(format!(
                "geo-transform {transformation:?} has non-finite coefficients"
            )));
        }
        self.geo_transform = Some(*transformation);
        self.dirty = true;
        Ok(())
    }

    /// Get the dimensions of the raster as `(cols, rows)`.
    pub fn raster_size(&self) -> (usize, usize) {
        self.raster_size
    }

    /// Set the raster dimensions of a dataset without bands.
    pub fn set_raster_size(&mut self, size: (usize, usize)) -> Result<()> {
        if !self.bands.is_empty() {
            return Err(GeoError::BadArgument(
                "raster size cannot change once bands exist".to_string(),
            ));
        }
        self.raster_size = size;
        self.dirty = true;
        Ok(())
    }

    pub fn raster_count(&self) -> usize {
        self.bands.len()
    }

    fn check_band_index(&self, band_index: usize) -> Result<usize> {
        if band_index == 0 || band_index > self.bands.len() {
            return Err(GeoError::InvalidBandIndex {
                index: band_index,
                count: self.bands.len(),
            });
        }
        Ok(band_index - 1)
    }

    /// Fetch a band object for a dataset.
    ///
    /// Applies to raster datasets, and fetches the
    /// rasterband at the given _1-based_ index.
    pub fn rasterband(&self, band_index: usize) -> Result<&RasterBand> {
        let idx = self.check_band_index(band_index)?;
        Ok(&self.bands[idx])
    }

    pub fn rasterband_mut(&mut self, band_index: usize) -> Result<&mut RasterBand> {
        let idx = self.check_band_index(band_index)?;
        self.dirty = true;
        Ok(&mut self.bands[idx])
    }

    /// Iterate over the bands in index order.
    pub fn rasterbands(&self) -> impl Iterator<Item = &RasterBand> {
        self.bands.iter()
    }

    /// Append a zero-filled band and return its 1-based index.
    pub fn add_band(&mut self, data_type: DataType) -> Result<usize> {
        if self.raster_size.0 == 0 || self.raster_size.1 == 0 {
            return Err(GeoError::BadArgument(
                "raster size must be set before adding bands".to_string(),
            ));
        }
        self.push_band(RasterBand::new(data_type, self.raster_size))
    }

    /// Append a band built elsewhere; its size must match the raster size.
    pub(crate) fn push_band(&mut self, band: RasterBand) -> Result<usize> {
        if band.size() != self.raster_size {
            return Err(GeoError::BadArgument(format!(
                "band size {:?} does not match raster size {:?}",
                band.size(),
                self.raster_size
            )));
        }
        self.bands.push(band);
        self.dirty = true;
        Ok(self.bands.len())
    }

    /// Get the number of layers in this dataset.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Fetch a layer by its 0-based index.
    pub fn layer(&self, idx: usize) -> Result<&Layer> {
        self.layers
            .get(idx)
            .ok_or_else(|| GeoError::LayerNotFound(format!("#{idx}")))
    }

    pub fn layer_mut(&mut self, idx: usize) -> Result<&mut Layer> {
        self.dirty = true;
        self.layers
            .get_mut(idx)
            .ok_or_else(|| GeoError::LayerNotFound(format!("#{idx}")))
    }

    fn layer_index(&self, name: &str) -> Result<usize> {
        self.layers
            .iter()
            .position(|l| l.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| GeoError::LayerNotFound(name.to_string()))
    }

    /// Fetch a layer by name, compared case-insensitively.
    pub fn layer_by_name(&self, name: &str) -> Result<&Layer> {
        let idx = self.layer_index(name)?;
        Ok(&self.layers[idx])
    }

    pub fn layer_by_name_mut(&mut self, name: &str) -> Result<&mut Layer> {
        let idx = self.layer_index(name)?;
        self.dirty = true;
        Ok(&mut self.layers[idx])
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub(crate) fn push_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub(crate) fn layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.dirty = true;
        self.layers.iter_mut()
    }

    /// Creates a new layer. The [`LayerOptions`] struct implements `Default`, so you only need to
    /// specify those options that deviate from the default.
    ///
    /// # Examples
    ///
    /// Create a new layer with an empty name, no spatial reference, and unknown geometry type:
    ///
    /// ```
    /// # use geoconvert::DriverManager;
    /// # let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    /// # let mut dataset = driver.create_vector_only("").unwrap();
    /// let blank_layer = dataset.create_layer(Default::default()).unwrap();
    /// ```
    ///
    /// Create a new named line string layer using WGS84:
    ///
    /// ```
    /// # use geoconvert::{DriverManager, spatial_ref::SpatialRef, vector::{GeometryType, LayerOptions}};
    /// # let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    /// # let mut dataset = driver.create_vector_only("").unwrap();
    /// let srs = SpatialRef::from_epsg(4326).unwrap();
    /// let layer = dataset.create_layer(LayerOptions {
    ///     name: "roads",
    ///     srs: Some(&srs),
    ///     ty: GeometryType::LineString,
    ///     ..Default::default()
    /// }).unwrap();
    /// ```
    pub fn create_layer(&mut self, options: LayerOptions<'_>) -> Result<&mut Layer> {
        let create_failed = |msg: String| GeoError::CreateFailed {
            path: self.description(),
            msg,
        };
        if !self.driver.has_capability(DriverCapabilities::VECTOR) {
            return Err(create_failed(format!(
                "driver {} does not support vector layers",
                self.driver.short_name()
            )));
        }
        if self
            .layers
            .iter()
            .any(|l| l.name().eq_ignore_ascii_case(options.name))
        {
            return Err(create_failed(format!(
                "layer '{}' already exists",
                options.name
            )));
        }
        if !self.layers.is_empty()
            && !self.driver.has_capability(DriverCapabilities::MULTIPLE_LAYERS)
        {
            return Err(create_failed(format!(
                "driver {} supports a single layer per dataset",
                self.driver.short_name()
            )));
        }
        let creation_options = options
            .options
            .map(|items| {
                let items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
                parse_key_values("layer_creation_options", &items)
            })
            .transpose()?
            .unwrap_or_default();

        let mut layer = Layer::new(options.name, options.ty, options.srs.cloned());
        layer.set_creation_options(creation_options);
        debug!("created layer '{}' ({})", options.name, options.ty);
        let idx = self.layers.len();
        self.layers.push(layer);
        self.dirty = true;
        Ok(&mut self.layers[idx])
    }

    /// Remove the layer at the 0-based `idx` and return it.
    pub fn delete_layer(&mut self, idx: usize) -> Result<Layer> {
        if idx >= self.layers.len() {
            return Err(GeoError::LayerNotFound(format!("#{idx}")));
        }
        self.dirty = true;
        Ok(self.layers.remove(idx))
    }

    /// Execute a SQL query against the Dataset. The result set is returned as
    /// a new, detached [`Layer`].
    ///
    /// # Arguments
    /// * `query` - The SQL query
    /// * `spatial_filter` - An optional spatial filter on the queried layer
    /// * `dialect` - The dialect of SQL to use. See [`Dialect`]
    ///
    /// # Example
    ///
    /// ```
    /// # use geoconvert::vector::sql;
    /// # use geoconvert::vector::{FieldDefn, FieldType, LayerOptions};
    /// # use geoconvert::DriverManager;
    /// # let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    /// # let mut ds = driver.create_vector_only("").unwrap();
    /// # let layer = ds.create_layer(LayerOptions { name: "roads", ..Default::default() }).unwrap();
    /// # layer.create_field(FieldDefn::new("highway", FieldType::String)).unwrap();
    /// let query = "SELECT * FROM roads WHERE highway = 'pedestrian'";
    /// let result_set = ds.execute_sql(query, None, sql::Dialect::DEFAULT).unwrap();
    /// assert_eq!(0, result_set.feature_count());
    /// ```
    pub fn execute_sql(
        &self,
        query: &str,
        spatial_filter: Option<&Geometry<f64>>,
        dialect: Dialect,
    ) -> Result<Layer> {
        sql::execute(&self.layers, query, spatial_filter, dialect)
    }

    /// `true` once [`Dataset::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Write pending changes to disk.
    ///
    /// Does nothing for in-memory drivers, for datasets opened read-only, or
    /// when nothing changed since the last flush.
    pub fn flush_cache(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if self.access == Access::ReadOnly {
            debug!(
                "discarding in-memory changes of read-only dataset '{}'",
                self.description()
            );
            self.dirty = false;
            return Ok(());
        }
        if let (Some(save), Some(path)) = (self.driver.save_hook(), self.path.clone()) {
            save(self, &path)?;
            debug!("flushed '{}'", path.display());
        }
        self.dirty = false;
        Ok(())
    }

    /// Flush pending writes and release the dataset.
    ///
    /// Calling `close` again is a no-op. The write lock is released even when
    /// the flush fails.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let res = self.flush_cache();
        if self.write_locked {
            if let Some(path) = &self.path {
                unlock_for_writing(path);
            }
            self.write_locked = false;
        }
        self.closed = true;
        res
    }
}

impl Metadata for Dataset {
    fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    fn metadata_store_mut(&mut self) -> &mut MetadataStore {
        self.dirty = true;
        &mut self.metadata
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close dataset '{}': {e}", self.description());
        }
    }
}

/// Open `path` in update mode if it exists.
pub(crate) fn open_for_update(path: &Path, flags: OpenFlags) -> Result<Dataset> {
    Dataset::open_ex(
        path,
        DatasetOptions {
            open_flags: flags | OpenFlags::UPDATE,
            ..Default::default()
        },
    )
}
