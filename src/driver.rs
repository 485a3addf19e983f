use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};

use bitflags::bitflags;
use log::debug;

use crate::dataset::Dataset;
use crate::errors::*;
use crate::metadata::{Metadata, MetadataStore};
use crate::options::OpenFlags;
use crate::raster::{gtiff, pixel_count, DataType, RasterCreationOption, RasterType};
use crate::vector::geojson;

bitflags! {
    /// What a driver can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriverCapabilities: u32 {
        const RASTER = 0x01;
        const VECTOR = 0x02;
        /// Datasets can be created (and opened in update mode, when the
        /// driver persists them).
        const CREATE = 0x04;
        /// Vector datasets can hold more than one layer.
        const MULTIPLE_LAYERS = 0x08;
        /// Every raster band of a dataset must share one data type.
        const UNIFORM_BAND_TYPE = 0x10;
    }
}

/// Decides from the path and the first bytes of a file whether a driver
/// handles it.
pub type ProbeFn = fn(path: &Path, header: &[u8]) -> bool;
/// Reads a dataset from disk.
pub type OpenFn = fn(path: &Path, driver: &Driver) -> Result<Dataset>;
/// Persists a dataset to disk.
pub type SaveFn = fn(dataset: &Dataset, path: &Path) -> Result<()>;
/// Removes the files of a dataset.
pub type DeleteFn = fn(path: &Path) -> Result<()>;

/// Number of bytes handed to [`ProbeFn`].
const HEADER_SIZE: usize = 1024;

/// A format driver: a name plus the hooks implementing its capabilities.
///
/// Drivers are plain records of function pointers, so new formats can be
/// plugged in at runtime with [`DriverManager::register_driver`].
#[derive(Clone)]
pub struct Driver {
    short_name: String,
    long_name: String,
    capabilities: DriverCapabilities,
    extensions: Vec<String>,
    creation_data_types: Vec<DataType>,
    probe: Option<ProbeFn>,
    open: Option<OpenFn>,
    save: Option<SaveFn>,
    delete: Option<DeleteFn>,
    metadata: MetadataStore,
}

impl Debug for Driver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("short_name", &self.short_name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl PartialEq for Driver {
    fn eq(&self, other: &Driver) -> bool {
        self.short_name.eq_ignore_ascii_case(&other.short_name)
    }
}

impl Driver {
    pub fn new(short_name: &str, long_name: &str, capabilities: DriverCapabilities) -> Driver {
        Driver {
            short_name: short_name.to_string(),
            long_name: long_name.to_string(),
            capabilities,
            extensions: Vec::new(),
            creation_data_types: Vec::new(),
            probe: None,
            open: None,
            save: None,
            delete: None,
            metadata: MetadataStore::new(),
        }
    }

    /// File extensions (without dot) associated with the format.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Driver {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Pixel types accepted by raster creation; empty means all.
    pub fn with_creation_data_types(mut self, data_types: &[DataType]) -> Driver {
        self.creation_data_types = data_types.to_vec();
        self
    }

    pub fn with_probe(mut self, probe: ProbeFn) -> Driver {
        self.probe = Some(probe);
        self
    }

    pub fn with_open(mut self, open: OpenFn) -> Driver {
        self.open = Some(open);
        self
    }

    pub fn with_save(mut self, save: SaveFn) -> Driver {
        self.save = Some(save);
        self
    }

    pub fn with_delete(mut self, delete: DeleteFn) -> Driver {
        self.delete = Some(delete);
        self
    }

    pub fn short_name(&self) -> String {
        self.short_name.clone()
    }

    pub fn long_name(&self) -> String {
        self.long_name.clone()
    }

    pub fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    pub fn has_capability(&self, capability: DriverCapabilities) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn creation_data_types(&self) -> &[DataType] {
        &self.creation_data_types
    }

    /// `true` if datasets of this driver live on disk and can be reopened.
    pub fn is_persistent(&self) -> bool {
        self.save.is_some()
    }

    pub(crate) fn open_hook(&self) -> Option<OpenFn> {
        self.open
    }

    pub(crate) fn save_hook(&self) -> Option<SaveFn> {
        self.save
    }

    fn probe(&self, path: &Path, header: &[u8]) -> bool {
        self.open.is_some() && self.probe.is_some_and(|probe| probe(path, header))
    }

    fn create_failed(&self, path: &Path, msg: impl Into<String>) -> GeoError {
        GeoError::CreateFailed {
            path: path.display().to_string(),
            msg: msg.into(),
        }
    }

    /// An empty dataset in update mode, write-locked when the driver
    /// persists to `path`.
    fn prepare(&self, path: &Path) -> Result<Dataset> {
        if !self.has_capability(DriverCapabilities::CREATE) {
            return Err(self.create_failed(
                path,
                format!("driver {} does not support creation", self.short_name),
            ));
        }
        if !self.is_persistent() {
            let path = (!path.as_os_str().is_empty()).then_some(path);
            let mut dataset = Dataset::empty(self, path);
            dataset.mark_created(false);
            return Ok(dataset);
        }
        if path.as_os_str().is_empty() {
            return Err(self.create_failed(path, "an output path is required"));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(self.create_failed(
                    path,
                    format!("directory '{}' does not exist", parent.display()),
                ));
            }
        }
        if !lock_for_writing(path) {
            return Err(self.create_failed(path, "dataset is already opened for writing"));
        }
        let mut dataset = Dataset::empty(self, Some(path));
        dataset.mark_created(true);
        Ok(dataset)
    }

    /// Create a new dataset of size (`size_x`, `size_y`) with `bands` bands of
    /// type `Byte`.
    pub fn create<P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_band_type::<u8, _>(filename, size_x, size_y, bands)
    }

    /// Create a new dataset of size (`size_x`, `size_y`) with `bands` bands of
    /// the data type matching `T`.
    pub fn create_with_band_type<T: RasterType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_datatype(filename, size_x, size_y, bands, T::datatype(), &[])
    }

    pub fn create_with_band_type_with_options<T: RasterType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
        options: &[RasterCreationOption],
    ) -> Result<Dataset> {
        self.create_with_datatype(filename, size_x, size_y, bands, T::datatype(), options)
    }

    /// Create a new raster dataset with bands of `data_type`.
    ///
    /// The dataset is written when it is closed.
    pub fn create_with_datatype<P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
        data_type: DataType,
        options: &[RasterCreationOption],
    ) -> Result<Dataset> {
        let path = filename.as_ref();
        if !self.has_capability(DriverCapabilities::RASTER) {
            return Err(self.create_failed(
                path,
                format!("driver {} does not support raster data", self.short_name),
            ));
        }
        if !self.creation_data_types.is_empty() && !self.creation_data_types.contains(&data_type)
        {
            return Err(self.create_failed(
                path,
                format!(
                    "driver {} does not support the {data_type} data type",
                    self.short_name
                ),
            ));
        }
        if size_x == 0 || size_y == 0 {
            return Err(self.create_failed(path, "raster dimensions must be positive"));
        }
        if pixel_count((size_x, size_y)).is_none() {
            return Err(self.create_failed(
                path,
                format!("raster dimensions {size_x}x{size_y} are too large"),
            ));
        }

        let mut dataset = self.prepare(path)?;
        dataset.set_raster_size((size_x, size_y))?;
        for _ in 0..bands {
            dataset.add_band(data_type)?;
        }
        dataset.set_creation_options(
            options
                .iter()
                .map(|o| (o.key.to_string(), o.value.to_string()))
                .collect(),
        );
        debug!(
            "created {} dataset '{}' ({size_x}x{size_y}, {bands} {data_type} band(s))",
            self.short_name,
            path.display()
        );
        Ok(dataset)
    }

    /// Create a new vector dataset without layers.
    pub fn create_vector_only<P: AsRef<Path>>(&self, filename: P) -> Result<Dataset> {
        let path = filename.as_ref();
        if !self.has_capability(DriverCapabilities::VECTOR) {
            return Err(self.create_failed(
                path,
                format!("driver {} does not support vector data", self.short_name),
            ));
        }
        self.prepare(path)
    }

    /// Delete the files of the dataset at `path`.
    pub fn delete<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let path = filename.as_ref();
        if is_locked_for_writing(path) {
            return Err(GeoError::WriteFailed {
                path: path.display().to_string(),
                msg: "dataset is opened for writing".to_string(),
            });
        }
        match self.delete {
            Some(delete) => delete(path),
            None => std::fs::remove_file(path).with_write_context(path),
        }
    }
}

impl Metadata for Driver {
    fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    fn metadata_store_mut(&mut self) -> &mut MetadataStore {
        &mut self.metadata
    }
}

/// Populate the `DMD_*`/`DCAP_*` items describing a driver.
fn describe(mut driver: Driver) -> Driver {
    let mut items = vec![format!("DMD_LONGNAME={}", driver.long_name)];
    if !driver.extensions.is_empty() {
        items.push(format!("DMD_EXTENSIONS={}", driver.extensions.join(" ")));
    }
    if driver.has_capability(DriverCapabilities::RASTER) {
        items.push("DCAP_RASTER=YES".to_string());
        let types = match driver.creation_data_types.as_slice() {
            [] => DataType::available_types().to_vec(),
            types => types.to_vec(),
        };
        let names: Vec<&str> = types.iter().map(DataType::name).collect();
        items.push(format!("DMD_CREATIONDATATYPES={}", names.join(" ")));
    }
    if driver.has_capability(DriverCapabilities::VECTOR) {
        items.push("DCAP_VECTOR=YES".to_string());
    }
    if driver.has_capability(DriverCapabilities::CREATE) {
        items.push("DCAP_CREATE=YES".to_string());
    }
    driver.set_metadata_domain("", items);
    driver
}

fn builtin_drivers() -> Vec<Driver> {
    vec![
        describe(Driver::new(
            "MEM",
            "In Memory raster, vector and multidimensional raster",
            DriverCapabilities::RASTER
                | DriverCapabilities::VECTOR
                | DriverCapabilities::CREATE
                | DriverCapabilities::MULTIPLE_LAYERS,
        )),
        describe(gtiff::driver()),
        describe(geojson::driver()),
    ]
}

static DRIVERS: LazyLock<Mutex<Vec<Driver>>> = LazyLock::new(|| Mutex::new(builtin_drivers()));

static WRITE_LOCKS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

fn drivers() -> MutexGuard<'static, Vec<Driver>> {
    DRIVERS.lock().unwrap_or_else(|e| e.into_inner())
}

fn lock_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Take the process-wide write lock on `path`. Returns `false` if another
/// dataset already holds it.
pub(crate) fn lock_for_writing(path: &Path) -> bool {
    WRITE_LOCKS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(lock_key(path))
}

pub(crate) fn unlock_for_writing(path: &Path) {
    WRITE_LOCKS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&lock_key(path));
}

pub(crate) fn is_locked_for_writing(path: &Path) -> bool {
    WRITE_LOCKS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .contains(&lock_key(path))
}

/// The process-wide driver registry.
///
/// The built-in `MEM`, `GTiff` and `GeoJSON` drivers are registered on first use.
pub struct DriverManager;

impl DriverManager {
    /// Returns the number of registered drivers.
    pub fn count() -> usize {
        drivers().len()
    }

    /// Returns the driver at `index`.
    pub fn get_driver(index: usize) -> Result<Driver> {
        drivers()
            .get(index)
            .cloned()
            .ok_or_else(|| GeoError::UnknownDriver(format!("#{index}")))
    }

    /// Get one [`Driver`] by its short name, compared case-insensitively.
    pub fn get_driver_by_name(name: &str) -> Result<Driver> {
        drivers()
            .iter()
            .find(|d| d.short_name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| GeoError::UnknownDriver(name.to_string()))
    }

    /// Short names of all registered drivers, in probing order.
    pub fn driver_names() -> Vec<String> {
        drivers().iter().map(|d| d.short_name.clone()).collect()
    }

    /// Register a driver, replacing any driver with the same short name.
    pub fn register_driver(driver: Driver) {
        let mut drivers = drivers();
        let driver = describe(driver);
        match drivers
            .iter_mut()
            .find(|d| d.short_name.eq_ignore_ascii_case(&driver.short_name))
        {
            Some(slot) => *slot = driver,
            None => drivers.push(driver),
        }
    }

    /// Remove the driver called `name`; returns `false` if it was not registered.
    pub fn deregister_driver(name: &str) -> bool {
        let mut drivers = drivers();
        let before = drivers.len();
        drivers.retain(|d| !d.short_name.eq_ignore_ascii_case(name));
        drivers.len() != before
    }

    /// Get a driver able to create a dataset named `filename`, based on its
    /// extension.
    pub fn get_output_driver_for_dataset_name<P: AsRef<Path>>(
        filename: P,
        capability: DriverCapabilities,
    ) -> Option<Driver> {
        let ext = filename.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        drivers()
            .iter()
            .filter(|d| d.has_capability(capability | DriverCapabilities::CREATE))
            .find(|d| d.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            .cloned()
    }

    /// Find the driver able to open `path`.
    ///
    /// `allowed_drivers` restricts the candidates by short name; the
    /// [`OpenFlags::RASTER`] and [`OpenFlags::VECTOR`] flags restrict them by
    /// kind.
    pub fn identify<P: AsRef<Path>>(
        path: P,
        allowed_drivers: Option<&[&str]>,
        flags: OpenFlags,
    ) -> Result<Driver> {
        let path = path.as_ref();
        let open_failed = |msg: String| GeoError::OpenFailed {
            path: path.display().to_string(),
            msg,
        };
        let mut header = Vec::with_capacity(HEADER_SIZE);
        File::open(path)
            .and_then(|f| f.take(HEADER_SIZE as u64).read_to_end(&mut header))
            .map_err(|e| open_failed(e.to_string()))?;

        let mut kinds = DriverCapabilities::empty();
        if flags.contains(OpenFlags::RASTER) {
            kinds |= DriverCapabilities::RASTER;
        }
        if flags.contains(OpenFlags::VECTOR) {
            kinds |= DriverCapabilities::VECTOR;
        }

        let driver = drivers()
            .iter()
            .filter(|d| {
                allowed_drivers.map_or(true, |allowed| {
                    allowed.iter().any(|a| a.eq_ignore_ascii_case(&d.short_name))
                })
            })
            .filter(|d| kinds.is_empty() || d.capabilities.intersects(kinds))
            .find(|d| d.probe(path, &header))
            .cloned();
        match driver {
            Some(driver) => {
                debug!("'{}' identified as {}", path.display(), driver.short_name);
                Ok(driver)
            }
            None => Err(open_failed(
                "not recognized as being in a supported file format".to_string(),
            )),
        }
    }

    /// Delete the dataset at `path`, identifying its driver first.
    pub fn delete_dataset<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let driver = DriverManager::identify(path, None, OpenFlags::default())?;
        driver.delete(path)
    }
}
