use std::path::{Path, PathBuf};

use crate::Dataset;

/// Where a translation writes its output: a path to create or open, or an
/// already open dataset that is handed over to the translation.
#[derive(Debug)]
pub enum DatasetDestination {
    Path(PathBuf),
    Dataset(Dataset),
}

impl From<&str> for DatasetDestination {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl From<&Path> for DatasetDestination {
    fn from(path: &Path) -> Self {
        Self::path(path)
    }
}

impl From<PathBuf> for DatasetDestination {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Dataset> for DatasetDestination {
    fn from(dataset: Dataset) -> Self {
        Self::dataset(dataset)
    }
}

impl DatasetDestination {
    pub fn dataset(dataset: Dataset) -> Self {
        Self::Dataset(dataset)
    }

    pub fn path<P: AsRef<Path>>(path: P) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    /// Target path, `None` for an in-memory dataset.
    pub fn target_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Dataset(dataset) => dataset.path(),
        }
    }

    /// Human readable name used in error messages.
    pub(crate) fn display_name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Dataset(dataset) => {
                use crate::Metadata;
                dataset.description()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DriverManager;

    #[test]
    fn test_destination_conversions() {
        let dest: DatasetDestination = "out.geojson".into();
        assert_eq!(dest.target_path(), Some(Path::new("out.geojson")));

        let driver = DriverManager::get_driver_by_name("MEM").unwrap();
        let dest: DatasetDestination = driver.create_vector_only("").unwrap().into();
        assert!(matches!(dest, DatasetDestination::Dataset(_)));
        assert_eq!(dest.target_path(), None);
    }
}
