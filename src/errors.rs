use std::fmt::{Display, Formatter};
use std::path::Path;

use thiserror::Error;

/// Pipeline stage that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Opening or identifying a source dataset.
    Open,
    /// Validating options and binding them to the source.
    Resolve,
    /// Transforming pixels, geometries or field values.
    Transform,
    /// Creating or writing the destination.
    Write,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Open => "open",
            Stage::Resolve => "resolve",
            Stage::Transform => "transform",
            Stage::Write => "write",
        })
    }
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Unable to open '{path}': {msg}")]
    OpenFailed { path: String, msg: String },
    #[error("Conflicting options: {0}")]
    ConflictingOption(String),
    #[error("Invalid value for option '{option}': {msg}")]
    InvalidOption { option: &'static str, msg: String },
    #[error("Field '{field}' does not exist in '{layer}'")]
    UnknownField { field: String, layer: String },
    #[error("Destination '{0}' already exists")]
    DestinationExists(String),
    #[error("Unable to create '{path}': {msg}")]
    CreateFailed { path: String, msg: String },
    #[error("Unable to write '{path}': {msg}")]
    WriteFailed { path: String, msg: String },
    #[error("Coordinate transformation failed: {0}")]
    TransformFailed(String),
    #[error("Translation failed during {stage} of {context}: {source}")]
    TranslationFailed {
        stage: Stage,
        context: String,
        #[source]
        source: Box<GeoError>,
    },
    #[error("Operation cancelled while processing {0}")]
    Cancelled(String),
    #[error("Driver '{0}' is not registered")]
    UnknownDriver(String),
    #[error("Layer '{0}' not found")]
    LayerNotFound(String),
    #[error("Feature {fid} not found in layer '{layer}'")]
    FeatureNotFound { fid: u64, layer: String },
    #[error("Invalid band index {index}: dataset has {count} band(s)")]
    InvalidBandIndex { index: usize, count: usize },
    #[error("Invalid field name '{field_name}' in method '{method_name}'")]
    InvalidFieldName {
        field_name: String,
        method_name: &'static str,
    },
    #[error("SQL error at position {position}: {msg}")]
    SqlError { position: usize, msg: String },
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[cfg(feature = "ndarray")]
    #[error(transparent)]
    NdarrayShapeError(#[from] ndarray::ShapeError),
}

/// A wrapper for errors returned by this crate.
pub type Result<T> = std::result::Result<T, GeoError>;

impl GeoError {
    /// The pipeline stage this error originated in.
    pub fn stage(&self) -> Stage {
        match self {
            GeoError::OpenFailed { .. } | GeoError::UnknownDriver(_) => Stage::Open,
            GeoError::ConflictingOption(_)
            | GeoError::InvalidOption { .. }
            | GeoError::UnknownField { .. }
            | GeoError::LayerNotFound(_)
            | GeoError::FeatureNotFound { .. }
            | GeoError::InvalidBandIndex { .. }
            | GeoError::InvalidFieldName { .. }
            | GeoError::SqlError { .. }
            | GeoError::BadArgument(_) => Stage::Resolve,
            #[cfg(feature = "ndarray")]
            GeoError::NdarrayShapeError(_) => Stage::Resolve,
            GeoError::TransformFailed(_) => Stage::Transform,
            GeoError::DestinationExists(_)
            | GeoError::CreateFailed { .. }
            | GeoError::WriteFailed { .. } => Stage::Write,
            GeoError::TranslationFailed { stage, .. } => *stage,
            GeoError::Cancelled(_) => Stage::Write,
        }
    }

    /// Wraps `self` with the stage and the item (band, feature) being processed.
    pub(crate) fn in_translation(self, stage: Stage, context: impl Into<String>) -> GeoError {
        match self {
            e @ GeoError::Cancelled(_) => e,
            e => GeoError::TranslationFailed {
                stage,
                context: context.into(),
                source: Box::new(e),
            },
        }
    }

    /// The innermost error, looking through `TranslationFailed` wrappers.
    pub fn root_cause(&self) -> &GeoError {
        match self {
            GeoError::TranslationFailed { source, .. } => source.root_cause(),
            e => e,
        }
    }
}

/// Adds path context to errors coming from format libraries.
pub(crate) trait PathErrorExt<T> {
    fn with_open_context(self, path: &Path) -> Result<T>;
    fn with_write_context(self, path: &Path) -> Result<T>;
}

impl<T, E: Display> PathErrorExt<T> for std::result::Result<T, E> {
    fn with_open_context(self, path: &Path) -> Result<T> {
        self.map_err(|e| GeoError::OpenFailed {
            path: path.display().to_string(),
            msg: e.to_string(),
        })
    }

    fn with_write_context(self, path: &Path) -> Result<T> {
        self.map_err(|e| GeoError::WriteFailed {
            path: path.display().to_string(),
            msg: e.to_string(),
        })
    }
}
