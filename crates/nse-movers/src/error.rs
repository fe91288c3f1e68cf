//! Error taxonomy for acquisition, loading and analysis.

use std::path::PathBuf;
use std::time::Duration;

use polars::prelude::PolarsError;

/// Failures raised by a browser session.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("Browser init failed: {0}")]
    Init(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element {locator} not clickable after {timeout:?}")]
    ElementTimeout { locator: String, timeout: Duration },

    #[error("Element {0} detached before click")]
    StaleElement(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

/// Coarse classification of an [`AcquisitionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionErrorKind {
    DriverInit,
    Navigation,
    DownloadControlNotFound,
    FileNotDownloaded,
    Unexpected,
}

/// Terminal failure of one acquisition run.
#[derive(thiserror::Error, Debug)]
pub enum AcquisitionError {
    #[error("Browser could not be started: {0}")]
    DriverInit(String),

    #[error("Could not load source page: {0}")]
    Navigation(String),

    #[error("Download control {locator} not found or not clickable within {timeout:?}")]
    DownloadControlNotFound { locator: String, timeout: Duration },

    #[error("No *.{extension} file appeared in {}", dir.display())]
    FileNotDownloaded { dir: PathBuf, extension: String },

    #[error("Unexpected acquisition failure: {0}")]
    Unexpected(String),
}

impl AcquisitionError {
    pub fn kind(&self) -> AcquisitionErrorKind {
        match self {
            AcquisitionError::DriverInit(_) => AcquisitionErrorKind::DriverInit,
            AcquisitionError::Navigation(_) => AcquisitionErrorKind::Navigation,
            AcquisitionError::DownloadControlNotFound { .. } => {
                AcquisitionErrorKind::DownloadControlNotFound
            }
            AcquisitionError::FileNotDownloaded { .. } => AcquisitionErrorKind::FileNotDownloaded,
            AcquisitionError::Unexpected(_) => AcquisitionErrorKind::Unexpected,
        }
    }
}

/// Failures while reading the downloaded table.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Polars(#[from] PolarsError),
}

/// Per-query analysis failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Data not loaded")]
    NotLoaded,

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Query evaluation failed: {0}")]
    Compute(String),
}

impl From<PolarsError> for AnalysisError {
    fn from(e: PolarsError) -> Self {
        AnalysisError::Compute(e.to_string())
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
pub type AcquisitionResult<T> = Result<T, AcquisitionError>;
pub type LoadResult<T> = Result<T, LoadError>;
pub type AnalysisResult<T> = Result<T, AnalysisError>;
