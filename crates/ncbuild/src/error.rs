//! Errors that abort configuration.
//!
//! Only missing required dependencies and unusable inputs are errors.
//! Optional pieces (szip, the runtime version probe) degrade silently or
//! with a warning instead.

use std::path::PathBuf;

/// Fatal configuration error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("did not find HDF5 headers")]
    HdfNotFound,

    #[error("did not find HDF5 headers in {}", .0.display())]
    HdfNotFoundIn(PathBuf),

    #[error("HDF5 version >= {required} is required (found {found})")]
    HdfTooOld { required: &'static str, found: String },

    #[error("did not find netCDF version 4 headers")]
    NetcdfNotFound,

    #[error("did not find netCDF version 4 headers in {}", .0.display())]
    NetcdfNotFoundIn(PathBuf),

    #[error("invalid config file {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
