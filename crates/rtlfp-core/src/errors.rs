//! Error types for the fingerprint core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

/// Top-level error enum for the fingerprint core library.
///
/// Only conditions that make a run meaningless end up here. Unresolved
/// references, non-linear index expressions and empty query endpoints are
/// ordinary results, not errors.
#[derive(Debug, thiserror::Error)]
pub enum RtlfpError {
    #[error("Frontend error ({path}): {message}")]
    Frontend { path: String, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RtlfpError {
    pub fn frontend(path: impl Into<String>, message: impl Into<String>) -> Self {
        RtlfpError::Frontend {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(feature = "python")]
impl From<RtlfpError> for PyErr {
    fn from(err: RtlfpError) -> PyErr {
        match &err {
            RtlfpError::Frontend { .. } => PyRuntimeError::new_err(err.to_string()),
            RtlfpError::Config(_) => PyValueError::new_err(err.to_string()),
            RtlfpError::Io(_) => PyIOError::new_err(err.to_string()),
            RtlfpError::Json(_) => PyValueError::new_err(err.to_string()),
        }
    }
}

pub type RtlfpResult<T> = Result<T, RtlfpError>;
