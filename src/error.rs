//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure is fatal to the current run; nothing here is retried.
#[derive(Error, Debug)]
pub enum Error {
    /// A key that is not part of the parameter schema, at any nesting level.
    #[error("Unrecognized parameter key `{key}`")]
    ConfigValidation { key: String },

    /// A recognized key carrying a value outside its allowed domain.
    #[error("Invalid value for parameter `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Classifier output that cannot be trusted (ragged ranks, conflicting ids, ...).
    #[error("{}:{line}: {reason}", .path.display())]
    ParseIntegrity {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The attribute mapping would fall out of sync with the matrix rows.
    #[error("Attribute mapping inconsistency: {0}")]
    ReconciliationConsistency(String),

    /// A command (or any stage of a piped command) exited non-zero.
    #[error("Command `{command}` exited with return code `{code}`: {stderr}")]
    ExternalProcess {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn parse_integrity(path: &std::path::Path, line: usize, reason: impl Into<String>) -> Self {
        Error::ParseIntegrity {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }
}
