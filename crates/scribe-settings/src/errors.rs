//! Failures raised while building [`ScribeSettings`](crate::ScribeSettings).

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A settings file that could not be used, or a value the service refuses.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was being opened.
        path: PathBuf,
        /// Underlying filesystem failure.
        source: std::io::Error,
    },
    /// The file is not JSON, or does not fit the settings schema.
    #[error("{} does not hold valid settings: {source}", path.display())]
    Parse {
        /// File whose contents were rejected.
        path: PathBuf,
        /// Decoder failure, including unknown enum values.
        source: serde_json::Error,
    },
    /// A value parsed but falls outside what the service accepts.
    #[error("{field} {reason}")]
    OutOfRange {
        /// camelCase key of the offending value, e.g. `scheduler.cacheCapacity`.
        field: &'static str,
        /// Human-readable bound that was violated.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read { path: path.to_path_buf(), source }
    }

    pub(crate) fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::Parse { path: path.to_path_buf(), source }
    }

    pub(crate) fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange { field, reason: reason.into() }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
