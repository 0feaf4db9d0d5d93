//! Error types for rig-localizer

use std::path::PathBuf;

use thiserror::Error;

use crate::io::archive::{PlayerError, RecorderError};

/// Fatal run errors.
///
/// Per-observation anomalies (unresolved scans, rejected alignments,
/// non-converged fixes) are logged and counted, never returned here.
#[derive(Error, Debug)]
pub enum LocalizerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening, creating or reading a named file failed.
    #[error("cannot {action} {}: {source}", .path.display())]
    File {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reference map error: {0}")]
    Map(String),
}

impl From<PlayerError> for LocalizerError {
    fn from(e: PlayerError) -> Self {
        match e {
            PlayerError::Io(e) => LocalizerError::Io(e),
            PlayerError::Open { path, source } => LocalizerError::File {
                action: "open archive",
                path,
                source,
            },
            other => LocalizerError::Archive(other.to_string()),
        }
    }
}

impl From<RecorderError> for LocalizerError {
    fn from(e: RecorderError) -> Self {
        match e {
            RecorderError::Io(e) => LocalizerError::Io(e),
            RecorderError::Create { path, source } => LocalizerError::File {
                action: "create archive",
                path,
                source,
            },
            other => LocalizerError::Archive(other.to_string()),
        }
    }
}

impl From<basic_toml::Error> for LocalizerError {
    fn from(e: basic_toml::Error) -> Self {
        LocalizerError::Config(e.to_string())
    }
}

impl From<std::convert::Infallible> for LocalizerError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}

pub type Result<T> = std::result::Result<T, LocalizerError>;
