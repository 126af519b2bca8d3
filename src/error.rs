use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by preference reads and writes.
///
/// Store read failures never surface here; the resolver logs them and
/// treats the key as missing.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("missing required value for {parameter} (pass a value or use --clear-session)")]
    MissingValue { parameter: String },

    #[error("--session-only and --skip-session cannot be combined")]
    ConflictingScope,

    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),

    #[error("invalid value stored for {name}: {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("preference store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("preference store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PreferenceResult<T> = std::result::Result<T, PreferenceError>;
