//! Error types for effect persistence

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an [`EffectStore`](super::EffectStore) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create data directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read effect file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write effect file {path}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse effect file {path}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported effect file version {found} in {path} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("failed to encode effects")]
    Encode(#[from] serde_json::Error),

    #[error("persistence writer has shut down")]
    WriterClosed,

    /// A backend-specific failure with no richer source.
    #[error("storage backend error: {0}")]
    Backend(String),
}
