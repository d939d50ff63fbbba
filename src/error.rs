//! Error types for the provider store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`crate::store::ProviderStore`] operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// A profile is missing one or more required fields
    #[error("invalid provider configuration: missing {}", missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// The referenced provider key is not in the store
    #[error("provider '{key}' not found")]
    NotFound { key: String },

    /// Reading or writing the store file failed
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize providers config: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short category label used when reporting the error to the user
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not found",
            Self::Io { .. } | Self::Serialize(_) => "save failed",
        }
    }
}
