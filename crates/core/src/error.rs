//! Error types shared by the catalog and the saved design store.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Convenience alias used by store operations.
pub type Result<T> = std::result::Result<T, DesignError>;

/// Failures reported by design collection operations.
///
/// None of these are fatal: the caller logs or displays them and carries on.
#[derive(Debug, Error)]
pub enum DesignError {
    /// A saved design was submitted without a UUID.
    #[error("design \"{name}\" has a nil UUID")]
    NilUuid {
        /// Display name of the rejected design.
        name: String,
    },

    /// A key was asked to be placed before itself.
    #[error("cannot place {key} before itself")]
    SelfReference {
        /// Rendered form of the offending key.
        key: String,
    },

    /// The referenced key is not part of the collection.
    #[error("{key} is not in the collection")]
    NotFound {
        /// Rendered form of the missing key.
        key: String,
    },

    /// Filesystem access failed.
    #[error("I/O error on {path}: {source}", path = path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized for writing.
    #[error("failed to serialize design for {path}: {source}", path = path.display())]
    Serialize {
        /// Destination file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A record file could not be parsed.
    #[error("failed to parse {path}: {source}", path = path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The background load ended without delivering results.
    #[error("saved design load did not complete")]
    LoadFailed,
}

impl DesignError {
    pub(crate) fn self_reference(key: impl std::fmt::Display) -> Self {
        Self::SelfReference {
            key: key.to_string(),
        }
    }

    pub(crate) fn not_found(key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found_uuid(uuid: Uuid) -> Self {
        Self::not_found(format!("saved design {uuid}"))
    }
}
