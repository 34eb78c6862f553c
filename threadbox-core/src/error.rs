//! Error kinds surfaced by the storage engine and dispatcher.
//!
//! Every variant carries enough context to render the one-sentence,
//! path-including message the dispatcher passes straight through as an error
//! payload (no wrapping, no stack traces).

use thiserror::Error;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid path: {reason} ({path:?})")]
    InvalidPath { path: String, reason: String },

    #[error("invalid name: {reason} ({name:?})")]
    InvalidName { name: String, reason: String },

    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("is a directory: {path}")]
    IsDirectory { path: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    #[error("unsupported operation on this node kind: {path}")]
    UnsupportedKind { path: String },

    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },

    #[error("failed to decode base64 content: {0}")]
    DecodeError(String),

    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("storage backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into(), reason: reason.into() }
    }

    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into(), reason: reason.into() }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn is_directory(path: impl Into<String>) -> Self {
        Self::IsDirectory { path: path.into() }
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory { path: path.into() }
    }

    pub fn unsupported_kind(path: impl Into<String>) -> Self {
        Self::UnsupportedKind { path: path.into() }
    }

    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation { reason: reason.into() }
    }
}
