use thiserror::Error;

/// Result type used by `updraft-storage`.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by storage primitives.
///
/// Higher-level crates wrap this error to add domain context (asset key, URL, etc.).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage operation failed: {0}")]
    Failed(String),
}
