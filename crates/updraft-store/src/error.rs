#![forbid(unsafe_code)]

use thiserror::Error;
use updraft_storage::StorageError;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("update {0} not found")]
    UpdateNotFound(Uuid),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type StoreResult<T> = Result<T, StoreError>;
