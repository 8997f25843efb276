#![forbid(unsafe_code)]

use thiserror::Error;
use updraft_net::NetError;
use updraft_protocol::ProtocolError;
use updraft_storage::StorageError;
use updraft_store::StoreError;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("network error: {0}")]
    Net(#[from] NetError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("asset hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("failed to write asset file: {0}")]
    FileWrite(#[source] StorageError),

    #[error("asset {0} has no URL")]
    MissingAssetUrl(String),

    #[error("embedded bundle has no file {0}")]
    EmbeddedAssetMissing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not all assets loaded: {errored} of {total} failed")]
    NotAllAssetsLoaded { errored: usize, total: usize },

    #[error("loader task failed: {0}")]
    Join(String),
}

pub type LoaderResult<T> = Result<T, LoaderError>;

impl From<tokio::task::JoinError> for LoaderError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}
