use std::path::PathBuf;

use thiserror::Error;
use updraft_loader::LoaderError;
use updraft_net::NetError;
use updraft_store::StoreError;
use uuid::Uuid;

use crate::ConfigError;

#[derive(Debug, Error)]
pub enum UpdatesError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("network error: {0}")]
    Net(#[from] NetError),

    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no launchable update")]
    NoLaunchableUpdate,

    #[error("update {0} has no launch asset")]
    NoLaunchAsset(Uuid),

    #[error("update {update_id} is missing asset file {}", path.display())]
    MissingAssetFile { update_id: Uuid, path: PathBuf },

    #[error("launch task ended without a decision")]
    TaskAborted,
}

pub type UpdatesResult<T> = Result<T, UpdatesError>;
