#![forbid(unsafe_code)]

use std::{io::Read, path::Path};

use async_trait::async_trait;
use chrono::Utc;
use updraft_core::{Asset, Sha256Base64Url};
use updraft_protocol::UpdateResponse;

use crate::LoaderResult;

/// Source-specific half of a load: where the response and asset bytes come
/// from. The shared bookkeeping lives in [`crate::AppLoader`].
#[async_trait]
pub trait LoaderStrategy: Send + Sync {
    /// Short name for logs and events.
    fn name(&self) -> &'static str;

    /// Obtain the response whose manifest (if any) will be loaded.
    async fn load_update_response(&self) -> LoaderResult<UpdateResponse>;

    /// Place `asset` at `updates_dir/<filename>` and return it with
    /// `content_hash` and `download_time` filled in.
    async fn download_asset(&self, asset: Asset, updates_dir: &Path) -> LoaderResult<Asset>;

    /// Re-derive the hash of an asset the store no longer links.
    ///
    /// Assumes the file on disk still holds the content for `asset.key`.
    async fn rehash_existing(&self, asset: Asset, updates_dir: &Path) -> LoaderResult<Asset> {
        let path = updates_dir.join(&asset.filename);
        let hash = tokio::task::spawn_blocking(move || hash_file(&path)).await??;
        Ok(resolved(asset, hash))
    }
}

/// Fill in the fields set once an asset's bytes are known.
pub(crate) fn resolved(mut asset: Asset, hash: String) -> Asset {
    asset.content_hash = Some(hash);
    asset.download_time = Some(Utc::now());
    asset
}

pub(crate) fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256Base64Url::new();
    let mut buf = vec![0_u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}
