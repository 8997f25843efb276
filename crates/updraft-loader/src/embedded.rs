#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use updraft_core::{Asset, Update, UpdateStatus, sha256_base64url};
use updraft_protocol::{ResponseHeaderData, UpdateResponse, parse_manifest};
use updraft_storage::AtomicFile;

use crate::{
    LoaderError, LoaderResult,
    strategy::{LoaderStrategy, hash_file, resolved},
};

/// Update shipped with the application: a directory holding `app.manifest`
/// and the asset files it names.
#[derive(Clone, Debug)]
pub struct EmbeddedBundle {
    dir: PathBuf,
}

impl EmbeddedBundle {
    pub const MANIFEST_FILENAME: &'static str = "app.manifest";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn asset_path(&self, asset: &Asset) -> PathBuf {
        self.dir.join(asset.bundle_filename())
    }

    /// Parse the bundled manifest. Embedded updates are trusted as shipped.
    pub fn read_manifest(&self, scope_key: &str) -> LoaderResult<Update> {
        let bytes = std::fs::read(self.dir.join(Self::MANIFEST_FILENAME))?;
        let mut update = parse_manifest(&bytes, scope_key)?;
        update.status = UpdateStatus::Embedded;
        update.is_verified = true;
        Ok(update)
    }
}

/// Loads the embedded update without network access.
pub struct EmbeddedStrategy {
    bundle: EmbeddedBundle,
    scope_key: String,
}

impl EmbeddedStrategy {
    pub fn new(bundle: EmbeddedBundle, scope_key: impl Into<String>) -> Self {
        Self {
            bundle,
            scope_key: scope_key.into(),
        }
    }

    fn copy_from_bundle(&self, asset: &Asset, dest: &Path) -> LoaderResult<String> {
        let source = self.bundle.asset_path(asset);
        let bytes = match std::fs::read(&source) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoaderError::EmbeddedAssetMissing(
                    source.display().to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        let hash = sha256_base64url(&bytes);
        AtomicFile::new(dest)
            .write_all(&bytes)
            .map_err(LoaderError::FileWrite)?;
        Ok(hash)
    }
}

#[async_trait]
impl LoaderStrategy for EmbeddedStrategy {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn load_update_response(&self) -> LoaderResult<UpdateResponse> {
        let bundle = self.bundle.clone();
        let scope_key = self.scope_key.clone();
        let update =
            tokio::task::spawn_blocking(move || bundle.read_manifest(&scope_key)).await??;
        Ok(UpdateResponse {
            header_data: ResponseHeaderData::default(),
            manifest_part: Some(update),
            directive_part: None,
        })
    }

    /// Copy the asset out of the bundle unless it is already in place.
    async fn download_asset(&self, asset: Asset, updates_dir: &Path) -> LoaderResult<Asset> {
        let dest = updates_dir.join(&asset.filename);
        let strategy = Self {
            bundle: self.bundle.clone(),
            scope_key: self.scope_key.clone(),
        };
        tokio::task::spawn_blocking(move || {
            let hash = if dest.is_file() {
                hash_file(&dest)?
            } else {
                strategy.copy_from_bundle(&asset, &dest)?
            };
            Ok(resolved(asset, hash))
        })
        .await?
    }

    async fn rehash_existing(&self, asset: Asset, updates_dir: &Path) -> LoaderResult<Asset> {
        let on_disk = updates_dir.join(&asset.filename);
        let in_bundle = self.bundle.asset_path(&asset);
        tokio::task::spawn_blocking(move || {
            let path = if on_disk.is_file() { on_disk } else { in_bundle };
            let hash = hash_file(&path)?;
            Ok(resolved(asset, hash))
        })
        .await?
    }
}
