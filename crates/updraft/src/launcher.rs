#![forbid(unsafe_code)]

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use updraft_core::Update;

use crate::{UpdatesError, UpdatesResult};

/// A launchable update with every asset resolved to a file on disk.
#[derive(Clone, Debug)]
pub struct Launcher {
    update: Update,
    launch_asset_path: Option<PathBuf>,
    asset_paths: BTreeMap<String, PathBuf>,
}

impl Launcher {
    /// Resolve `update`'s assets inside `updates_dir`.
    ///
    /// Development updates fetch their code at runtime and resolve to no
    /// files.
    ///
    /// # Errors
    ///
    /// [`UpdatesError::NoLaunchAsset`] when the manifest names no launch
    /// asset, [`UpdatesError::MissingAssetFile`] when a file is not on disk.
    pub fn new(update: Update, updates_dir: &Path) -> UpdatesResult<Self> {
        if update.is_development() {
            return Ok(Self {
                update,
                launch_asset_path: None,
                asset_paths: BTreeMap::new(),
            });
        }

        if update.launch_asset().is_none() {
            return Err(UpdatesError::NoLaunchAsset(update.update_id));
        }

        let mut asset_paths = BTreeMap::new();
        let mut launch_asset_path = None;
        for asset in &update.assets {
            let path = updates_dir.join(&asset.filename);
            if !path.is_file() {
                return Err(UpdatesError::MissingAssetFile {
                    update_id: update.update_id,
                    path,
                });
            }
            if asset.is_launch_asset {
                launch_asset_path = Some(path.clone());
            }
            asset_paths.insert(asset.key.clone(), path);
        }

        Ok(Self {
            update,
            launch_asset_path,
            asset_paths,
        })
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    /// `None` for development updates.
    pub fn launch_asset_path(&self) -> Option<&Path> {
        self.launch_asset_path.as_deref()
    }

    pub fn asset_path(&self, key: &str) -> Option<&Path> {
        self.asset_paths.get(key).map(PathBuf::as_path)
    }

    pub fn asset_paths(&self) -> &BTreeMap<String, PathBuf> {
        &self.asset_paths
    }
}
