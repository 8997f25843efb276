#![forbid(unsafe_code)]

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use updraft_core::{Asset, HeaderDictionary, Update, UpdateStatus};
use updraft_storage::AtomicFile;
use uuid::Uuid;

use crate::{StoreError, StoreResult, UpdatesStore};

const SNAPSHOT_VERSION: u32 = 1;
const FAILED_LAUNCH_WINDOW_HOURS: i64 = 24;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredUpdate {
    /// Update row; `assets` is always empty here.
    update: Update,
    declared_keys: Vec<String>,
    launch_asset_key: Option<String>,
    linked: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ScopeData {
    #[serde(default)]
    server_defined_headers: Option<HeaderDictionary>,
    #[serde(default)]
    manifest_filters: Option<HeaderDictionary>,
    #[serde(default)]
    extra_client_params: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FailedLaunch {
    update_id: Uuid,
    at: DateTime<Utc>,
}

/// On-disk snapshot. Private so the JSON layout stays an internal detail.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    version: u32,
    #[serde(default)]
    updates: BTreeMap<Uuid, StoredUpdate>,
    #[serde(default)]
    assets: BTreeMap<String, Asset>,
    #[serde(default)]
    scopes: BTreeMap<String, ScopeData>,
    #[serde(default)]
    failed_launches: Vec<FailedLaunch>,
}

impl StoreSnapshot {
    fn assemble(&self, stored: &StoredUpdate) -> Update {
        let mut update = stored.update.clone();
        update.assets = stored
            .declared_keys
            .iter()
            .filter(|key| stored.linked.contains(*key))
            .filter_map(|key| self.assets.get(key))
            .map(|asset| {
                let mut asset = asset.clone();
                asset.is_launch_asset = stored.launch_asset_key.as_deref() == Some(&asset.key);
                asset
            })
            .collect();
        update
    }

    fn stored_mut(&mut self, update_id: Uuid) -> StoreResult<&mut StoredUpdate> {
        self.updates
            .get_mut(&update_id)
            .ok_or(StoreError::UpdateNotFound(update_id))
    }
}

/// [`UpdatesStore`] held in memory, optionally snapshotted to a JSON file.
///
/// Every mutation rewrites the snapshot through [`AtomicFile`], so a crash
/// leaves either the previous or the new state on disk.
pub struct LocalStore {
    state: Mutex<StoreSnapshot>,
    file: Option<AtomicFile>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(StoreSnapshot {
                version: SNAPSHOT_VERSION,
                ..StoreSnapshot::default()
            }),
            file: None,
        }
    }

    /// Open a snapshot-backed store.
    ///
    /// A missing file starts empty. An unreadable snapshot is logged and
    /// replaced by an empty store.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let file = AtomicFile::new(path);
        let snapshot = match file.read()? {
            None => StoreSnapshot::default(),
            Some(bytes) if bytes.is_empty() => StoreSnapshot::default(),
            Some(bytes) => match serde_json::from_slice::<StoreSnapshot>(&bytes) {
                Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => snapshot,
                Ok(snapshot) => {
                    tracing::warn!(version = snapshot.version, "discarding store snapshot with unknown version");
                    StoreSnapshot::default()
                }
                Err(e) => {
                    tracing::warn!(path = %file.path().display(), error = %e, "discarding corrupt store snapshot");
                    StoreSnapshot::default()
                }
            },
        };

        Ok(Self {
            state: Mutex::new(StoreSnapshot {
                version: SNAPSHOT_VERSION,
                ..snapshot
            }),
            file: Some(file),
        })
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut StoreSnapshot) -> StoreResult<T>) -> StoreResult<T> {
        let mut state = self.state.lock();
        let out = f(&mut state)?;
        if let Some(file) = &self.file {
            let bytes = serde_json::to_vec(&*state)?;
            file.write_all(&bytes)?;
        }
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&StoreSnapshot) -> T) -> T {
        f(&self.state.lock())
    }
}

impl UpdatesStore for LocalStore {
    fn insert_update(&self, update: &Update) -> StoreResult<()> {
        self.mutate(|state| {
            let mut row = update.clone();
            row.assets.clear();
            let linked = state
                .updates
                .get(&update.update_id)
                .map(|existing| existing.linked.clone())
                .unwrap_or_default();
            state.updates.insert(
                update.update_id,
                StoredUpdate {
                    update: row,
                    declared_keys: update.assets.iter().map(|a| a.key.clone()).collect(),
                    launch_asset_key: update.launch_asset().map(|a| a.key.clone()),
                    linked,
                },
            );
            tracing::debug!(update_id = %update.update_id, status = ?update.status, "update inserted");
            Ok(())
        })
    }

    fn find_update(&self, update_id: Uuid) -> StoreResult<Option<Update>> {
        Ok(self.read(|state| {
            state
                .updates
                .get(&update_id)
                .map(|stored| state.assemble(stored))
        }))
    }

    fn mark_update_ready(&self, update_id: Uuid) -> StoreResult<()> {
        self.mutate(|state| {
            let stored = state.stored_mut(update_id)?;
            if stored.update.status != UpdateStatus::Development {
                stored.update.status = UpdateStatus::Ready;
            }
            Ok(())
        })
    }

    fn set_scope_key(&self, update_id: Uuid, scope_key: &str) -> StoreResult<()> {
        self.mutate(|state| {
            state.stored_mut(update_id)?.update.scope_key = scope_key.to_string();
            Ok(())
        })
    }

    fn set_update_commit_time(
        &self,
        update_id: Uuid,
        commit_time: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.mutate(|state| {
            state.stored_mut(update_id)?.update.commit_time = commit_time;
            Ok(())
        })
    }

    fn find_asset(&self, key: &str) -> StoreResult<Option<Asset>> {
        Ok(self.read(|state| state.assets.get(key).cloned()))
    }

    fn merge_asset_fields(&self, declared: &Asset, existing: &Asset) -> StoreResult<Asset> {
        self.mutate(|state| {
            let mut merged = state
                .assets
                .get(&existing.key)
                .cloned()
                .unwrap_or_else(|| existing.clone());
            merged.merge_declared(declared);
            state.assets.insert(merged.key.clone(), merged.clone());
            Ok(merged)
        })
    }

    fn link_existing_asset(&self, asset: &Asset, update_id: Uuid) -> StoreResult<bool> {
        self.mutate(|state| {
            if !state.assets.contains_key(&asset.key) {
                return Ok(false);
            }
            let stored = state.stored_mut(update_id)?;
            if !stored.declared_keys.contains(&asset.key) {
                stored.declared_keys.push(asset.key.clone());
            }
            stored.linked.insert(asset.key.clone());
            Ok(true)
        })
    }

    fn insert_new_assets(&self, assets: &[Asset], update_id: Uuid) -> StoreResult<()> {
        self.mutate(|state| {
            state.stored_mut(update_id)?;
            for asset in assets {
                state.assets.insert(asset.key.clone(), asset.clone());
            }
            let stored = state.stored_mut(update_id)?;
            for asset in assets {
                if !stored.declared_keys.contains(&asset.key) {
                    stored.declared_keys.push(asset.key.clone());
                }
                stored.linked.insert(asset.key.clone());
            }
            Ok(())
        })
    }

    fn server_defined_headers(&self, scope_key: &str) -> StoreResult<Option<HeaderDictionary>> {
        Ok(self.read(|state| {
            state
                .scopes
                .get(scope_key)
                .and_then(|s| s.server_defined_headers.clone())
        }))
    }

    fn manifest_filters(&self, scope_key: &str) -> StoreResult<Option<HeaderDictionary>> {
        Ok(self.read(|state| {
            state
                .scopes
                .get(scope_key)
                .and_then(|s| s.manifest_filters.clone())
        }))
    }

    fn set_metadata(
        &self,
        scope_key: &str,
        server_defined_headers: Option<&HeaderDictionary>,
        manifest_filters: Option<&HeaderDictionary>,
    ) -> StoreResult<()> {
        if server_defined_headers.is_none() && manifest_filters.is_none() {
            return Ok(());
        }
        self.mutate(|state| {
            let scope = state.scopes.entry(scope_key.to_string()).or_default();
            if let Some(headers) = server_defined_headers {
                scope.server_defined_headers = Some(headers.clone());
            }
            if let Some(filters) = manifest_filters {
                scope.manifest_filters = Some(filters.clone());
            }
            Ok(())
        })
    }

    fn extra_client_params(&self, scope_key: &str) -> StoreResult<BTreeMap<String, String>> {
        Ok(self.read(|state| {
            state
                .scopes
                .get(scope_key)
                .map(|s| s.extra_client_params.clone())
                .unwrap_or_default()
        }))
    }

    fn set_extra_client_param(
        &self,
        scope_key: &str,
        key: &str,
        value: Option<&str>,
    ) -> StoreResult<()> {
        self.mutate(|state| {
            let params = &mut state
                .scopes
                .entry(scope_key.to_string())
                .or_default()
                .extra_client_params;
            match value {
                Some(value) => params.insert(key.to_string(), value.to_string()),
                None => params.remove(key),
            };
            Ok(())
        })
    }

    fn record_failed_launch(&self, update_id: Uuid) -> StoreResult<()> {
        self.mutate(|state| {
            let now = Utc::now();
            state
                .failed_launches
                .retain(|f| now - f.at < Duration::hours(FAILED_LAUNCH_WINDOW_HOURS));
            state.failed_launches.push(FailedLaunch { update_id, at: now });
            Ok(())
        })
    }

    fn recent_failed_update_ids(&self) -> StoreResult<Vec<Uuid>> {
        let cutoff = Utc::now() - Duration::hours(FAILED_LAUNCH_WINDOW_HOURS);
        Ok(self.read(|state| {
            let mut ids: Vec<Uuid> = Vec::new();
            for failed in state.failed_launches.iter().filter(|f| f.at > cutoff) {
                if !ids.contains(&failed.update_id) {
                    ids.push(failed.update_id);
                }
            }
            ids
        }))
    }

    fn all_updates(&self) -> StoreResult<Vec<Update>> {
        Ok(self.read(|state| {
            state
                .updates
                .values()
                .map(|stored| state.assemble(stored))
                .collect()
        }))
    }

    fn launchable_updates(&self, scope_key: &str) -> StoreResult<Vec<Update>> {
        Ok(self.read(|state| {
            state
                .updates
                .values()
                .filter(|s| s.update.scope_key == scope_key && s.update.status.is_launchable())
                .map(|stored| state.assemble(stored))
                .collect()
        }))
    }

    fn delete_updates(&self, update_ids: &[Uuid]) -> StoreResult<()> {
        if update_ids.is_empty() {
            return Ok(());
        }
        self.mutate(|state| {
            for id in update_ids {
                if state.updates.remove(id).is_some() {
                    tracing::debug!(update_id = %id, "update deleted");
                }
            }
            Ok(())
        })
    }

    fn delete_unused_assets(&self) -> StoreResult<Vec<Asset>> {
        self.mutate(|state| {
            let used: BTreeSet<&String> =
                state.updates.values().flat_map(|s| s.linked.iter()).collect();
            let unused: Vec<String> = state
                .assets
                .keys()
                .filter(|key| !used.contains(key))
                .cloned()
                .collect();
            Ok(unused
                .into_iter()
                .filter_map(|key| state.assets.remove(&key))
                .collect())
        })
    }
}
