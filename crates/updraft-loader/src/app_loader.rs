#![forbid(unsafe_code)]

//! Shared load state machine.
//!
//! A run obtains a response from its [`LoaderStrategy`], reconciles the
//! manifest with the store, resolves every asset concurrently and finalizes
//! once the last asset settles.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tokio::task::JoinSet;
use updraft_core::{Asset, Update, UpdateStatus};
use updraft_events::{EventBus, LoaderEvent};
use updraft_protocol::UpdateResponse;
use updraft_store::{StoreError, UpdatesStore};

use crate::{
    LoaderError, LoaderResult,
    state::{AssetOutcome, Partition, RunState},
    strategy::LoaderStrategy,
};

/// Owner predicate deciding whether a manifest should be loaded at all.
pub type Admission<'a> = &'a (dyn Fn(&Update) -> bool + Send + Sync);

/// Result of a successful run.
#[derive(Clone, Debug)]
pub struct LoadOutcome {
    /// Decoded server response, including header metadata and directives.
    pub response: UpdateResponse,
    /// The loaded update, `None` when there was no manifest or it was not
    /// admitted.
    pub update: Option<Update>,
}

/// Drives one strategy through the load state machine.
pub struct AppLoader {
    strategy: Arc<dyn LoaderStrategy>,
    store: Arc<dyn UpdatesStore>,
    updates_dir: PathBuf,
    fs_lock: Arc<tokio::sync::Mutex<()>>,
    bus: EventBus,
}

impl AppLoader {
    pub fn new(
        strategy: Arc<dyn LoaderStrategy>,
        store: Arc<dyn UpdatesStore>,
        updates_dir: impl Into<PathBuf>,
        bus: EventBus,
    ) -> Self {
        Self {
            strategy,
            store,
            updates_dir: updates_dir.into(),
            fs_lock: Arc::default(),
            bus,
        }
    }

    /// Share the file-existence lock with other loaders on the same directory.
    pub fn with_fs_lock(mut self, fs_lock: Arc<tokio::sync::Mutex<()>>) -> Self {
        self.fs_lock = fs_lock;
        self
    }

    pub fn updates_dir(&self) -> &Path {
        &self.updates_dir
    }

    /// Run the state machine once.
    ///
    /// # Errors
    ///
    /// Response errors from the strategy, any store failure, and
    /// [`LoaderError::NotAllAssetsLoaded`] when some asset could not be
    /// resolved. Assets resolved before the failure stay persisted.
    #[tracing::instrument(skip_all, fields(strategy = self.strategy.name()))]
    pub async fn load(&self, admission: Option<Admission<'_>>) -> LoaderResult<LoadOutcome> {
        self.bus.publish(LoaderEvent::Started {
            strategy: self.strategy.name(),
        });

        let result = self.run(admission).await;
        match &result {
            Ok(outcome) => {
                let update_id = outcome.update.as_ref().map(|u| u.update_id);
                tracing::info!(?update_id, "load finished");
                self.bus.publish(LoaderEvent::Finished { update_id });
            }
            Err(e) => {
                tracing::warn!(error = %e, "load failed");
                self.bus.publish(LoaderEvent::Failed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn run(&self, admission: Option<Admission<'_>>) -> LoaderResult<LoadOutcome> {
        let response = self.strategy.load_update_response().await?;
        let Some(manifest) = response.manifest_part.clone() else {
            return Ok(LoadOutcome {
                response,
                update: None,
            });
        };

        if let Some(admit) = admission {
            if !admit(&manifest) {
                tracing::info!(update_id = %manifest.update_id, "manifest not admitted");
                return Ok(LoadOutcome {
                    response,
                    update: None,
                });
            }
        }

        let update = self.process_manifest(manifest).await?;
        Ok(LoadOutcome {
            response,
            update: Some(update),
        })
    }

    async fn process_manifest(&self, manifest: Update) -> LoaderResult<Update> {
        let update_id = manifest.update_id;

        if manifest.is_development() {
            self.store.insert_update(&manifest)?;
            self.store.mark_update_ready(update_id)?;
            return self.reload(update_id);
        }

        match self.store.find_update(update_id)? {
            Some(existing) if existing.status == UpdateStatus::Ready => {
                tracing::debug!(%update_id, "update already ready");
                return Ok(existing);
            }
            Some(existing) => {
                if existing.scope_key != manifest.scope_key {
                    tracing::warn!(
                        %update_id,
                        stored = %existing.scope_key,
                        declared = %manifest.scope_key,
                        "stored update has a different scope key, overwriting"
                    );
                    self.store.set_scope_key(update_id, &manifest.scope_key)?;
                }
                tracing::debug!(%update_id, "resuming partially loaded update");
            }
            None => self.store.insert_update(&manifest)?,
        }

        let partition = self.resolve_assets(&manifest.assets).await?;
        self.finish(&manifest, partition).await
    }

    async fn resolve_assets(&self, assets: &[Asset]) -> LoaderResult<Partition> {
        let state = Arc::new(Mutex::new(RunState::new(assets)));
        let mut tasks = JoinSet::new();
        for asset in assets {
            let run = AssetRun {
                strategy: Arc::clone(&self.strategy),
                store: Arc::clone(&self.store),
                updates_dir: self.updates_dir.clone(),
                fs_lock: Arc::clone(&self.fs_lock),
                bus: self.bus.clone(),
                state: Arc::clone(&state),
            };
            let asset = asset.clone();
            tasks.spawn(async move { run.resolve(asset).await });
        }

        let mut partition = None;
        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Ok(Some(p)) => partition = Some(p),
                Ok(None) => {}
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        let mut state = state.lock();
        match partition.or_else(|| state.take_partition()) {
            Some(p) => Ok(p),
            None => Err(LoaderError::NotAllAssetsLoaded {
                errored: state.total(),
                total: state.total(),
            }),
        }
    }

    async fn finish(&self, manifest: &Update, partition: Partition) -> LoaderResult<Update> {
        let update_id = manifest.update_id;
        let Partition {
            existing,
            mut finished,
            mut errored,
        } = partition;

        for asset in existing {
            if self.store.link_existing_asset(&asset, update_id)? {
                continue;
            }
            tracing::warn!(asset_key = %asset.key, "existing asset is not in the store, rehashing");
            match self
                .strategy
                .rehash_existing(asset.clone(), &self.updates_dir)
                .await
            {
                Ok(rehashed) => finished.push(rehashed),
                Err(e) => {
                    tracing::warn!(asset_key = %asset.key, error = %e, "rehash failed");
                    errored.push(asset);
                }
            }
        }

        self.store.insert_new_assets(&finished, update_id)?;

        if !errored.is_empty() {
            return Err(LoaderError::NotAllAssetsLoaded {
                errored: errored.len(),
                total: manifest.assets.len(),
            });
        }

        self.store.mark_update_ready(update_id)?;
        self.reload(update_id)
    }

    fn reload(&self, update_id: uuid::Uuid) -> LoaderResult<Update> {
        self.store
            .find_update(update_id)?
            .ok_or_else(|| StoreError::UpdateNotFound(update_id).into())
    }
}

/// Everything one asset task needs, detached from the loader's lifetime.
struct AssetRun {
    strategy: Arc<dyn LoaderStrategy>,
    store: Arc<dyn UpdatesStore>,
    updates_dir: PathBuf,
    fs_lock: Arc<tokio::sync::Mutex<()>>,
    bus: EventBus,
    state: Arc<Mutex<RunState>>,
}

impl AssetRun {
    /// Resolve one asset. Returns the partition if this was the last one.
    async fn resolve(self, declared: Asset) -> LoaderResult<Option<Partition>> {
        let (asset, outcome) = match self.store.find_asset(&declared.key)? {
            Some(stored) if !stored.filename.is_empty() => {
                let merged = self.store.merge_asset_fields(&declared, &stored)?;
                if self.is_on_disk(&merged).await {
                    (merged, AssetOutcome::Existing)
                } else {
                    self.download(merged).await
                }
            }
            _ => self.download(declared).await,
        };

        let asset_key = asset.key.clone();
        let completion = self.state.lock().complete(asset, outcome);
        tracing::trace!(
            %asset_key,
            ?outcome,
            loaded = completion.loaded,
            total = completion.total,
            "asset settled"
        );
        self.bus.publish(LoaderEvent::AssetLoaded {
            asset_key,
            loaded: completion.loaded,
            total: completion.total,
        });
        self.bus.publish(LoaderEvent::Progress {
            fraction: completion.fraction,
        });
        Ok(completion.partition)
    }

    async fn is_on_disk(&self, asset: &Asset) -> bool {
        let _guard = self.fs_lock.lock().await;
        tokio::fs::try_exists(self.updates_dir.join(&asset.filename))
            .await
            .unwrap_or(false)
    }

    async fn download(&self, asset: Asset) -> (Asset, AssetOutcome) {
        match self
            .strategy
            .download_asset(asset.clone(), &self.updates_dir)
            .await
        {
            Ok(resolved) => (resolved, AssetOutcome::Finished),
            Err(e) => {
                tracing::warn!(asset_key = %asset.key, error = %e, "asset failed");
                (asset, AssetOutcome::Errored)
            }
        }
    }
}
