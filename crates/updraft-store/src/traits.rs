#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use updraft_core::{Asset, HeaderDictionary, Update};
use uuid::Uuid;

use crate::StoreResult;

/// Persistence for updates, assets and per-scope request metadata.
///
/// Asset entries are keyed by `Asset::key` and shared between updates. An
/// update lists the asset keys its manifest declared; `find_update` returns
/// only the ones that have been linked, in manifest order.
///
/// Methods are synchronous. Implementations serialize mutations internally
/// so the store can be shared behind an `Arc` by concurrent downloads.
pub trait UpdatesStore: Send + Sync {
    /// Record a parsed manifest. Its assets are declared, not yet linked.
    fn insert_update(&self, update: &Update) -> StoreResult<()>;

    fn find_update(&self, update_id: Uuid) -> StoreResult<Option<Update>>;

    /// Mark every asset of the update as present. `Development` updates keep
    /// their status; everything else becomes `Ready`.
    fn mark_update_ready(&self, update_id: Uuid) -> StoreResult<()>;

    fn set_scope_key(&self, update_id: Uuid, scope_key: &str) -> StoreResult<()>;

    fn set_update_commit_time(&self, update_id: Uuid, commit_time: DateTime<Utc>)
        -> StoreResult<()>;

    fn find_asset(&self, key: &str) -> StoreResult<Option<Asset>>;

    /// Merge manifest-declared fields of `declared` into the stored `existing`
    /// entry and persist it. Returns the merged entry.
    fn merge_asset_fields(&self, declared: &Asset, existing: &Asset) -> StoreResult<Asset>;

    /// Link an already stored asset to `update_id`.
    ///
    /// Returns `false` if no entry with that key exists.
    fn link_existing_asset(&self, asset: &Asset, update_id: Uuid) -> StoreResult<bool>;

    /// Store freshly resolved assets and link them to `update_id`.
    fn insert_new_assets(&self, assets: &[Asset], update_id: Uuid) -> StoreResult<()>;

    fn server_defined_headers(&self, scope_key: &str) -> StoreResult<Option<HeaderDictionary>>;

    fn manifest_filters(&self, scope_key: &str) -> StoreResult<Option<HeaderDictionary>>;

    /// Persist response header metadata. `None` values leave stored ones alone.
    fn set_metadata(
        &self,
        scope_key: &str,
        server_defined_headers: Option<&HeaderDictionary>,
        manifest_filters: Option<&HeaderDictionary>,
    ) -> StoreResult<()>;

    fn extra_client_params(&self, scope_key: &str) -> StoreResult<BTreeMap<String, String>>;

    /// Set or, with `None`, clear one extra client parameter.
    fn set_extra_client_param(
        &self,
        scope_key: &str,
        key: &str,
        value: Option<&str>,
    ) -> StoreResult<()>;

    fn record_failed_launch(&self, update_id: Uuid) -> StoreResult<()>;

    /// Updates that failed to launch within the last 24 hours, oldest first.
    fn recent_failed_update_ids(&self) -> StoreResult<Vec<Uuid>>;

    fn all_updates(&self) -> StoreResult<Vec<Update>>;

    /// Launchable updates in `scope_key`.
    fn launchable_updates(&self, scope_key: &str) -> StoreResult<Vec<Update>>;

    fn delete_updates(&self, update_ids: &[Uuid]) -> StoreResult<()>;

    /// Drop asset entries no update links to and return them.
    fn delete_unused_assets(&self) -> StoreResult<Vec<Asset>>;
}
