#![forbid(unsafe_code)]

use std::path::Path;

use updraft_core::{HeaderDictionary, Update};
use updraft_storage::AtomicFile;
use uuid::Uuid;

use crate::{SelectionPolicy, StoreResult, UpdatesStore};

/// Outcome of one reaping pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub updates_deleted: usize,
    pub files_deleted: usize,
}

/// Removes superseded updates and the asset files nothing references.
///
/// Runs after a launch decision is final. Only updates in the launched
/// update's scope are considered, and `protected` ids (the embedded update)
/// are never deleted. File deletion is best-effort: a failure is logged and
/// the pass continues with the remaining files.
pub struct Reaper;

impl Reaper {
    pub fn reap(
        store: &dyn UpdatesStore,
        policy: &dyn SelectionPolicy,
        updates_dir: &Path,
        launched: &Update,
        filters: Option<&HeaderDictionary>,
        protected: &[Uuid],
    ) -> StoreResult<ReapReport> {
        let mut updates = store.all_updates()?;
        updates.retain(|u| {
            u.scope_key == launched.scope_key && !protected.contains(&u.update_id)
        });
        let to_delete = policy.select_updates_to_delete(&updates, launched, filters);
        store.delete_updates(&to_delete)?;

        let mut report = ReapReport {
            updates_deleted: to_delete.len(),
            files_deleted: 0,
        };

        for asset in store.delete_unused_assets()? {
            match AtomicFile::new(updates_dir.join(&asset.filename)).remove() {
                Ok(true) => report.files_deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(filename = %asset.filename, error = %e, "failed to delete unused asset file");
                }
            }
        }

        tracing::info!(
            updates = report.updates_deleted,
            files = report.files_deleted,
            "reaped unused updates"
        );
        Ok(report)
    }
}
