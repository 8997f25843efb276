#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use updraft_core::{HeaderDictionary, Update};
use uuid::Uuid;

/// Decides which stored update launches, which may be reaped, and whether a
/// freshly fetched manifest or directive should replace what is running.
pub trait SelectionPolicy: Send + Sync {
    fn select_update_to_launch<'a>(
        &self,
        updates: &'a [Update],
        filters: Option<&HeaderDictionary>,
    ) -> Option<&'a Update>;

    fn select_updates_to_delete(
        &self,
        updates: &[Update],
        launched: &Update,
        filters: Option<&HeaderDictionary>,
    ) -> Vec<Uuid>;

    fn should_load_new_update(
        &self,
        new_update: Option<&Update>,
        launched: Option<&Update>,
        filters: Option<&HeaderDictionary>,
    ) -> bool;

    fn should_load_rollback_directive(
        &self,
        directive_commit_time: DateTime<Utc>,
        embedded: Option<&Update>,
        launched: Option<&Update>,
        filters: Option<&HeaderDictionary>,
    ) -> bool;
}

/// Newest-commit-wins policy restricted to one runtime version and the
/// server's manifest filters.
#[derive(Clone, Debug)]
pub struct FilterAwarePolicy {
    runtime_version: String,
}

impl FilterAwarePolicy {
    pub fn new(runtime_version: impl Into<String>) -> Self {
        Self {
            runtime_version: runtime_version.into(),
        }
    }

    fn is_compatible(&self, update: &Update, filters: Option<&HeaderDictionary>) -> bool {
        update.runtime_version == self.runtime_version && matches_filters(update, filters)
    }
}

fn matches_filters(update: &Update, filters: Option<&HeaderDictionary>) -> bool {
    filters.map_or(true, |f| update.matches_filters(f))
}

impl SelectionPolicy for FilterAwarePolicy {
    fn select_update_to_launch<'a>(
        &self,
        updates: &'a [Update],
        filters: Option<&HeaderDictionary>,
    ) -> Option<&'a Update> {
        updates
            .iter()
            .filter(|u| self.is_compatible(u, filters))
            .max_by_key(|u| u.commit_time)
    }

    /// Everything older than `launched`, except the newest such update so
    /// there is something to fall back to.
    fn select_updates_to_delete(
        &self,
        updates: &[Update],
        launched: &Update,
        filters: Option<&HeaderDictionary>,
    ) -> Vec<Uuid> {
        let older: Vec<&Update> = updates
            .iter()
            .filter(|u| u.update_id != launched.update_id && u.commit_time < launched.commit_time)
            .collect();

        let keep = older
            .iter()
            .filter(|u| matches_filters(u, filters))
            .max_by_key(|u| u.commit_time)
            .or_else(|| older.iter().max_by_key(|u| u.commit_time))
            .map(|u| u.update_id);

        older
            .into_iter()
            .map(|u| u.update_id)
            .filter(|id| Some(*id) != keep)
            .collect()
    }

    fn should_load_new_update(
        &self,
        new_update: Option<&Update>,
        launched: Option<&Update>,
        filters: Option<&HeaderDictionary>,
    ) -> bool {
        let Some(new_update) = new_update else {
            return false;
        };
        if !self.is_compatible(new_update, filters) {
            return false;
        }
        let Some(launched) = launched else {
            return true;
        };
        if !matches_filters(launched, filters) {
            return true;
        }
        new_update.commit_time > launched.commit_time
    }

    fn should_load_rollback_directive(
        &self,
        directive_commit_time: DateTime<Utc>,
        embedded: Option<&Update>,
        launched: Option<&Update>,
        filters: Option<&HeaderDictionary>,
    ) -> bool {
        let Some(embedded) = embedded else {
            return false;
        };
        if !matches_filters(embedded, filters) {
            return false;
        }
        let Some(launched) = launched else {
            return true;
        };
        if !matches_filters(launched, filters) {
            return true;
        }
        directive_commit_time > launched.commit_time
    }
}
