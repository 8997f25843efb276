#![forbid(unsafe_code)]

use uuid::Uuid;

/// Events emitted while one loader run resolves a manifest and its assets.
#[derive(Clone, Debug, PartialEq)]
pub enum LoaderEvent {
    /// A run started with the named strategy (`"embedded"` or `"remote"`).
    Started { strategy: &'static str },
    /// One asset reached a final state (existing, downloaded or errored).
    AssetLoaded {
        asset_key: String,
        loaded: usize,
        total: usize,
    },
    /// Fraction of assets resolved so far, in `0.0..=1.0`.
    Progress { fraction: f64 },
    /// The run finished; `None` when no update was loaded.
    Finished { update_id: Option<Uuid> },
    Failed { error: String },
}
