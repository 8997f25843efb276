#![forbid(unsafe_code)]

use uuid::Uuid;

/// Outcome of a remote load that finished after the launch decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundUpdateStatus {
    NoUpdateAvailable,
    UpdateAvailable,
    Error,
}

/// Launch task lifecycle events.
///
/// A run publishes exactly one of `FinishedWithLauncher` and
/// `FinishedWithError`, and at most one `BackgroundUpdateFinished`.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskEvent {
    /// A cached update was selected before any remote check.
    CachedUpdateLoaded { update_id: Uuid },
    RemoteCheckStarted,
    /// The server offered an update and its download began.
    RemoteUpdateStarted { update_id: Uuid },
    FinishedWithLauncher { update_id: Uuid, is_up_to_date: bool },
    FinishedWithError { error: String },
    BackgroundUpdateFinished {
        status: BackgroundUpdateStatus,
        update_id: Option<Uuid>,
        error: Option<String>,
    },
}
