#![forbid(unsafe_code)]

//! Manifest and asset loading.
//!
//! [`AppLoader`] owns the shared state machine; [`EmbeddedStrategy`] and
//! [`RemoteStrategy`] supply the response and asset bytes.

mod app_loader;
mod downloader;
mod embedded;
mod error;
mod fatal;
mod remote;
mod state;
mod strategy;

pub use app_loader::{Admission, AppLoader, LoadOutcome};
pub use downloader::{
    API_VERSION, DownloaderConfig, FileDownloader, MANIFEST_ACCEPT, MAX_FATAL_ERROR_CHARS,
    PROTOCOL_VERSION, UPDATES_ENVIRONMENT,
};
pub use embedded::{EmbeddedBundle, EmbeddedStrategy};
pub use error::{LoaderError, LoaderResult};
pub use fatal::FatalErrorLog;
pub use remote::RemoteStrategy;
pub use state::{AssetOutcome, Completion, Partition, RunState};
pub use strategy::LoaderStrategy;
