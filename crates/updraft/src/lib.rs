#![forbid(unsafe_code)]

//! # Updraft
//!
//! Over-the-air update client: fetches, verifies and stores application
//! updates, and decides at launch which one to run.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use updraft::prelude::*;
//!
//! updraft::init_tracing();
//! let config = UpdatesConfig::new("https://u.example.com/manifest".parse()?)
//!     .with_updates_dir("/var/lib/app/updates");
//! let store = Arc::new(LocalStore::open("/var/lib/app/updates/store.json")?);
//! let outcome = LoaderTask::new(config, store)?
//!     .with_embedded(EmbeddedBundle::new("/opt/app/embedded"))
//!     .run()
//!     .await?;
//! println!("launching {}", outcome.launcher.launch_asset_path().unwrap().display());
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod model {
    pub use updraft_core::*;
}

pub mod events {
    pub use updraft_events::*;
}

pub mod loader {
    pub use updraft_loader::*;
}

pub mod net {
    pub use updraft_net::*;
}

pub mod protocol {
    pub use updraft_protocol::*;
}

pub mod signing {
    pub use updraft_signing::*;
}

pub mod store {
    pub use updraft_store::*;
}

// ── Launch task ─────────────────────────────────────────────────────────

mod config;
mod error;
mod launcher;
mod logging;
mod task;

pub use config::{CheckOnLaunch, CodeSigningSettings, ConfigError, UpdatesConfig};
pub use error::{UpdatesError, UpdatesResult};
pub use launcher::Launcher;
pub use logging::init_tracing;
pub use task::{LoaderTask, TaskHooks, TaskOutcome};

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use updraft_core::{Asset, Update, UpdateDirective, UpdateStatus};
    pub use updraft_events::{BackgroundUpdateStatus, Event, EventBus, LoaderEvent, TaskEvent};
    pub use updraft_loader::{EmbeddedBundle, FatalErrorLog};
    pub use updraft_signing::CodeSigningMetadata;
    pub use updraft_store::{LocalStore, UpdatesStore};

    pub use crate::{
        CheckOnLaunch, CodeSigningSettings, Launcher, LoaderTask, TaskHooks, TaskOutcome,
        UpdatesConfig, UpdatesError, UpdatesResult,
    };
}
