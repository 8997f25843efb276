#![forbid(unsafe_code)]

//! Update persistence and selection.
//!
//! [`UpdatesStore`] is the seam the loader writes through; [`LocalStore`] is
//! the bundled implementation. [`SelectionPolicy`] decides what launches and
//! what is reaped, and [`Reaper`] applies those decisions to disk.

mod error;
mod local;
mod policy;
mod reaper;
mod traits;

pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use policy::{FilterAwarePolicy, SelectionPolicy};
pub use reaper::{ReapReport, Reaper};
pub use traits::UpdatesStore;
