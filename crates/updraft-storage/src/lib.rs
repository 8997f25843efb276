#![forbid(unsafe_code)]

//! `updraft-storage`
//!
//! File primitives used for asset files, the store snapshot and the fatal
//! error log. Every write goes through [`AtomicFile`], so readers observe
//! either the previous content or the new content, never a partial file.

mod atomic;
mod error;

pub use atomic::AtomicFile;
pub use error::{StorageError, StorageResult};
