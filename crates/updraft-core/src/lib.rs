#![forbid(unsafe_code)]

//! Data model shared by the updraft crates.
//!
//! An [`Update`] is one launchable bundle: a manifest plus the [`Asset`]s it
//! references. Servers answer a manifest request either with an update or
//! with an [`UpdateDirective`]. Everything here is plain data; parsing lives
//! in `updraft-protocol` and persistence in `updraft-store`.

mod asset;
mod directive;
mod errors;
mod hash;
mod header;
mod scope;
mod update;

pub use asset::Asset;
pub use directive::UpdateDirective;
pub use errors::{CoreError, CoreResult};
pub use hash::{Sha256Base64Url, sha256_base64url};
pub use header::{HeaderDictionary, HeaderValue};
pub use scope::scope_key_from_url;
pub use update::{ProjectInformation, Update, UpdateStatus};
