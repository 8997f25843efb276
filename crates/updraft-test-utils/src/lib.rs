#![forbid(unsafe_code)]
#![expect(
    clippy::unwrap_used,
    reason = "unwraps are acceptable in test utilities"
)]

//! Shared test utilities for the updraft workspace.

pub mod fixtures;
pub mod http_server;
pub mod payload;
pub mod update_server;

pub use fixtures::*;
pub use http_server::TestHttpServer;
pub use payload::{ManifestBuilder, MultipartBuilder, sign, signature_header};
pub use update_server::{ServedResponse, UpdateServer};
