//! All integration tests for updraft
#![expect(
    clippy::unwrap_used,
    reason = "unwraps are acceptable in test code"
)]

mod updraft_loader;
mod updraft_net;
mod updraft_signing;
mod updraft_task;
