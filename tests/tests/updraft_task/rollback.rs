use std::{path::Path, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use rstest::*;
use serde_json::json;
use tempfile::TempDir;
use updraft::{
    LoaderTask, UpdatesConfig,
    loader::EmbeddedBundle,
    model::{Update, UpdateStatus},
    store::{FilterAwarePolicy, LocalStore, SelectionPolicy, UpdatesStore},
};
use updraft_test_utils::{ManifestBuilder, MultipartBuilder, ServedResponse, UpdateServer};
use uuid::Uuid;

const EMBEDDED_CREATED_AT: &str = "2024-01-01T00:00:00Z";
const ROLLBACK_AT: &str = "2024-03-01T00:00:00Z";

struct Shipped {
    server: UpdateServer,
    store: Arc<LocalStore>,
    updates: TempDir,
    bundle: TempDir,
    embedded_id: Uuid,
}

impl Shipped {
    async fn new() -> Self {
        let server = UpdateServer::start().await;
        let bundle = TempDir::new().unwrap();
        let embedded_id = write_bundle(bundle.path(), &server);
        Self {
            server,
            store: Arc::new(LocalStore::in_memory()),
            updates: TempDir::new().unwrap(),
            bundle,
            embedded_id,
        }
    }

    fn task(&self) -> LoaderTask {
        let config = UpdatesConfig::new(self.server.manifest_url())
            .with_updates_dir(self.updates.path())
            .with_launch_wait(Duration::from_secs(5));
        LoaderTask::new(config, self.store.clone())
            .unwrap()
            .with_embedded(EmbeddedBundle::new(self.bundle.path()))
    }

    /// Run a launch and wait for its background work, reaping included.
    async fn launch(&self) -> Uuid {
        let outcome = self.task().run().await.unwrap();
        if let Some(remote_check) = outcome.remote_check {
            remote_check.await.unwrap();
        }
        outcome.launcher.update().update_id
    }

    fn publish(&self, key: &str, created_at: &str) -> Uuid {
        let body = format!("{key} js");
        self.server.serve_asset(key, body.clone());
        let manifest = ManifestBuilder::new(created_at).launch_asset(
            key,
            &self.server.asset_url(key),
            body.as_bytes(),
        );
        self.server
            .serve_manifest(ServedResponse::json(manifest.to_json()));
        manifest.id()
    }

    fn stored_embedded(&self) -> Update {
        self.store.find_update(self.embedded_id).unwrap().unwrap()
    }
}

/// Lay out an embedded bundle: the manifest plus its launch asset file.
fn write_bundle(dir: &Path, server: &UpdateServer) -> Uuid {
    let body = b"embedded js";
    let manifest = ManifestBuilder::new(EMBEDDED_CREATED_AT).launch_asset(
        "main",
        &server.asset_url("main"),
        body,
    );
    std::fs::write(dir.join(EmbeddedBundle::MANIFEST_FILENAME), manifest.to_json()).unwrap();
    std::fs::write(dir.join("main.bundle"), body).unwrap();
    manifest.id()
}

fn rollback_directive(commit_time: &str) -> ServedResponse {
    let directive = json!({
        "type": "rollBackToEmbedded",
        "parameters": {"commitTime": commit_time},
    })
    .to_string();
    ServedResponse::multipart(&MultipartBuilder::new().part("directive", &directive, None))
}

fn at(timestamp: &str) -> DateTime<Utc> {
    timestamp.parse().unwrap()
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn embedded_update_launches_without_remote_update() {
    let shipped = Shipped::new().await;
    shipped.server.serve_manifest(ServedResponse::no_content());

    let outcome = shipped.task().run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, shipped.embedded_id);
    assert!(outcome.is_up_to_date);
    assert_eq!(shipped.stored_embedded().status, UpdateStatus::Ready);
    assert!(shipped.stored_embedded().is_verified);
    let launch_asset = outcome.launcher.launch_asset_path().unwrap();
    assert_eq!(std::fs::read(launch_asset).unwrap(), b"embedded js");
    assert_eq!(shipped.server.asset_request_count(), 0);

    let headers = shipped.server.last_manifest_headers().unwrap();
    assert_eq!(
        headers["expo-embedded-update-id"],
        shipped.embedded_id.to_string()
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn rollback_moves_embedded_commit_time_forward() {
    let shipped = Shipped::new().await;
    shipped.server.serve_manifest(ServedResponse::no_content());
    shipped.task().run().await.unwrap();

    shipped
        .server
        .serve_manifest(rollback_directive(ROLLBACK_AT));
    let outcome = shipped.task().run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, shipped.embedded_id);
    assert!(outcome.is_up_to_date);
    let stored = shipped.stored_embedded();
    assert_eq!(stored.commit_time, at(ROLLBACK_AT));

    // Anything published after the roll-back still supersedes it, anything
    // published before it does not.
    let policy = FilterAwarePolicy::new("1");
    let mut later = stored.clone();
    later.update_id = Uuid::new_v4();
    later.commit_time = at(ROLLBACK_AT) + TimeDelta::seconds(1);
    assert!(policy.should_load_new_update(Some(&later), Some(&stored), None));

    let mut earlier = later.clone();
    earlier.commit_time = at("2024-02-01T00:00:00Z");
    assert!(!policy.should_load_new_update(Some(&earlier), Some(&stored), None));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn stale_rollback_directive_is_ignored() {
    let shipped = Shipped::new().await;
    shipped.server.serve_manifest(ServedResponse::no_content());
    shipped.task().run().await.unwrap();

    shipped
        .server
        .serve_manifest(rollback_directive("2023-06-01T00:00:00Z"));
    let outcome = shipped.task().run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, shipped.embedded_id);
    assert_eq!(
        shipped.stored_embedded().commit_time,
        at(EMBEDDED_CREATED_AT)
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn rollback_replaces_a_downloaded_update() {
    let shipped = Shipped::new().await;
    shipped.server.serve_asset("remote", "remote js");
    let remote = ManifestBuilder::new("2024-02-01T00:00:00Z").launch_asset(
        "remote",
        &shipped.server.asset_url("remote"),
        b"remote js",
    );
    shipped
        .server
        .serve_manifest(ServedResponse::json(remote.to_json()));
    let outcome = shipped.task().run().await.unwrap();
    assert_eq!(outcome.launcher.update().update_id, remote.id());

    shipped
        .server
        .serve_manifest(rollback_directive(ROLLBACK_AT));
    let outcome = shipped.task().run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, shipped.embedded_id);
    assert!(outcome.is_up_to_date);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn rollback_after_two_newer_launches_restores_embedded() {
    let shipped = Shipped::new().await;
    let first = shipped.publish("first", "2024-01-15T00:00:00Z");
    assert_eq!(shipped.launch().await, first);
    let second = shipped.publish("second", "2024-02-01T00:00:00Z");
    assert_eq!(shipped.launch().await, second);

    assert!(shipped.store.find_update(shipped.embedded_id).unwrap().is_some());

    shipped
        .server
        .serve_manifest(rollback_directive(ROLLBACK_AT));
    assert_eq!(shipped.launch().await, shipped.embedded_id);
    assert_eq!(shipped.stored_embedded().commit_time, at(ROLLBACK_AT));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn rollback_reloads_embedded_missing_from_store() {
    let shipped = Shipped::new().await;
    let remote = shipped.publish("remote", "2024-02-01T00:00:00Z");
    assert_eq!(shipped.launch().await, remote);
    shipped.store.delete_updates(&[shipped.embedded_id]).unwrap();

    shipped
        .server
        .serve_manifest(rollback_directive(ROLLBACK_AT));
    let outcome = shipped.task().run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, shipped.embedded_id);
    let launch_asset = outcome.launcher.launch_asset_path().unwrap();
    assert_eq!(std::fs::read(launch_asset).unwrap(), b"embedded js");
    assert_eq!(shipped.stored_embedded().commit_time, at(ROLLBACK_AT));
}
