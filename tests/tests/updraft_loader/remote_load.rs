use std::{sync::Arc, time::Duration};

use rstest::*;
use tempfile::TempDir;
use updraft::{
    events::EventBus,
    loader::{AppLoader, DownloaderConfig, FileDownloader, LoaderError, RemoteStrategy},
    model::UpdateStatus,
    net::{Headers, HttpClient, NetOptions},
    protocol::{ParserOptions, ResponseParser},
    store::{LocalStore, UpdatesStore},
};
use updraft_test_utils::{ManifestBuilder, ServedResponse, UpdateServer};

struct Harness {
    server: UpdateServer,
    store: Arc<LocalStore>,
    dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        Self {
            server: UpdateServer::start().await,
            store: Arc::new(LocalStore::in_memory()),
            dir: TempDir::new().unwrap(),
        }
    }

    fn loader(&self) -> AppLoader {
        let net = Arc::new(HttpClient::new(NetOptions::default()).unwrap());
        let downloader = Arc::new(FileDownloader::new(
            net,
            DownloaderConfig {
                platform: "linux".into(),
                client_id: "it-client".into(),
                runtime_version: "1".into(),
                request_headers: Headers::new(),
                code_signing: None,
            },
        ));
        let parser = ResponseParser::new(ParserOptions {
            scope_key: "scope".into(),
            runtime_version: "1".into(),
            v0_compatible: false,
            code_signing: None,
        });
        let strategy = RemoteStrategy::new(
            downloader,
            parser,
            self.store.clone(),
            self.server.manifest_url(),
        );
        AppLoader::new(
            Arc::new(strategy),
            self.store.clone(),
            self.dir.path(),
            EventBus::default(),
        )
    }

    /// Manifest with a launch asset and two images, all served.
    fn three_asset_manifest(&self) -> ManifestBuilder {
        for (key, body) in [("bundle", "js"), ("img-a", "a"), ("img-b", "b")] {
            self.server.serve_asset(key, body);
        }
        let manifest = ManifestBuilder::new("2024-06-01T00:00:00Z")
            .launch_asset("bundle", &self.server.asset_url("bundle"), b"js")
            .asset("img-a", ".png", &self.server.asset_url("img-a"), b"a")
            .asset("img-b", ".png", &self.server.asset_url("img-b"), b"b");
        self.server
            .serve_manifest(ServedResponse::json(manifest.to_json()));
        manifest
    }
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn second_load_of_ready_update_downloads_nothing() {
    let h = Harness::new().await;
    let manifest = h.three_asset_manifest();

    let first = h.loader().load(None).await.unwrap().update.unwrap();
    assert_eq!(first.update_id, manifest.id());
    assert_eq!(first.status, UpdateStatus::Ready);
    assert_eq!(h.server.asset_request_count(), 3);

    let second = h.loader().load(None).await.unwrap().update.unwrap();

    assert_eq!(h.server.asset_request_count(), 3);
    assert_eq!(second.update_id, first.update_id);
    assert_eq!(second.status, UpdateStatus::Ready);
    assert_eq!(second.assets.len(), 3);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn one_failed_asset_of_three_keeps_the_rest() {
    let h = Harness::new().await;
    for (key, body) in [("bundle", "js"), ("img-a", "a")] {
        h.server.serve_asset(key, body);
    }
    // img-b is never served.
    let manifest = ManifestBuilder::new("2024-06-01T00:00:00Z")
        .launch_asset("bundle", &h.server.asset_url("bundle"), b"js")
        .asset("img-a", ".png", &h.server.asset_url("img-a"), b"a")
        .asset("img-b", ".png", &h.server.asset_url("img-b"), b"b");
    h.server
        .serve_manifest(ServedResponse::json(manifest.to_json()));

    let err = h.loader().load(None).await.unwrap_err();

    assert!(matches!(
        err,
        LoaderError::NotAllAssetsLoaded {
            errored: 1,
            total: 3
        }
    ));
    assert!(h.store.find_asset("bundle").unwrap().is_some());
    assert!(h.store.find_asset("img-a").unwrap().is_some());
    assert!(h.store.find_asset("img-b").unwrap().is_none());
    let stored = h.store.find_update(manifest.id()).unwrap().unwrap();
    assert_eq!(stored.status, UpdateStatus::Pending);
    assert!(h.dir.path().join("img-a.png").is_file());
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn tampered_asset_is_not_written() {
    let h = Harness::new().await;
    h.three_asset_manifest();
    h.server.serve_asset("img-a", "tampered");

    let err = h.loader().load(None).await.unwrap_err();

    assert!(matches!(err, LoaderError::NotAllAssetsLoaded { errored: 1, .. }));
    assert!(!h.dir.path().join("img-a.png").exists());
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn assets_shared_between_updates_are_reused() {
    let h = Harness::new().await;
    h.three_asset_manifest();
    h.loader().load(None).await.unwrap();

    h.server.serve_asset("bundle-2", "js2");
    let next = ManifestBuilder::new("2024-07-01T00:00:00Z")
        .launch_asset("bundle-2", &h.server.asset_url("bundle-2"), b"js2")
        .asset("img-a", ".png", &h.server.asset_url("img-a"), b"a");
    h.server.serve_manifest(ServedResponse::json(next.to_json()));

    let update = h.loader().load(None).await.unwrap().update.unwrap();

    assert_eq!(update.status, UpdateStatus::Ready);
    assert_eq!(update.assets.len(), 2);
    // Only the new launch asset is fetched.
    assert_eq!(h.server.asset_request_count(), 4);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn server_metadata_is_persisted_per_scope() {
    let h = Harness::new().await;
    let manifest = h.three_asset_manifest();
    h.server.serve_manifest(
        ServedResponse::json(manifest.to_json())
            .with_header("expo-server-defined-headers", r#"x-channel="beta""#)
            .with_header("expo-manifest-filters", r#"branch="main""#),
    );

    h.loader().load(None).await.unwrap();

    let server_headers = h.store.server_defined_headers("scope").unwrap().unwrap();
    assert_eq!(server_headers["x-channel"].to_string(), "beta");
    let filters = h.store.manifest_filters("scope").unwrap().unwrap();
    assert!(filters.contains_key("branch"));
}
