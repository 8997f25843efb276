use std::{sync::Arc, time::Duration};

use rstest::*;
use tempfile::TempDir;
use tokio::sync::broadcast::Receiver;
use updraft::{
    CheckOnLaunch, LoaderTask, TaskHooks, UpdatesConfig,
    events::{BackgroundUpdateStatus, Event, TaskEvent},
    model::Update,
    store::{LocalStore, UpdatesStore},
};
use updraft_test_utils::{ManifestBuilder, ServedResponse, UpdateServer};
use uuid::Uuid;

struct Device {
    server: UpdateServer,
    store: Arc<LocalStore>,
    dir: TempDir,
}

impl Device {
    async fn new() -> Self {
        Self {
            server: UpdateServer::start().await,
            store: Arc::new(LocalStore::in_memory()),
            dir: TempDir::new().unwrap(),
        }
    }

    fn config(&self) -> UpdatesConfig {
        UpdatesConfig::new(self.server.manifest_url())
            .with_updates_dir(self.dir.path())
            .with_launch_wait(Duration::from_secs(5))
            .with_event_channel_capacity(256)
    }

    fn task(&self, config: UpdatesConfig) -> LoaderTask {
        LoaderTask::new(config, self.store.clone()).unwrap()
    }

    /// Publish an update whose single launch asset is served under `key`.
    fn publish(&self, key: &str, created_at: &str) -> Uuid {
        let body = format!("bundle {key}");
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

    /// First launch: downloads and launches whatever is published.
    async fn install(&self, key: &str, created_at: &str) -> Uuid {
        let id = self.publish(key, created_at);
        let outcome = self.task(self.config()).run().await.unwrap();
        assert_eq!(outcome.launcher.update().update_id, id);
        if let Some(remote_check) = outcome.remote_check {
            remote_check.await.unwrap();
        }
        id
    }
}

fn drain(events: &mut Receiver<Event>) -> Vec<TaskEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Task(event) = event {
            out.push(event);
        }
    }
    out
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn first_launch_downloads_and_is_up_to_date() {
    let device = Device::new().await;
    let id = device.publish("a", "2024-06-01T00:00:00Z");

    let task = device.task(device.config());
    let mut events = task.subscribe();
    let outcome = task.run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, id);
    assert!(outcome.is_up_to_date);
    let launch_asset = outcome.launcher.launch_asset_path().unwrap();
    assert_eq!(std::fs::read_to_string(launch_asset).unwrap(), "bundle a");

    let events = drain(&mut events);
    assert!(events.contains(&TaskEvent::RemoteUpdateStarted { update_id: id }));
    assert_eq!(
        events.last(),
        Some(&TaskEvent::FinishedWithLauncher {
            update_id: id,
            is_up_to_date: true
        })
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn zero_wait_launches_cached_and_reports_background_update() {
    let device = Device::new().await;
    let first = device.install("a", "2024-06-01T00:00:00Z").await;
    let second = device.publish("b", "2024-07-01T00:00:00Z");

    let task = device.task(device.config().with_launch_wait(Duration::ZERO));
    let mut events = task.subscribe();
    let outcome = task.run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, first);
    assert!(!outcome.is_up_to_date);

    outcome.remote_check.unwrap().await.unwrap();
    let events = drain(&mut events);
    assert!(events.contains(&TaskEvent::CachedUpdateLoaded { update_id: first }));
    assert!(events.contains(&TaskEvent::BackgroundUpdateFinished {
        status: BackgroundUpdateStatus::UpdateAvailable,
        update_id: Some(second),
        error: None,
    }));
    let finished = events
        .iter()
        .filter(|e| matches!(e, TaskEvent::FinishedWithLauncher { .. }))
        .count();
    assert_eq!(finished, 1);

    // The downloaded update wins on the next launch.
    let next = device
        .task(device.config().with_check_on_launch(CheckOnLaunch::Never))
        .run()
        .await
        .unwrap();
    assert_eq!(next.launcher.update().update_id, second);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn newer_remote_update_replaces_cached_within_wait() {
    let device = Device::new().await;
    device.install("a", "2024-06-01T00:00:00Z").await;
    let second = device.publish("b", "2024-07-01T00:00:00Z");

    let outcome = device.task(device.config()).run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, second);
    assert!(outcome.is_up_to_date);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn older_remote_update_is_not_downloaded() {
    let device = Device::new().await;
    let first = device.install("a", "2024-06-01T00:00:00Z").await;
    let requests = device.server.asset_request_count();
    device.publish("old", "2024-01-01T00:00:00Z");

    let outcome = device.task(device.config()).run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, first);
    assert!(outcome.is_up_to_date);
    assert_eq!(device.server.asset_request_count(), requests);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn no_update_available_keeps_cached() {
    let device = Device::new().await;
    let first = device.install("a", "2024-06-01T00:00:00Z").await;
    device.server.serve_manifest(ServedResponse::no_content());

    let outcome = device.task(device.config()).run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, first);
    assert!(outcome.is_up_to_date);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn server_error_falls_back_to_cached() {
    let device = Device::new().await;
    let first = device.install("a", "2024-06-01T00:00:00Z").await;
    device
        .server
        .serve_manifest(ServedResponse::new(500, "down"));

    let task = device.task(device.config());
    let mut events = task.subscribe();
    let outcome = task.run().await.unwrap();

    assert_eq!(outcome.launcher.update().update_id, first);
    assert!(!outcome.is_up_to_date);
    assert!(
        drain(&mut events)
            .iter()
            .all(|e| !matches!(e, TaskEvent::FinishedWithError { .. }))
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn nothing_to_launch_is_an_error() {
    let device = Device::new().await;
    device.server.serve_manifest(ServedResponse::no_content());

    let task = device.task(device.config());
    let mut events = task.subscribe();
    let result = task.run().await;

    assert!(matches!(result, Err(updraft::UpdatesError::NoLaunchableUpdate)));
    assert!(matches!(
        drain(&mut events).last(),
        Some(TaskEvent::FinishedWithError { .. })
    ));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn check_never_launches_cached_without_network() {
    let device = Device::new().await;
    let first = device.install("a", "2024-06-01T00:00:00Z").await;
    device.publish("b", "2024-07-01T00:00:00Z");
    let requests = device.server.manifest_request_count();

    let outcome = device
        .task(device.config().with_check_on_launch(CheckOnLaunch::Never))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.launcher.update().update_id, first);
    assert!(outcome.remote_check.is_none());
    assert_eq!(device.server.manifest_request_count(), requests);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn vetoed_cached_update_forces_remote_check() {
    let device = Device::new().await;
    let first = device.install("a", "2024-06-01T00:00:00Z").await;
    let second = device.publish("b", "2024-07-01T00:00:00Z");

    let hooks = TaskHooks::new().accept_cached(move |update: &Update| update.update_id != first);
    let outcome = device
        .task(device.config().with_check_on_launch(CheckOnLaunch::Never))
        .with_hooks(hooks)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.launcher.update().update_id, second);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn rejected_remote_update_is_left_on_server() {
    let device = Device::new().await;
    let first = device.install("a", "2024-06-01T00:00:00Z").await;
    device.publish("b", "2024-07-01T00:00:00Z");
    let requests = device.server.asset_request_count();

    let hooks = TaskHooks::new().admit_remote(|_: &Update| false);
    let outcome = device
        .task(device.config())
        .with_hooks(hooks)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.launcher.update().update_id, first);
    assert_eq!(device.server.asset_request_count(), requests);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn manifest_request_carries_protocol_and_custom_headers() {
    let device = Device::new().await;
    device.publish("a", "2024-06-01T00:00:00Z");

    device
        .task(
            device
                .config()
                .with_runtime_version("1")
                .with_request_header("expo-channel-name", "beta"),
        )
        .run()
        .await
        .unwrap();

    let headers = device.server.last_manifest_headers().unwrap();
    assert_eq!(headers["expo-protocol-version"], "1");
    assert_eq!(headers["expo-runtime-version"], "1");
    assert_eq!(headers["expo-channel-name"], "beta");
    assert!(headers.contains_key("eas-client-id"));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn server_defined_headers_are_echoed_next_time() {
    let device = Device::new().await;
    let body = "bundle a";
    device.server.serve_asset("a", body);
    let manifest = ManifestBuilder::new("2024-06-01T00:00:00Z").launch_asset(
        "a",
        &device.server.asset_url("a"),
        body.as_bytes(),
    );
    device.server.serve_manifest(
        ServedResponse::json(manifest.to_json())
            .with_header("expo-server-defined-headers", r#"expo-cohort="seven""#),
    );
    device.task(device.config()).run().await.unwrap();

    device.task(device.config()).run().await.unwrap();

    let headers = device.server.last_manifest_headers().unwrap();
    assert_eq!(headers["expo-cohort"], "seven");
    assert!(headers.contains_key("expo-current-update-id"));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn recorded_fatal_error_is_reported_once() {
    let device = Device::new().await;
    device.publish("a", "2024-06-01T00:00:00Z");
    let config = device.config();
    config.fatal_error_log().record("boom at startup").unwrap();

    device.task(config.clone()).run().await.unwrap();
    let headers = device.server.last_manifest_headers().unwrap();
    assert_eq!(headers["expo-fatal-error"], "boom at startup");

    device.task(config).run().await.unwrap();
    let headers = device.server.last_manifest_headers().unwrap();
    assert!(!headers.contains_key("expo-fatal-error"));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn fatal_error_survives_launch_without_remote_check() {
    let device = Device::new().await;
    device.install("a", "2024-06-01T00:00:00Z").await;
    let requests = device.server.manifest_request_count();
    let config = device.config();
    config.fatal_error_log().record("boom").unwrap();

    device
        .task(config.clone().with_check_on_launch(CheckOnLaunch::Never))
        .run()
        .await
        .unwrap();
    assert_eq!(device.server.manifest_request_count(), requests);

    device.task(config).run().await.unwrap();
    let headers = device.server.last_manifest_headers().unwrap();
    assert_eq!(headers["expo-fatal-error"], "boom");
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn reaping_waits_for_background_check_and_stays_in_scope() {
    let device = Device::new().await;
    let first = device.install("a", "2024-06-01T00:00:00Z").await;
    let second = device.install("b", "2024-07-01T00:00:00Z").await;

    let installed = device.store.find_update(first).unwrap().unwrap();
    let mut stale = installed.clone();
    stale.update_id = Uuid::new_v4();
    stale.commit_time = "2024-01-01T00:00:00Z".parse().unwrap();
    let mut foreign = stale.clone();
    foreign.update_id = Uuid::new_v4();
    foreign.scope_key = "https://other.example.com".into();
    device.store.insert_update(&stale).unwrap();
    device.store.insert_update(&foreign).unwrap();

    device.server.serve_manifest(
        ServedResponse::no_content().with_delay(Duration::from_millis(500)),
    );
    let outcome = device
        .task(device.config().with_launch_wait(Duration::ZERO))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.launcher.update().update_id, second);
    assert!(device.store.find_update(stale.update_id).unwrap().is_some());

    outcome.remote_check.unwrap().await.unwrap();
    assert!(device.store.find_update(stale.update_id).unwrap().is_none());
    assert!(device.store.find_update(first).unwrap().is_some());
    assert!(device.store.find_update(foreign.update_id).unwrap().is_some());
}
