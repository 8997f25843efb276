use std::{sync::Arc, time::Duration};

use rstest::*;
use serde_json::json;
use tempfile::TempDir;
use updraft::{
    CodeSigningSettings, LoaderTask, UpdatesConfig,
    store::{LocalStore, UpdatesStore},
};
use updraft_test_utils::{
    ManifestBuilder, MultipartBuilder, PROJECT_CERT, PROJECT_ID, PROJECT_SCOPE_KEY, SIGNING_CERT,
    SIGNING_KEY, ServedResponse, UpdateServer, sign, signature_header,
};

struct Signed {
    server: UpdateServer,
    store: Arc<LocalStore>,
    dir: TempDir,
}

impl Signed {
    async fn new() -> Self {
        let server = UpdateServer::start().await;
        server.serve_asset("bundle", "signed-js");
        Self {
            server,
            store: Arc::new(LocalStore::in_memory()),
            dir: TempDir::new().unwrap(),
        }
    }

    fn manifest(&self) -> ManifestBuilder {
        ManifestBuilder::new("2024-06-01T00:00:00Z").launch_asset(
            "bundle",
            &self.server.asset_url("bundle"),
            b"signed-js",
        )
    }

    fn serve_signed(&self, body: &str, signed: &str) {
        let header = signature_header(&sign(signed.as_bytes(), SIGNING_KEY), "root");
        let multipart = MultipartBuilder::new().part("manifest", body, Some(&header));
        self.server
            .serve_manifest(ServedResponse::multipart(&multipart));
    }

    fn task(&self, certificate: &str, scope_key: Option<&str>) -> LoaderTask {
        let mut config = UpdatesConfig::new(self.server.manifest_url())
            .with_updates_dir(self.dir.path())
            .with_launch_wait(Duration::from_secs(5))
            .with_code_signing(CodeSigningSettings::new(certificate));
        if let Some(scope_key) = scope_key {
            config = config.with_scope_key(scope_key);
        }
        LoaderTask::new(config, self.store.clone()).unwrap()
    }
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn signed_manifest_launches_as_verified() {
    let s = Signed::new().await;
    let manifest = s.manifest().to_json();
    s.serve_signed(&manifest, &manifest);

    let outcome = s.task(SIGNING_CERT, None).run().await.unwrap();

    assert!(outcome.is_up_to_date);
    assert!(outcome.launcher.update().is_verified);
    let headers = s.server.last_manifest_headers().unwrap();
    assert!(headers["expo-expect-signature"].contains(r#"keyid="root""#));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn tampered_manifest_is_never_stored() {
    let s = Signed::new().await;
    let manifest = s.manifest().to_json();
    let tampered = manifest.replace("2024-06-01", "2030-06-01");
    s.serve_signed(&tampered, &manifest);

    let result = s.task(SIGNING_CERT, None).run().await;

    assert!(result.is_err());
    assert!(s.store.all_updates().unwrap().is_empty());
    assert_eq!(s.server.asset_request_count(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn unsigned_manifest_is_rejected_when_signing_is_configured() {
    let s = Signed::new().await;
    s.server
        .serve_manifest(ServedResponse::json(s.manifest().to_json()));

    let result = s.task(SIGNING_CERT, None).run().await;

    assert!(result.is_err());
    assert!(s.store.all_updates().unwrap().is_empty());
}

#[rstest]
#[case::matching_project(PROJECT_ID, PROJECT_SCOPE_KEY, true)]
#[case::foreign_scope(PROJECT_ID, "@someone-else/app", false)]
#[case::foreign_project("00000000-0000-4000-8000-000000000000", PROJECT_SCOPE_KEY, false)]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn manifest_must_declare_the_certificate_project(
    #[case] project_id: &str,
    #[case] scope_key: &str,
    #[case] accepted: bool,
) {
    let s = Signed::new().await;
    let manifest = s
        .manifest()
        .extra(json!({"eas": {"projectId": project_id}, "scopeKey": scope_key}))
        .to_json();
    s.serve_signed(&manifest, &manifest);

    let result = s.task(PROJECT_CERT, Some(PROJECT_SCOPE_KEY)).run().await;

    assert_eq!(result.is_ok(), accepted);
    assert_eq!(s.store.all_updates().unwrap().is_empty(), !accepted);
}
