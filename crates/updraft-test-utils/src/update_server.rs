//! Scripted update server for end-to-end tests.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use parking_lot::Mutex;
use url::Url;

use crate::{MultipartBuilder, TestHttpServer};

/// Response the manifest endpoint returns.
#[derive(Clone, Debug)]
pub struct ServedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Wait this long before answering.
    pub delay: Duration,
}

impl ServedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: vec![("expo-protocol-version".into(), "1".into())],
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self::new(200, body.into()).with_header("content-type", "application/json")
    }

    pub fn multipart(builder: &MultipartBuilder) -> Self {
        Self::new(200, builder.build())
            .with_header("content-type", &MultipartBuilder::content_type())
    }

    pub fn no_content() -> Self {
        Self::new(204, Bytes::new())
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

#[derive(Default)]
struct ServerState {
    manifest: Mutex<Option<ServedResponse>>,
    assets: Mutex<HashMap<String, Bytes>>,
    manifest_requests: Mutex<Vec<HashMap<String, String>>>,
    asset_requests: AtomicUsize,
}

/// Serves `/manifest` and `/assets/:key` and records what it was asked.
pub struct UpdateServer {
    server: TestHttpServer,
    state: Arc<ServerState>,
}

impl UpdateServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let router = Router::new()
            .route("/manifest", get(manifest))
            .route("/assets/:key", get(asset))
            .with_state(Arc::clone(&state));
        Self {
            server: TestHttpServer::new(router).await,
            state,
        }
    }

    pub fn manifest_url(&self) -> Url {
        self.server.url("/manifest")
    }

    pub fn asset_url(&self, key: &str) -> Url {
        self.server.url(&format!("/assets/{key}"))
    }

    pub fn serve_manifest(&self, response: ServedResponse) {
        *self.state.manifest.lock() = Some(response);
    }

    pub fn serve_asset(&self, key: &str, body: impl Into<Bytes>) {
        self.state.assets.lock().insert(key.to_string(), body.into());
    }

    pub fn manifest_request_count(&self) -> usize {
        self.state.manifest_requests.lock().len()
    }

    pub fn asset_request_count(&self) -> usize {
        self.state.asset_requests.load(Ordering::SeqCst)
    }

    /// Headers of the most recent manifest request, names lowercased.
    pub fn last_manifest_headers(&self) -> Option<HashMap<String, String>> {
        self.state.manifest_requests.lock().last().cloned()
    }
}

async fn manifest(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let recorded = headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();
    state.manifest_requests.lock().push(recorded);

    let served = state.manifest.lock().clone();
    let Some(served) = served else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !served.delay.is_zero() {
        tokio::time::sleep(served.delay).await;
    }
    served.into_response()
}

async fn asset(State(state): State<Arc<ServerState>>, Path(key): Path<String>) -> Response {
    state.asset_requests.fetch_add(1, Ordering::SeqCst);
    let body = state.assets.lock().get(&key).cloned();
    match body {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
