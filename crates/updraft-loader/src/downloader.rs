#![forbid(unsafe_code)]

//! HTTP requests with the updraft header contract.
//!
//! Every request carries the fixed identification headers, then caller
//! headers, then the statically configured headers; later layers win.
//! Manifest requests add content negotiation and diagnostics on top.

use std::{path::Path, sync::Arc};

use bytes::Bytes;
use updraft_core::{Update, sha256_base64url};
use updraft_net::{Headers, HttpResponse, Net};
use updraft_protocol::{ResponseParser, UpdateResponse, serialize_string_dictionary};
use updraft_signing::CodeSigningConfiguration;
use updraft_storage::AtomicFile;
use updraft_store::UpdatesStore;
use url::Url;

use crate::{LoaderError, LoaderResult};

pub const PROTOCOL_VERSION: &str = "1";
pub const API_VERSION: &str = "1";
pub const UPDATES_ENVIRONMENT: &str = "BARE";
pub const MANIFEST_ACCEPT: &str = "multipart/mixed,application/expo+json,application/json";
pub const MAX_FATAL_ERROR_CHARS: usize = 1024;

/// Identity and static headers applied to every request.
#[derive(Clone, Debug)]
pub struct DownloaderConfig {
    pub platform: String,
    pub client_id: String,
    pub runtime_version: String,
    /// Configured headers, applied after caller headers.
    pub request_headers: Headers,
    pub code_signing: Option<Arc<CodeSigningConfiguration>>,
}

/// Fetches manifests and asset files.
pub struct FileDownloader {
    net: Arc<dyn Net>,
    config: DownloaderConfig,
}

impl FileDownloader {
    pub fn new(net: Arc<dyn Net>, config: DownloaderConfig) -> Self {
        Self { net, config }
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    fn fixed_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Expo-Platform", self.config.platform.as_str());
        headers.insert("Expo-Protocol-Version", PROTOCOL_VERSION);
        headers.insert("Expo-API-Version", API_VERSION);
        headers.insert("Expo-Updates-Environment", UPDATES_ENVIRONMENT);
        headers.insert("EAS-Client-ID", self.config.client_id.as_str());
        headers
    }

    fn request_headers(&self, extra: &Headers) -> Headers {
        let mut headers = self.fixed_headers();
        headers.extend(extra);
        headers.extend(&self.config.request_headers);
        headers
    }

    /// Headers for a manifest request.
    ///
    /// Same layering as every other request, with the protocol and content
    /// negotiation headers asserted on top so no caller or configured header
    /// can replace them. The signature expectation goes last.
    pub fn manifest_request_headers(&self, extra: &Headers, fatal_error: Option<&str>) -> Headers {
        let mut headers = self.request_headers(extra);
        headers.insert("Expo-Protocol-Version", PROTOCOL_VERSION);
        headers.insert("Accept", MANIFEST_ACCEPT);
        headers.insert("Expo-JSON-Error", "true");
        headers.insert("Expo-Runtime-Version", self.config.runtime_version.as_str());
        if let Some(error) = fatal_error {
            headers.insert(
                "Expo-Fatal-Error",
                error.chars().take(MAX_FATAL_ERROR_CHARS).collect::<String>(),
            );
        }
        if let Some(code_signing) = &self.config.code_signing {
            headers.insert("expo-expect-signature", code_signing.accept_signature_header());
        }
        headers
    }

    /// GET `url` with the standard header layering.
    pub async fn fetch(&self, url: Url, extra: &Headers) -> LoaderResult<HttpResponse> {
        let headers = self.request_headers(extra);
        Ok(self.net.fetch(url, Some(headers)).await?)
    }

    /// Fetch `url`, verify its hash, and atomically replace `dest` with it.
    ///
    /// Returns the body and its base64url SHA-256. Nothing is written when the
    /// hash does not match `expected_hash`.
    pub async fn fetch_and_hash_to_path(
        &self,
        url: Url,
        expected_hash: Option<&str>,
        dest: &Path,
        extra: &Headers,
    ) -> LoaderResult<(Bytes, String)> {
        let response = self.fetch(url.clone(), extra).await?;
        let body = response.body;
        let hash = sha256_base64url(&body);

        if let Some(expected) = expected_hash {
            if expected != hash {
                tracing::warn!(%url, expected, actual = %hash, "asset hash mismatch");
                return Err(LoaderError::HashMismatch {
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        let file = AtomicFile::new(dest);
        let data = body.clone();
        tokio::task::spawn_blocking(move || file.write_all(&data))
            .await?
            .map_err(LoaderError::FileWrite)?;

        tracing::debug!(%url, bytes = body.len(), dest = %dest.display(), "asset written");
        Ok((body, hash))
    }

    /// Fetch and decode a manifest response.
    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn download_remote_update(
        &self,
        url: &Url,
        extra: &Headers,
        fatal_error: Option<&str>,
        parser: &ResponseParser,
    ) -> LoaderResult<UpdateResponse> {
        let headers = self.manifest_request_headers(extra, fatal_error);
        let response = self.net.fetch(url.clone(), Some(headers)).await?;
        let parsed = parser.parse(&response)?;
        tracing::debug!(
            manifest = parsed.manifest_part.is_some(),
            directive = parsed.directive_part.is_some(),
            "manifest response decoded"
        );
        Ok(parsed)
    }

    /// Store-derived headers for a manifest request.
    ///
    /// Includes server-defined headers from the previous response, extra
    /// client params, the running and embedded update ids, and recently
    /// failed update ids.
    pub fn extra_headers_for_remote_update_request(
        store: &dyn UpdatesStore,
        scope_key: &str,
        launched: Option<&Update>,
        embedded: Option<&Update>,
    ) -> LoaderResult<Headers> {
        let mut headers = Headers::new();

        if let Some(server_headers) = store.server_defined_headers(scope_key)? {
            for (name, value) in &server_headers {
                headers.insert(name, value.to_string());
            }
        }

        let params = store.extra_client_params(scope_key)?;
        if !params.is_empty() {
            match serialize_string_dictionary(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            {
                Ok(serialized) => headers.insert("Expo-Extra-Params", serialized),
                Err(e) => tracing::warn!(error = %e, "omitting unserializable extra params"),
            }
        }

        if let Some(update) = launched {
            headers.insert(
                "Expo-Current-Update-ID",
                update.update_id.hyphenated().to_string(),
            );
        }
        if let Some(update) = embedded {
            headers.insert(
                "Expo-Embedded-Update-ID",
                update.update_id.hyphenated().to_string(),
            );
        }

        let failed = store.recent_failed_update_ids()?;
        if !failed.is_empty() {
            let list = failed
                .iter()
                .map(|id| format!("\"{}\"", id.hyphenated()))
                .collect::<Vec<_>>()
                .join(", ");
            headers.insert("Expo-Recent-Failed-Update-IDs", list);
        }

        Ok(headers)
    }
}
