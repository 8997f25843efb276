#![forbid(unsafe_code)]

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use updraft_core::Asset;
use updraft_net::Headers;
use updraft_protocol::{ResponseParser, UpdateResponse};
use updraft_store::UpdatesStore;
use url::Url;

use crate::{
    FileDownloader, LoaderError, LoaderResult,
    strategy::{LoaderStrategy, resolved},
};

/// Loads an update from the update server.
pub struct RemoteStrategy {
    downloader: Arc<FileDownloader>,
    parser: ResponseParser,
    store: Arc<dyn UpdatesStore>,
    update_url: Url,
    extra_headers: Headers,
    fatal_error: Option<String>,
}

impl RemoteStrategy {
    pub fn new(
        downloader: Arc<FileDownloader>,
        parser: ResponseParser,
        store: Arc<dyn UpdatesStore>,
        update_url: Url,
    ) -> Self {
        Self {
            downloader,
            parser,
            store,
            update_url,
            extra_headers: Headers::new(),
            fatal_error: None,
        }
    }

    /// Store-derived headers for the manifest request.
    pub fn with_extra_headers(mut self, headers: Headers) -> Self {
        self.extra_headers = headers;
        self
    }

    /// Description of the previous run's fatal error, sent as a diagnostic.
    pub fn with_fatal_error(mut self, fatal_error: Option<String>) -> Self {
        self.fatal_error = fatal_error;
        self
    }
}

#[async_trait]
impl LoaderStrategy for RemoteStrategy {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load_update_response(&self) -> LoaderResult<UpdateResponse> {
        let response = self
            .downloader
            .download_remote_update(
                &self.update_url,
                &self.extra_headers,
                self.fatal_error.as_deref(),
                &self.parser,
            )
            .await?;

        let header_data = &response.header_data;
        self.store.set_metadata(
            &self.parser.options().scope_key,
            header_data.server_defined_headers.as_ref(),
            header_data.manifest_filters.as_ref(),
        )?;
        Ok(response)
    }

    async fn download_asset(&self, asset: Asset, updates_dir: &Path) -> LoaderResult<Asset> {
        let url = asset
            .url
            .clone()
            .ok_or_else(|| LoaderError::MissingAssetUrl(asset.key.clone()))?;
        let headers: Headers = asset
            .extra_request_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let dest = updates_dir.join(&asset.filename);

        let (_, hash) = self
            .downloader
            .fetch_and_hash_to_path(url, asset.expected_hash.as_deref(), &dest, &headers)
            .await?;
        Ok(resolved(asset, hash))
    }
}
