use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// One file referenced by an update.
///
/// `key` is content-addressing: two updates declaring the same key share a
/// single stored file. The `content_hash`, `download_time` and
/// `response_headers` fields are only set once the file has been resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub key: String,
    /// File name relative to the updates directory.
    pub filename: String,
    pub content_type: String,
    pub url: Option<Url>,
    /// Base64url SHA-256 declared by the manifest.
    pub expected_hash: Option<String>,
    /// Headers to send when fetching this asset.
    #[serde(default)]
    pub extra_request_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub is_launch_asset: bool,
    /// File name inside the embedded bundle, when it differs from `filename`.
    #[serde(default)]
    pub embedded_filename: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub download_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_headers: Option<BTreeMap<String, String>>,
}

impl Asset {
    pub fn new(key: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            filename: filename.into(),
            content_type: "application/octet-stream".to_string(),
            url: None,
            expected_hash: None,
            extra_request_headers: BTreeMap::new(),
            is_launch_asset: false,
            embedded_filename: None,
            content_hash: None,
            download_time: None,
            response_headers: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    #[must_use]
    pub fn with_expected_hash(mut self, hash: impl Into<String>) -> Self {
        self.expected_hash = Some(hash.into());
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn launch_asset(mut self) -> Self {
        self.is_launch_asset = true;
        self
    }

    /// Name to look up inside an embedded bundle.
    pub fn bundle_filename(&self) -> &str {
        self.embedded_filename.as_deref().unwrap_or(&self.filename)
    }

    /// Merge manifest-declared fields from `declared` into this stored entry.
    ///
    /// Identity (`key`, `filename`, resolved hash and download time) stays
    /// with `self`; request details follow the newer manifest.
    pub fn merge_declared(&mut self, declared: &Asset) {
        if declared.url.is_some() {
            self.url.clone_from(&declared.url);
        }
        if declared.expected_hash.is_some() {
            self.expected_hash.clone_from(&declared.expected_hash);
        }
        if !declared.extra_request_headers.is_empty() {
            self.extra_request_headers
                .clone_from(&declared.extra_request_headers);
        }
        if declared.embedded_filename.is_some() {
            self.embedded_filename.clone_from(&declared.embedded_filename);
        }
        self.content_type.clone_from(&declared.content_type);
        self.is_launch_asset = declared.is_launch_asset;
    }
}
