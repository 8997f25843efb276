//! Manifest payloads.
//!
//! ```json
//! {
//!   "id": "0754dad0-d200-d634-113c-ef1f26106028",
//!   "createdAt": "2024-01-15T09:30:00.000Z",
//!   "runtimeVersion": "1.0.0",
//!   "launchAsset": { "key": "bundle-a1", "contentType": "application/javascript",
//!                    "url": "https://cdn.example.com/bundle-a1", "hash": "..." },
//!   "assets": [ { "key": "img-1", "fileExtension": ".png", ... } ],
//!   "metadata": { "branch": "main" },
//!   "extra": { "eas": { "projectId": "..." }, "scopeKey": "@acme/app" }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use updraft_core::{Asset, Update, UpdateStatus};
use url::Url;
use uuid::Uuid;

use crate::{ProtocolError, ProtocolResult};

const LAUNCH_ASSET_EXTENSION: &str = ".bundle";
const LAUNCH_ASSET_CONTENT_TYPE: &str = "application/javascript";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestJson {
    id: Uuid,
    created_at: DateTime<Utc>,
    runtime_version: String,
    launch_asset: AssetJson,
    #[serde(default)]
    assets: Vec<AssetJson>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetJson {
    key: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    url: Option<Url>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    file_extension: Option<String>,
    #[serde(default)]
    embedded_filename: Option<String>,
}

/// Contents of the `extensions` multipart part.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestExtensions {
    /// Per asset key, headers to send when fetching that asset.
    #[serde(default)]
    pub asset_request_headers: BTreeMap<String, BTreeMap<String, String>>,
}

impl ManifestExtensions {
    pub fn from_slice(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Extensions(e.to_string()))
    }

    /// Attach request headers to the matching assets of `update`.
    pub fn apply(&self, update: &mut Update) {
        for asset in &mut update.assets {
            if let Some(headers) = self.asset_request_headers.get(&asset.key) {
                asset
                    .extra_request_headers
                    .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
    }
}

/// Parse a manifest body into a `Pending` (or `Development`) update.
pub fn parse_manifest(bytes: &[u8], scope_key: &str) -> ProtocolResult<Update> {
    let value: Value = serde_json::from_slice(bytes)?;
    manifest_from_value(value, scope_key)
}

/// Build an update from an already decoded manifest object.
pub fn manifest_from_value(value: Value, scope_key: &str) -> ProtocolResult<Update> {
    let Value::Object(raw) = value else {
        return Err(ProtocolError::InvalidManifest("manifest is not a JSON object".into()));
    };
    let parsed: ManifestJson = serde_json::from_value(Value::Object(raw.clone()))?;

    let mut seen = HashSet::new();
    let mut assets = Vec::with_capacity(parsed.assets.len() + 1);

    let launch = build_asset(parsed.launch_asset, true)?;
    seen.insert(launch.key.clone());
    assets.push(launch);

    for json in parsed.assets {
        let asset = build_asset(json, false)?;
        if !seen.insert(asset.key.clone()) {
            tracing::warn!(key = %asset.key, "duplicate asset key in manifest; keeping first");
            continue;
        }
        assets.push(asset);
    }

    let status = if is_development(&raw) {
        UpdateStatus::Development
    } else {
        UpdateStatus::Pending
    };

    Ok(Update {
        update_id: parsed.id,
        scope_key: scope_key.to_string(),
        commit_time: parsed.created_at,
        runtime_version: parsed.runtime_version,
        manifest: raw,
        status,
        is_verified: false,
        assets,
    })
}

fn is_development(raw: &Map<String, Value>) -> bool {
    raw.get("extra")
        .and_then(|e| e.get("expoGo"))
        .and_then(|g| g.get("developer"))
        .is_some()
}

fn build_asset(json: AssetJson, is_launch_asset: bool) -> ProtocolResult<Asset> {
    validate_path_component(&json.key, "asset key")?;

    let extension = match json.file_extension.as_deref().map(str::trim) {
        Some("") | None if is_launch_asset => LAUNCH_ASSET_EXTENSION.to_string(),
        Some("") | None => String::new(),
        Some(ext) if ext.starts_with('.') => ext.to_string(),
        Some(ext) => format!(".{ext}"),
    };
    if extension.contains(['/', '\\']) {
        return Err(ProtocolError::InvalidManifest(format!(
            "invalid file extension {extension:?}"
        )));
    }
    if let Some(name) = &json.embedded_filename {
        validate_path_component(name, "embedded filename")?;
    }

    let content_type = json.content_type.unwrap_or_else(|| {
        if is_launch_asset {
            LAUNCH_ASSET_CONTENT_TYPE.to_string()
        } else {
            "application/octet-stream".to_string()
        }
    });

    let mut asset = Asset::new(json.key.clone(), format!("{}{extension}", json.key))
        .with_content_type(content_type);
    asset.url = json.url;
    asset.expected_hash = json.hash;
    asset.embedded_filename = json.embedded_filename;
    asset.is_launch_asset = is_launch_asset;
    Ok(asset)
}

/// Reject names that could escape the updates directory.
fn validate_path_component(name: &str, what: &str) -> ProtocolResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(ProtocolError::InvalidManifest(format!("invalid {what} {name:?}")));
    }
    Ok(())
}
