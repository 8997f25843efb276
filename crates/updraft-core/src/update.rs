use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Asset, HeaderDictionary};

/// Lifecycle of a stored update.
///
/// `Pending` updates are missing at least one asset. Only `Ready`,
/// `Embedded` and `Development` updates are launchable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateStatus {
    Pending,
    Ready,
    Embedded,
    Development,
}

impl UpdateStatus {
    pub fn is_launchable(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Project identity bound to a signing certificate or declared by a payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectInformation {
    pub project_id: String,
    pub scope_key: String,
}

/// One launchable bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: Uuid,
    pub scope_key: String,
    pub commit_time: DateTime<Utc>,
    pub runtime_version: String,
    /// Raw manifest as received.
    pub manifest: Map<String, Value>,
    pub status: UpdateStatus,
    pub is_verified: bool,
    pub assets: Vec<Asset>,
}

impl Update {
    pub fn launch_asset(&self) -> Option<&Asset> {
        self.assets.iter().find(|a| a.is_launch_asset)
    }

    pub fn is_development(&self) -> bool {
        self.status == UpdateStatus::Development
    }

    /// Manifest `metadata` object, if any.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.manifest.get("metadata").and_then(Value::as_object)
    }

    /// Whether this update satisfies the server's manifest filters.
    ///
    /// A filter only constrains updates whose metadata carries the same key;
    /// absent keys pass.
    pub fn matches_filters(&self, filters: &HeaderDictionary) -> bool {
        let Some(metadata) = self.metadata() else {
            return true;
        };
        filters.iter().all(|(key, filter)| {
            metadata
                .get(key)
                .map_or(true, |value| filter.matches_json(value))
        })
    }

    /// Project identity the manifest declares about itself.
    ///
    /// Read from `extra.eas.projectId` and `extra.scopeKey`.
    pub fn declared_project(&self) -> Option<ProjectInformation> {
        let extra = self.manifest.get("extra")?.as_object()?;
        let project_id = extra
            .get("eas")
            .and_then(Value::as_object)
            .and_then(|eas| eas.get("projectId"))
            .and_then(Value::as_str)?;
        let scope_key = extra.get("scopeKey").and_then(Value::as_str)?;
        Some(ProjectInformation {
            project_id: project_id.to_string(),
            scope_key: scope_key.to_string(),
        })
    }
}
