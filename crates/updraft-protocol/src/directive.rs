//! Directive payloads.
//!
//! `{"type": "rollBackToEmbedded", "parameters": {"commitTime": "..."},
//!   "extra": {"signingInfo": {"projectId": "...", "scopeKey": "..."}}}`

use chrono::{DateTime, Utc};
use serde::Deserialize;
use updraft_core::{ProjectInformation, UpdateDirective};

use crate::{ProtocolError, ProtocolResult};

#[derive(Deserialize)]
struct DirectiveJson {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    parameters: Option<ParametersJson>,
    #[serde(default)]
    extra: Option<ExtraJson>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParametersJson {
    #[serde(default)]
    commit_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtraJson {
    #[serde(default)]
    signing_info: Option<SigningInfoJson>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SigningInfoJson {
    project_id: String,
    scope_key: String,
}

pub fn parse_directive(bytes: &[u8]) -> ProtocolResult<UpdateDirective> {
    let json: DirectiveJson =
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::InvalidDirective(e.to_string()))?;

    let signing_info = json.extra.and_then(|e| e.signing_info).map(|s| ProjectInformation {
        project_id: s.project_id,
        scope_key: s.scope_key,
    });

    match json.kind.as_str() {
        "noUpdateAvailable" => Ok(UpdateDirective::NoUpdateAvailable { signing_info }),
        "rollBackToEmbedded" => {
            let commit_time = json
                .parameters
                .and_then(|p| p.commit_time)
                .ok_or_else(|| {
                    ProtocolError::InvalidDirective("rollBackToEmbedded without commitTime".into())
                })?;
            Ok(UpdateDirective::RollBackToEmbedded {
                commit_time,
                signing_info,
            })
        }
        other => Err(ProtocolError::InvalidDirective(format!(
            "unknown directive type {other:?}"
        ))),
    }
}
