use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProjectInformation;

/// Server instruction returned instead of a manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum UpdateDirective {
    /// Nothing newer is available for this client.
    NoUpdateAvailable {
        signing_info: Option<ProjectInformation>,
    },
    /// Abandon remote updates and launch the embedded one, treating it as
    /// committed at `commit_time`.
    RollBackToEmbedded {
        commit_time: DateTime<Utc>,
        signing_info: Option<ProjectInformation>,
    },
}

impl UpdateDirective {
    /// Project identity the directive declares, used for certificate binding.
    pub fn signing_info(&self) -> Option<&ProjectInformation> {
        match self {
            Self::NoUpdateAvailable { signing_info }
            | Self::RollBackToEmbedded { signing_info, .. } => signing_info.as_ref(),
        }
    }
}
