use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use updraft_core::ProjectInformation;

use crate::{SigningError, SigningResult};

pub(crate) const DEFAULT_KEY_ID: &str = "root";

/// Signature algorithms the client can verify.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeSigningAlgorithm {
    #[default]
    #[serde(rename = "rsa-v1_5-sha256")]
    RsaV15Sha256,
}

impl CodeSigningAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RsaV15Sha256 => "rsa-v1_5-sha256",
        }
    }
}

impl FromStr for CodeSigningAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> SigningResult<Self> {
        match s {
            "rsa-v1_5-sha256" => Ok(Self::RsaV15Sha256),
            other => Err(SigningError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for CodeSigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key id and algorithm configured alongside the certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSigningMetadata {
    #[serde(rename = "keyid", default = "default_key_id")]
    pub key_id: String,
    #[serde(rename = "alg", default)]
    pub algorithm: CodeSigningAlgorithm,
}

fn default_key_id() -> String {
    DEFAULT_KEY_ID.to_string()
}

impl Default for CodeSigningMetadata {
    fn default() -> Self {
        Self {
            key_id: default_key_id(),
            algorithm: CodeSigningAlgorithm::default(),
        }
    }
}

impl CodeSigningMetadata {
    pub fn new(key_id: impl Into<String>, algorithm: CodeSigningAlgorithm) -> Self {
        Self {
            key_id: key_id.into(),
            algorithm,
        }
    }
}

/// Parsed `expo-signature` header of one response part.
///
/// `algorithm` is kept as received: a mismatch is logged, not rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeaderInfo {
    pub signature: String,
    pub key_id: String,
    pub algorithm: String,
}

impl SignatureHeaderInfo {
    /// Build from header fields; absent `keyid`/`alg` take their defaults.
    pub fn new(signature: impl Into<String>, key_id: Option<String>, algorithm: Option<String>) -> Self {
        Self {
            signature: signature.into(),
            key_id: key_id.unwrap_or_else(default_key_id),
            algorithm: algorithm
                .unwrap_or_else(|| CodeSigningAlgorithm::default().as_str().to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid,
    /// No code signing is configured, or unsigned payloads are allowed.
    Skipped,
}

/// Result of validating one signed part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureValidation {
    pub outcome: ValidationOutcome,
    /// Identity bound to the signing certificate, only set when `Valid`.
    pub project_information: Option<ProjectInformation>,
}

impl SignatureValidation {
    pub fn skipped() -> Self {
        Self {
            outcome: ValidationOutcome::Skipped,
            project_information: None,
        }
    }

    pub fn invalid() -> Self {
        Self {
            outcome: ValidationOutcome::Invalid,
            project_information: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.outcome == ValidationOutcome::Valid
    }
}
