use thiserror::Error;
use updraft_signing::SigningError;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("response has no body and no protocol version header")]
    MissingBody,

    #[error("multipart response is missing a boundary parameter")]
    MissingMultipartBoundary,

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("multipart response is missing the manifest part")]
    MultipartMissingManifest,

    #[error("multipart response has neither a manifest nor a directive part")]
    MissingParts,

    #[error("malformed structured header: {0}")]
    StructuredHeader(String),

    #[error("malformed signature header: {0}")]
    SignatureHeader(String),

    #[error("manifest is not valid JSON: {0}")]
    ManifestJson(#[from] serde_json::Error),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid directive: {0}")]
    InvalidDirective(String),

    #[error("invalid extensions part: {0}")]
    Extensions(String),

    #[error("certificate chain part is not valid UTF-8")]
    CertificateChainEncoding,

    #[error("no manifest in the response targets runtime version {0}")]
    NoCompatibleUpdate(String),

    #[error("{part} signature did not verify")]
    SignatureInvalid { part: &'static str },

    #[error("signing certificate project does not match the {part}")]
    CertificateScopeMismatch { part: &'static str },

    #[error("manifest does not satisfy the response manifest filters")]
    MismatchedManifestFilters,

    #[error(transparent)]
    Signing(#[from] SigningError),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl ProtocolError {
    /// Trust failures: the payload was received intact but must not be used.
    pub fn is_trust_failure(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid { .. }
                | Self::CertificateScopeMismatch { .. }
                | Self::Signing(_)
        )
    }
}
