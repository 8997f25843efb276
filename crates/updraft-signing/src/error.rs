use thiserror::Error;

/// Code-signing errors.
///
/// A signature that simply does not verify is not an error; it is reported
/// as [`crate::ValidationOutcome::Invalid`].
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("No certificate found in PEM input")]
    CertificateMissing,

    #[error("Certificate PEM could not be decoded: {0}")]
    CertificatePem(String),

    #[error("Certificate could not be parsed: {0}")]
    CertificateParse(String),

    #[error("Certificate is outside its validity window")]
    CertificateValidity,

    #[error("Certificate lacks the digital signature key usage")]
    CertificateDigitalSignatureNotPresent,

    #[error("Certificate lacks the code signing extended key usage")]
    CertificateMissingCodeSigning,

    #[error("Certificate chain is invalid: {0}")]
    CertificateChain(String),

    #[error("Certificate project information extension is malformed: {0}")]
    ProjectInformation(String),

    #[error("Unsupported public key: {0}")]
    PublicKey(String),

    #[error("Unsupported code signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("No expo-signature header specified")]
    SignatureHeaderMissing,

    #[error("Signature is not valid base64: {0}")]
    SignatureEncoding(String),

    #[error("Signature verification failed: {0}")]
    Verification(String),
}

pub type SigningResult<T> = Result<T, SigningError>;
