#![forbid(unsafe_code)]

//! Code-signing support for updraft.
//!
//! A [`CodeSigningConfiguration`] is the trust anchor loaded once from
//! configuration. Each manifest or directive part arrives with an
//! `expo-signature` header, parsed into a [`SignatureHeaderInfo`], and is
//! checked with [`CodeSigningConfiguration::validate`].
//!
//! # Certificates
//!
//! The configured certificate must be within its validity window and carry
//! both the digital-signature key usage and the code-signing extended key
//! usage. When the response may carry its own certificate chain, the
//! configured certificate is instead a CA root and the usage checks apply to
//! the chain's leaf.
//!
//! Certificates may bind a project identity through a private extension; the
//! identity is returned with a valid signature so callers can compare it with
//! what the payload declares.

mod certificate;
mod configuration;
mod error;
mod types;

pub use configuration::{CodeSigningConfiguration, validate};
pub use error::{SigningError, SigningResult};
pub use types::{
    CodeSigningAlgorithm, CodeSigningMetadata, SignatureHeaderInfo, SignatureValidation,
    ValidationOutcome,
};
