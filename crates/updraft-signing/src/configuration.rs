use base64::{Engine, engine::general_purpose::STANDARD};
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};
use updraft_core::ProjectInformation;

use crate::{
    SigningError, SigningResult,
    certificate::Certificate,
    types::{CodeSigningMetadata, SignatureHeaderInfo, SignatureValidation, ValidationOutcome},
};

/// Immutable trust anchor used to verify response parts.
#[derive(Clone, Debug)]
pub struct CodeSigningConfiguration {
    certificate: Certificate,
    metadata: CodeSigningMetadata,
    include_manifest_response_certificate_chain: bool,
    allow_unsigned_manifests: bool,
}

/// Key and identity that verify a given payload.
struct VerifyingKey {
    public_key: RsaPublicKey,
    project_information: Option<ProjectInformation>,
}

impl CodeSigningConfiguration {
    /// Load the configured certificate.
    ///
    /// # Errors
    ///
    /// Fails if the PEM holds no parseable certificate, if the certificate is
    /// outside its validity window, or if it lacks the usages required to
    /// sign payloads (or, with `include_manifest_response_certificate_chain`,
    /// to act as a CA root).
    pub fn new(
        certificate_pem: &str,
        metadata: CodeSigningMetadata,
        include_manifest_response_certificate_chain: bool,
        allow_unsigned_manifests: bool,
    ) -> SigningResult<Self> {
        let certificate = Certificate::parse_pem_chain(certificate_pem)?.remove(0);
        certificate.check_validity()?;

        if include_manifest_response_certificate_chain {
            if !certificate.is_ca()? {
                return Err(SigningError::CertificateChain(
                    "configured root certificate is not a CA".to_string(),
                ));
            }
        } else {
            certificate.check_code_signing()?;
            certificate.rsa_public_key()?;
        }

        Ok(Self {
            certificate,
            metadata,
            include_manifest_response_certificate_chain,
            allow_unsigned_manifests,
        })
    }

    pub fn metadata(&self) -> &CodeSigningMetadata {
        &self.metadata
    }

    pub fn include_manifest_response_certificate_chain(&self) -> bool {
        self.include_manifest_response_certificate_chain
    }

    pub fn allow_unsigned_manifests(&self) -> bool {
        self.allow_unsigned_manifests
    }

    /// Value of the `expo-expect-signature` request header.
    pub fn accept_signature_header(&self) -> String {
        format!(
            "sig, keyid=\"{}\", alg=\"{}\"",
            self.metadata.key_id.replace('\\', "\\\\").replace('"', "\\\""),
            self.metadata.algorithm.as_str()
        )
    }

    /// Verify `signed_bytes` against the signature header of its part.
    ///
    /// `certificate_chain` is the PEM `certificate_chain` part of the
    /// response; it is only consulted when chain mode is configured.
    ///
    /// # Errors
    ///
    /// A missing header (unless unsigned manifests are allowed), an invalid
    /// certificate chain, an undecodable signature, and verification
    /// failures other than a signature mismatch are errors. A signature that
    /// does not verify yields [`ValidationOutcome::Invalid`].
    pub fn validate(
        &self,
        header: Option<&SignatureHeaderInfo>,
        signed_bytes: &[u8],
        certificate_chain: Option<&str>,
    ) -> SigningResult<SignatureValidation> {
        let Some(header) = header else {
            if self.allow_unsigned_manifests {
                tracing::debug!("unsigned part accepted by configuration");
                return Ok(SignatureValidation::skipped());
            }
            return Err(SigningError::SignatureHeaderMissing);
        };

        if header.key_id != self.metadata.key_id {
            tracing::warn!(
                expected = %self.metadata.key_id,
                received = %header.key_id,
                "signature key id does not match configuration"
            );
            return Ok(SignatureValidation::invalid());
        }

        if header.algorithm != self.metadata.algorithm.as_str() {
            tracing::warn!(
                configured = %self.metadata.algorithm,
                declared = %header.algorithm,
                "signature algorithm mismatch; verifying with configured algorithm"
            );
        }

        let key = self.verifying_key(certificate_chain)?;

        let signature = STANDARD
            .decode(header.signature.trim())
            .map_err(|e| SigningError::SignatureEncoding(e.to_string()))?;
        let digest = Sha256::digest(signed_bytes);

        match key
            .public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        {
            Ok(()) => {
                tracing::trace!(bytes = signed_bytes.len(), "signature valid");
                Ok(SignatureValidation {
                    outcome: ValidationOutcome::Valid,
                    project_information: key.project_information,
                })
            }
            Err(rsa::Error::Verification) => {
                tracing::warn!(bytes = signed_bytes.len(), "signature invalid");
                Ok(SignatureValidation::invalid())
            }
            Err(e) => Err(SigningError::Verification(e.to_string())),
        }
    }

    fn verifying_key(&self, certificate_chain: Option<&str>) -> SigningResult<VerifyingKey> {
        if !self.include_manifest_response_certificate_chain {
            return Ok(VerifyingKey {
                public_key: self.certificate.rsa_public_key()?,
                project_information: self.certificate.project_information()?,
            });
        }

        let chain = certificate_chain.ok_or_else(|| {
            SigningError::CertificateChain("response carries no certificate chain".to_string())
        })?;
        let leaf = self.validate_chain(chain)?;
        Ok(VerifyingKey {
            public_key: leaf.rsa_public_key()?,
            project_information: leaf.project_information()?,
        })
    }

    /// Walk a leaf-first chain up to the configured root.
    fn validate_chain(&self, chain_pem: &str) -> SigningResult<Certificate> {
        let mut chain = Certificate::parse_pem_chain(chain_pem)?;
        if chain.last() != Some(&self.certificate) {
            chain.push(self.certificate.clone());
        }

        for (index, cert) in chain.iter().enumerate() {
            cert.check_validity()?;
            if index > 0 && !cert.is_ca()? {
                return Err(SigningError::CertificateChain(format!(
                    "certificate {index} is not a CA"
                )));
            }
            if let Some(issuer) = chain.get(index + 1) {
                cert.verify_issued_by(issuer)?;
            }
        }

        let leaf = chain.swap_remove(0);
        leaf.check_code_signing()?;
        Ok(leaf)
    }
}

/// Validate against an optional configuration.
///
/// Without a configuration, trust is not required and every part is
/// [`ValidationOutcome::Skipped`].
pub fn validate(
    configuration: Option<&CodeSigningConfiguration>,
    header: Option<&SignatureHeaderInfo>,
    signed_bytes: &[u8],
    certificate_chain: Option<&str>,
) -> SigningResult<SignatureValidation> {
    match configuration {
        Some(configuration) => configuration.validate(header, signed_bytes, certificate_chain),
        None => Ok(SignatureValidation::skipped()),
    }
}
