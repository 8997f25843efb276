use rsa::{RsaPublicKey, pkcs8::DecodePublicKey};
use updraft_core::ProjectInformation;
use x509_parser::{pem::Pem, prelude::*};

use crate::{SigningError, SigningResult};

/// Private extension carrying `"<project id>,<scope key>"`.
const PROJECT_INFORMATION_OID: &str = "1.2.840.113556.1.8000.2554.43437.254.128.102.157.7894.3";

/// DER tag of an ASN.1 UTF8String.
const UTF8_STRING_TAG: u8 = 0x0c;

/// Owned DER certificate.
///
/// Parsing borrows from the DER bytes, so each check re-parses; certificates
/// are small and checked a handful of times per response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    pub(crate) fn from_der(der: Vec<u8>) -> SigningResult<Self> {
        let cert = Self { der };
        cert.parsed()?;
        Ok(cert)
    }

    /// All `CERTIFICATE` blocks of a PEM document, in order.
    pub(crate) fn parse_pem_chain(pem: &str) -> SigningResult<Vec<Self>> {
        let mut certs = Vec::new();
        for block in Pem::iter_from_buffer(pem.as_bytes()) {
            let block = block.map_err(|e| SigningError::CertificatePem(e.to_string()))?;
            if block.label != "CERTIFICATE" {
                continue;
            }
            certs.push(Self::from_der(block.contents)?);
        }
        if certs.is_empty() {
            return Err(SigningError::CertificateMissing);
        }
        Ok(certs)
    }

    fn parsed(&self) -> SigningResult<X509Certificate<'_>> {
        parse_x509_certificate(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|e| SigningError::CertificateParse(e.to_string()))
    }

    pub(crate) fn check_validity(&self) -> SigningResult<()> {
        if self.parsed()?.validity().is_valid() {
            Ok(())
        } else {
            Err(SigningError::CertificateValidity)
        }
    }

    /// Digital-signature key usage and code-signing extended key usage.
    pub(crate) fn check_code_signing(&self) -> SigningResult<()> {
        let cert = self.parsed()?;

        let digital_signature = cert
            .key_usage()
            .map_err(|e| SigningError::CertificateParse(e.to_string()))?
            .is_some_and(|ku| ku.value.digital_signature());
        if !digital_signature {
            return Err(SigningError::CertificateDigitalSignatureNotPresent);
        }

        let code_signing = cert
            .extended_key_usage()
            .map_err(|e| SigningError::CertificateParse(e.to_string()))?
            .is_some_and(|eku| eku.value.code_signing);
        if !code_signing {
            return Err(SigningError::CertificateMissingCodeSigning);
        }

        Ok(())
    }

    pub(crate) fn is_ca(&self) -> SigningResult<bool> {
        Ok(self
            .parsed()?
            .basic_constraints()
            .map_err(|e| SigningError::CertificateParse(e.to_string()))?
            .is_some_and(|bc| bc.value.ca))
    }

    pub(crate) fn rsa_public_key(&self) -> SigningResult<RsaPublicKey> {
        let cert = self.parsed()?;
        RsaPublicKey::from_public_key_der(cert.public_key().raw)
            .map_err(|e| SigningError::PublicKey(e.to_string()))
    }

    /// Check that `issuer`'s key signed this certificate.
    pub(crate) fn verify_issued_by(&self, issuer: &Certificate) -> SigningResult<()> {
        let issuer = issuer.parsed()?;
        self.parsed()?
            .verify_signature(Some(issuer.public_key()))
            .map_err(|e| SigningError::CertificateChain(format!("signature check: {e}")))
    }

    pub(crate) fn project_information(&self) -> SigningResult<Option<ProjectInformation>> {
        let cert = self.parsed()?;
        let Some(ext) = cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == PROJECT_INFORMATION_OID)
        else {
            return Ok(None);
        };

        let raw = unwrap_utf8_string(ext.value);
        let text = std::str::from_utf8(raw)
            .map_err(|e| SigningError::ProjectInformation(e.to_string()))?;
        let (project_id, scope_key) = text
            .split_once(',')
            .ok_or_else(|| SigningError::ProjectInformation(format!("expected two components in {text:?}")))?;
        if project_id.is_empty() || scope_key.is_empty() || scope_key.contains(',') {
            return Err(SigningError::ProjectInformation(format!(
                "expected two components in {text:?}"
            )));
        }

        Ok(Some(ProjectInformation {
            project_id: project_id.to_string(),
            scope_key: scope_key.to_string(),
        }))
    }
}

/// Strip a short-form UTF8String wrapper if the value carries one.
fn unwrap_utf8_string(value: &[u8]) -> &[u8] {
    match value {
        [UTF8_STRING_TAG, len, rest @ ..] if usize::from(*len) == rest.len() && *len < 0x80 => rest,
        _ => value,
    }
}
