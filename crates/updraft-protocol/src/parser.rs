use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use updraft_core::Update;
use updraft_net::HttpResponse;
use updraft_signing::{CodeSigningConfiguration, SignatureValidation};

use crate::{
    ProtocolError, ProtocolResult,
    directive::parse_directive,
    manifest::{ManifestExtensions, manifest_from_value},
    multipart::{Part, split_multipart},
    params::parse_header_parameters,
    response::{ResponseHeaderData, SIGNATURE_HEADER, UpdateResponse},
    signature::parse_signature_header,
};

/// Settings that shape how responses are decoded and trusted.
#[derive(Clone, Debug)]
pub struct ParserOptions {
    /// Scope assigned to parsed updates.
    pub scope_key: String,
    /// Used to select among legacy manifest arrays.
    pub runtime_version: String,
    /// Require a manifest part and ignore directives.
    pub v0_compatible: bool,
    pub code_signing: Option<Arc<CodeSigningConfiguration>>,
}

/// Decodes manifest responses into [`UpdateResponse`]s.
///
/// Every manifest or directive that comes out of the parser has passed code
/// signing (when configured), certificate scope binding, and manifest
/// filters. Any failure rejects the whole response.
#[derive(Clone, Debug)]
pub struct ResponseParser {
    options: ParserOptions,
}

#[derive(Default)]
struct NamedParts {
    manifest: Option<Part>,
    directive: Option<Part>,
    extensions: Option<Part>,
    certificate_chain: Option<Part>,
}

impl ResponseParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Decode a complete HTTP response.
    ///
    /// # Errors
    ///
    /// Malformed bodies, missing parts, and trust failures. A `204` or empty
    /// body is only accepted when the server declared a protocol version.
    pub fn parse(&self, response: &HttpResponse) -> ProtocolResult<UpdateResponse> {
        let header_data = ResponseHeaderData::from_headers(&response.headers);

        if response.status == 204 || response.body.is_empty() {
            if header_data.protocol_version.is_some() {
                tracing::debug!(status = response.status, "no-content manifest response");
                return Ok(UpdateResponse::empty(header_data));
            }
            return Err(ProtocolError::MissingBody);
        }

        let content_type = response.headers.get("content-type").unwrap_or_default();
        let (media_type, params) = parse_header_parameters(content_type);

        if media_type.to_ascii_lowercase().starts_with("multipart/") {
            let boundary = params
                .get("boundary")
                .filter(|b| !b.is_empty())
                .ok_or(ProtocolError::MissingMultipartBoundary)?;
            self.parse_multipart(&response.body, boundary, header_data)
        } else {
            let manifest =
                self.parse_single(&response.body, response.headers.get(SIGNATURE_HEADER), &header_data)?;
            Ok(UpdateResponse {
                header_data,
                manifest_part: Some(manifest),
                directive_part: None,
            })
        }
    }

    fn parse_multipart(
        &self,
        body: &Bytes,
        boundary: &str,
        header_data: ResponseHeaderData,
    ) -> ProtocolResult<UpdateResponse> {
        let parts = split_multipart(body, boundary)?;
        if parts.is_empty() {
            return Ok(UpdateResponse::empty(header_data));
        }

        let mut named = NamedParts::default();
        for part in parts {
            match part.name().as_deref() {
                Some("manifest") => named.manifest = Some(part),
                Some("directive") => named.directive = Some(part),
                Some("extensions") => named.extensions = Some(part),
                Some("certificate_chain") => named.certificate_chain = Some(part),
                other => tracing::debug!(name = ?other, "ignoring multipart part"),
            }
        }

        let extensions = named
            .extensions
            .map(|p| ManifestExtensions::from_slice(&p.body))
            .transpose()?
            .unwrap_or_default();
        let chain = named
            .certificate_chain
            .map(|p| String::from_utf8(p.body.to_vec()))
            .transpose()
            .map_err(|_| ProtocolError::CertificateChainEncoding)?;

        if self.options.v0_compatible {
            if named.manifest.is_none() {
                return Err(ProtocolError::MultipartMissingManifest);
            }
            named.directive = None;
        }

        let manifest_part = named
            .manifest
            .map(|part| -> ProtocolResult<Update> {
                let validation = self.verify(
                    "manifest",
                    part.headers.get(SIGNATURE_HEADER),
                    &part.body,
                    chain.as_deref(),
                )?;
                let value: Value = serde_json::from_slice(&part.body)?;
                let update = manifest_from_value(value, &self.options.scope_key)?;
                finish_manifest(update, &validation, &header_data, &extensions)
            })
            .transpose()?;

        let directive_part = named
            .directive
            .map(|part| -> ProtocolResult<_> {
                let validation = self.verify(
                    "directive",
                    part.headers.get(SIGNATURE_HEADER),
                    &part.body,
                    chain.as_deref(),
                )?;
                let directive = parse_directive(&part.body)?;
                if let Some(info) = &validation.project_information {
                    if directive.signing_info() != Some(info) {
                        return Err(ProtocolError::CertificateScopeMismatch { part: "directive" });
                    }
                }
                Ok(directive)
            })
            .transpose()?;

        if manifest_part.is_none() && directive_part.is_none() {
            return Err(ProtocolError::MissingParts);
        }

        Ok(UpdateResponse {
            header_data,
            manifest_part,
            directive_part,
        })
    }

    /// Plain JSON body: one manifest, or a legacy array of candidates.
    fn parse_single(
        &self,
        body: &[u8],
        signature: Option<&str>,
        header_data: &ResponseHeaderData,
    ) -> ProtocolResult<Update> {
        let validation = self.verify("manifest", signature, body, None)?;
        let value: Value = serde_json::from_slice(body)?;

        let value = match value {
            Value::Array(candidates) => {
                let runtime_version = self.options.runtime_version.as_str();
                candidates
                    .into_iter()
                    .find(|c| c.get("runtimeVersion").and_then(Value::as_str) == Some(runtime_version))
                    .ok_or_else(|| ProtocolError::NoCompatibleUpdate(runtime_version.to_string()))?
            }
            other => other,
        };

        let update = manifest_from_value(value, &self.options.scope_key)?;
        finish_manifest(update, &validation, header_data, &ManifestExtensions::default())
    }

    fn verify(
        &self,
        part: &'static str,
        signature: Option<&str>,
        signed: &[u8],
        chain: Option<&str>,
    ) -> ProtocolResult<SignatureValidation> {
        let configuration = self.options.code_signing.as_deref();
        let header = match (configuration, signature) {
            (Some(_), Some(raw)) => Some(parse_signature_header(raw)?),
            _ => None,
        };

        let validation = updraft_signing::validate(configuration, header.as_ref(), signed, chain)?;
        if validation.outcome == updraft_signing::ValidationOutcome::Invalid {
            tracing::warn!(part, "signature verification failed");
            return Err(ProtocolError::SignatureInvalid { part });
        }
        Ok(validation)
    }
}

fn finish_manifest(
    mut update: Update,
    validation: &SignatureValidation,
    header_data: &ResponseHeaderData,
    extensions: &ManifestExtensions,
) -> ProtocolResult<Update> {
    if let Some(info) = &validation.project_information {
        if update.declared_project().as_ref() != Some(info) {
            return Err(ProtocolError::CertificateScopeMismatch { part: "manifest" });
        }
    }
    update.is_verified = validation.is_valid();
    extensions.apply(&mut update);

    if !update.matches_filters(&header_data.filters()) {
        return Err(ProtocolError::MismatchedManifestFilters);
    }
    Ok(update)
}
