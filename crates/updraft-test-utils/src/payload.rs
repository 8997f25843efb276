//! Manifest, multipart and signature builders.

use base64::{Engine, engine::general_purpose::STANDARD};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, pkcs8::DecodePrivateKey};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use updraft_core::sha256_base64url;
use url::Url;
use uuid::Uuid;

/// RSA-SHA256 signature of `body` with a PKCS#8 PEM key, base64 encoded.
pub fn sign(body: &[u8], key_pem: &str) -> String {
    let key = RsaPrivateKey::from_pkcs8_pem(key_pem).unwrap();
    let digest = Sha256::digest(body);
    STANDARD.encode(key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest).unwrap())
}

/// `expo-signature` header value.
pub fn signature_header(signature: &str, key_id: &str) -> String {
    format!(r#"sig="{signature}", keyid="{key_id}""#)
}

/// Builds manifest JSON. Asset hashes are computed from the bodies given.
#[derive(Clone, Debug)]
pub struct ManifestBuilder {
    id: Uuid,
    created_at: String,
    runtime_version: String,
    launch_asset: Value,
    assets: Vec<Value>,
    metadata: Option<Value>,
    extra: Option<Value>,
}

impl ManifestBuilder {
    /// `created_at` is an RFC 3339 timestamp.
    pub fn new(created_at: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: created_at.to_string(),
            runtime_version: "1".to_string(),
            launch_asset: json!({}),
            assets: Vec::new(),
            metadata: None,
            extra: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn runtime_version(mut self, runtime_version: &str) -> Self {
        self.runtime_version = runtime_version.to_string();
        self
    }

    #[must_use]
    pub fn launch_asset(mut self, key: &str, url: &Url, body: &[u8]) -> Self {
        self.launch_asset = json!({
            "key": key,
            "contentType": "application/javascript",
            "url": url.as_str(),
            "hash": sha256_base64url(body),
        });
        self
    }

    #[must_use]
    pub fn asset(mut self, key: &str, extension: &str, url: &Url, body: &[u8]) -> Self {
        self.assets.push(json!({
            "key": key,
            "contentType": "application/octet-stream",
            "fileExtension": extension,
            "url": url.as_str(),
            "hash": sha256_base64url(body),
        }));
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn build(&self) -> Value {
        let mut manifest = json!({
            "id": self.id,
            "createdAt": self.created_at,
            "runtimeVersion": self.runtime_version,
            "launchAsset": self.launch_asset,
            "assets": self.assets,
        });
        if let Some(metadata) = &self.metadata {
            manifest["metadata"] = metadata.clone();
        }
        if let Some(extra) = &self.extra {
            manifest["extra"] = extra.clone();
        }
        manifest
    }

    pub fn to_json(&self) -> String {
        self.build().to_string()
    }
}

/// Builds a `multipart/mixed` body.
#[derive(Clone, Debug, Default)]
pub struct MultipartBuilder {
    body: String,
}

impl MultipartBuilder {
    pub const BOUNDARY: &'static str = "updraft-test-boundary";

    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part named `name`, optionally with an `expo-signature` header.
    #[must_use]
    pub fn part(mut self, name: &str, body: &str, signature: Option<&str>) -> Self {
        self.body.push_str(&format!("--{}\r\n", Self::BOUNDARY));
        self.body.push_str("Content-Type: application/json\r\n");
        self.body
            .push_str(&format!("Content-Disposition: inline; name=\"{name}\"\r\n"));
        if let Some(signature) = signature {
            self.body.push_str(&format!("expo-signature: {signature}\r\n"));
        }
        self.body.push_str("\r\n");
        self.body.push_str(body);
        self.body.push_str("\r\n");
        self
    }

    pub fn content_type() -> String {
        format!("multipart/mixed; boundary={}", Self::BOUNDARY)
    }

    pub fn build(&self) -> String {
        format!("{}--{}--\r\n", self.body, Self::BOUNDARY)
    }
}
