use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// SHA-256 of `data`, encoded as unpadded base64url.
///
/// This is the encoding manifests use for `hash` fields.
pub fn sha256_base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(data))
}

/// Incremental variant of [`sha256_base64url`] for streamed bodies.
#[derive(Clone, Default)]
pub struct Sha256Base64Url {
    inner: Sha256,
}

impl Sha256Base64Url {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    #[must_use]
    pub fn finalize(self) -> String {
        URL_SAFE_NO_PAD.encode(self.inner.finalize())
    }
}
