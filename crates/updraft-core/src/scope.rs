use url::Url;

use crate::{CoreError, CoreResult};

/// Derive the default scope key from an update URL.
///
/// The scope is the canonical origin: lowercase scheme and host, default
/// ports removed, no path, query or fragment.
pub fn scope_key_from_url(url: &Url) -> CoreResult<String> {
    if url.host_str().is_none() {
        return Err(CoreError::MissingComponent(format!("host in {url}")));
    }

    // The parser already lowercases scheme/host and drops default ports.
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(CoreError::Canonicalization(format!("opaque origin for {url}")));
    }
    Ok(origin.ascii_serialization())
}
