use updraft_core::{HeaderDictionary, Update, UpdateDirective};
use updraft_net::Headers;

use crate::structured::parse_header_dictionary;

pub const PROTOCOL_VERSION_HEADER: &str = "expo-protocol-version";
pub const SERVER_DEFINED_HEADERS_HEADER: &str = "expo-server-defined-headers";
pub const MANIFEST_FILTERS_HEADER: &str = "expo-manifest-filters";
pub const SIGNATURE_HEADER: &str = "expo-signature";

/// Metadata carried by the headers of a manifest response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseHeaderData {
    pub protocol_version: Option<i64>,
    /// Headers to echo on future manifest requests.
    pub server_defined_headers: Option<HeaderDictionary>,
    pub manifest_filters: Option<HeaderDictionary>,
}

impl ResponseHeaderData {
    /// Extract header data. Malformed values are logged and treated as absent.
    pub fn from_headers(headers: &Headers) -> Self {
        let protocol_version = headers.get(PROTOCOL_VERSION_HEADER).and_then(|v| {
            v.trim()
                .parse::<i64>()
                .map_err(|_| tracing::warn!(value = v, "ignoring malformed protocol version"))
                .ok()
        });

        Self {
            protocol_version,
            server_defined_headers: dictionary(headers, SERVER_DEFINED_HEADERS_HEADER),
            manifest_filters: dictionary(headers, MANIFEST_FILTERS_HEADER),
        }
    }

    /// Filters to apply, empty when the server sent none.
    pub fn filters(&self) -> HeaderDictionary {
        self.manifest_filters.clone().unwrap_or_default()
    }
}

fn dictionary(headers: &Headers, name: &str) -> Option<HeaderDictionary> {
    let raw = headers.get(name)?;
    match parse_header_dictionary(raw) {
        Ok(dict) => Some(dict),
        Err(e) => {
            tracing::warn!(header = name, error = %e, "ignoring malformed structured header");
            None
        }
    }
}

/// Decoded manifest response.
///
/// At most one of `manifest_part` and `directive_part` is meaningful; both
/// are `None` for a "no content" response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateResponse {
    pub header_data: ResponseHeaderData,
    pub manifest_part: Option<Update>,
    pub directive_part: Option<UpdateDirective>,
}

impl UpdateResponse {
    pub fn empty(header_data: ResponseHeaderData) -> Self {
        Self {
            header_data,
            manifest_part: None,
            directive_part: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.manifest_part.is_none() && self.directive_part.is_none()
    }
}
