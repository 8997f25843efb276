#![forbid(unsafe_code)]

//! Decoding of manifest responses.
//!
//! A manifest request is answered with a plain JSON manifest, a legacy JSON
//! array of manifests, or a `multipart/mixed` body whose parts are named
//! `manifest`, `directive`, `extensions` and `certificate_chain`.
//! [`ResponseParser`] turns any of these into an [`UpdateResponse`], running
//! code signing and scope binding before a payload is returned.

mod directive;
mod error;
mod manifest;
mod multipart;
mod params;
mod parser;
mod response;
mod signature;
mod structured;

pub use directive::parse_directive;
pub use error::{ProtocolError, ProtocolResult};
pub use manifest::{ManifestExtensions, manifest_from_value, parse_manifest};
pub use multipart::{Part, split_multipart};
pub use params::parse_header_parameters;
pub use parser::{ParserOptions, ResponseParser};
pub use response::{
    MANIFEST_FILTERS_HEADER, PROTOCOL_VERSION_HEADER, ResponseHeaderData,
    SERVER_DEFINED_HEADERS_HEADER, SIGNATURE_HEADER, UpdateResponse,
};
pub use signature::parse_signature_header;
pub use structured::{
    BareItem, Member, parse_dictionary, parse_header_dictionary, serialize_string_dictionary,
};
