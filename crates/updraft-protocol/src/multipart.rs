//! `multipart/mixed` body splitting.

use bytes::Bytes;
use updraft_net::Headers;

use crate::{ProtocolError, ProtocolResult, params::parse_header_parameters};

/// One part of a multipart body.
#[derive(Clone, Debug)]
pub struct Part {
    pub headers: Headers,
    pub body: Bytes,
}

impl Part {
    /// `name` parameter of the part's `content-disposition` header.
    pub fn name(&self) -> Option<String> {
        let disposition = self.headers.get("content-disposition")?;
        let (_, mut params) = parse_header_parameters(disposition);
        params.remove("name")
    }
}

const CRLF: &[u8] = b"\r\n";

/// Split `body` on `boundary`.
///
/// An empty body yields no parts. Part bodies are zero-copy slices of `body`.
pub fn split_multipart(body: &Bytes, boundary: &str) -> ProtocolResult<Vec<Part>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut close = Vec::with_capacity(delimiter.len() + 2);
    close.extend_from_slice(CRLF);
    close.extend_from_slice(delimiter);

    let mut pos = if body.starts_with(delimiter) {
        0
    } else {
        find(body, &close, 0)
            .map(|i| i + CRLF.len())
            .ok_or_else(|| ProtocolError::Multipart("opening boundary not found".into()))?
    };

    let mut parts = Vec::new();
    loop {
        pos += delimiter.len();
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        while matches!(body.get(pos), Some(b' ' | b'\t')) {
            pos += 1;
        }
        if !body[pos..].starts_with(CRLF) {
            return Err(ProtocolError::Multipart("boundary not followed by CRLF".into()));
        }
        pos += CRLF.len();

        let end = find(body, &close, pos)
            .ok_or_else(|| ProtocolError::Multipart("unterminated part".into()))?;
        parts.push(parse_part(body.slice(pos..end))?);
        pos = end + CRLF.len();
    }
}

fn parse_part(raw: Bytes) -> ProtocolResult<Part> {
    let (head, body) = if raw.starts_with(CRLF) {
        (&raw[..0], raw.slice(CRLF.len()..))
    } else {
        match find(&raw, b"\r\n\r\n", 0) {
            Some(split) => (&raw[..split], raw.slice(split + 4..)),
            None if raw.ends_with(CRLF) => (&raw[..raw.len() - CRLF.len()], Bytes::new()),
            None => {
                return Err(ProtocolError::Multipart(
                    "part has no header terminator".into(),
                ));
            }
        }
    };

    let head = std::str::from_utf8(head)
        .map_err(|_| ProtocolError::Multipart("part headers are not UTF-8".into()))?;
    let mut headers = Headers::new();
    for line in head.split("\r\n").filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::Multipart(format!("malformed part header {line:?}")))?;
        headers.insert(name.trim(), value.trim());
    }

    Ok(Part { headers, body })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
