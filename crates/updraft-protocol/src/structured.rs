//! Structured field dictionaries (RFC 8941).
//!
//! Only dictionaries are needed: `expo-signature`,
//! `expo-server-defined-headers`, `expo-manifest-filters` and the outgoing
//! `Expo-Extra-Params`. Parameters are parsed for syntax and dropped.

use base64::{Engine, engine::general_purpose::STANDARD};
use updraft_core::{HeaderDictionary, HeaderValue};

use crate::{ProtocolError, ProtocolResult};

/// Bare item of a structured field.
#[derive(Clone, Debug, PartialEq)]
pub enum BareItem {
    Integer(i64),
    Decimal(f64),
    String(String),
    Token(String),
    ByteSequence(Vec<u8>),
    Boolean(bool),
}

/// Value of one dictionary member.
#[derive(Clone, Debug, PartialEq)]
pub enum Member {
    Item(BareItem),
    InnerList(Vec<BareItem>),
}

/// Parse a dictionary into ordered members. Duplicate keys keep the last value.
pub fn parse_dictionary(input: &str) -> ProtocolResult<Vec<(String, Member)>> {
    let mut parser = Parser::new(input);
    let mut members: Vec<(String, Member)> = Vec::new();

    parser.skip_sp();
    while !parser.at_end() {
        let key = parser.parse_key()?;
        let member = if parser.eat(b'=') {
            if parser.peek() == Some(b'(') {
                Member::InnerList(parser.parse_inner_list()?)
            } else {
                Member::Item(parser.parse_bare_item()?)
            }
        } else {
            Member::Item(BareItem::Boolean(true))
        };
        parser.parse_parameters()?;

        members.retain(|(k, _)| *k != key);
        members.push((key, member));

        parser.skip_ows();
        if parser.at_end() {
            break;
        }
        if !parser.eat(b',') {
            return Err(parser.error("expected ',' between members"));
        }
        parser.skip_ows();
        if parser.at_end() {
            return Err(parser.error("trailing ','"));
        }
    }

    Ok(members)
}

/// Parse a dictionary and keep only scalar members.
///
/// Strings and tokens become strings; byte sequences and inner lists are
/// dropped since they cannot be echoed back as plain header values.
pub fn parse_header_dictionary(input: &str) -> ProtocolResult<HeaderDictionary> {
    Ok(parse_dictionary(input)?
        .into_iter()
        .filter_map(|(key, member)| {
            let value = match member {
                Member::Item(BareItem::String(s) | BareItem::Token(s)) => HeaderValue::String(s),
                Member::Item(BareItem::Integer(i)) => HeaderValue::Integer(i),
                Member::Item(BareItem::Decimal(d)) => HeaderValue::Decimal(d),
                Member::Item(BareItem::Boolean(b)) => HeaderValue::Bool(b),
                Member::Item(BareItem::ByteSequence(_)) | Member::InnerList(_) => return None,
            };
            Some((key, value))
        })
        .collect())
}

/// Serialize string pairs as a dictionary of string items.
pub fn serialize_string_dictionary<'a, I>(pairs: I) -> ProtocolResult<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = Vec::new();
    for (key, value) in pairs {
        if !is_valid_key(key) {
            return Err(ProtocolError::StructuredHeader(format!("invalid key {key:?}")));
        }
        if !value.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
            return Err(ProtocolError::StructuredHeader(format!(
                "value for {key:?} is not printable ASCII"
            )));
        }
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        out.push(format!("{key}=\"{escaped}\""));
    }
    Ok(out.join(", "))
}

fn is_valid_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_lowercase() || *b == b'*' => {}
        _ => return false,
    }
    bytes[1..].iter().all(|b| {
        b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'-' | b'.' | b'*')
    })
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, msg: &str) -> ProtocolError {
        ProtocolError::StructuredHeader(format!("{msg} at offset {}", self.pos))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_sp(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn skip_ows(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn parse_key(&mut self) -> ProtocolResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b.is_ascii_lowercase() || b == b'*' => self.pos += 1,
            _ => return Err(self.error("expected key")),
        }
        while let Some(b) = self.peek() {
            if b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'-' | b'.' | b'*')
            {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn parse_parameters(&mut self) -> ProtocolResult<()> {
        while self.eat(b';') {
            self.skip_sp();
            self.parse_key()?;
            if self.eat(b'=') {
                self.parse_bare_item()?;
            }
        }
        Ok(())
    }

    fn parse_inner_list(&mut self) -> ProtocolResult<Vec<BareItem>> {
        if !self.eat(b'(') {
            return Err(self.error("expected '('"));
        }
        let mut items = Vec::new();
        loop {
            self.skip_sp();
            if self.eat(b')') {
                self.parse_parameters()?;
                return Ok(items);
            }
            items.push(self.parse_bare_item()?);
            self.parse_parameters()?;
            match self.peek() {
                Some(b' ' | b')') => {}
                _ => return Err(self.error("expected ' ' or ')' in inner list")),
            }
        }
    }

    fn parse_bare_item(&mut self) -> ProtocolResult<BareItem> {
        match self.peek() {
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(b'"') => self.parse_string().map(BareItem::String),
            Some(b':') => self.parse_byte_sequence().map(BareItem::ByteSequence),
            Some(b'?') => self.parse_boolean().map(BareItem::Boolean),
            Some(b) if b.is_ascii_alphabetic() || b == b'*' => Ok(BareItem::Token(self.parse_token())),
            _ => Err(self.error("expected bare item")),
        }
    }

    fn parse_number(&mut self) -> ProtocolResult<BareItem> {
        let start = self.pos;
        self.eat(b'-');
        let int_start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let int_len = self.pos - int_start;
        if int_len == 0 {
            return Err(self.error("expected digit"));
        }

        if self.eat(b'.') {
            if int_len > 12 {
                return Err(self.error("decimal integer part too long"));
            }
            let frac_start = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            let frac_len = self.pos - frac_start;
            if frac_len == 0 || frac_len > 3 {
                return Err(self.error("invalid decimal fraction"));
            }
            let text = std::str::from_utf8(&self.input[start..self.pos])
                .map_err(|_| self.error("invalid decimal"))?;
            return text
                .parse::<f64>()
                .map(BareItem::Decimal)
                .map_err(|_| self.error("invalid decimal"));
        }

        if int_len > 15 {
            return Err(self.error("integer too long"));
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("invalid integer"))?;
        text.parse::<i64>()
            .map(BareItem::Integer)
            .map_err(|_| self.error("invalid integer"))
    }

    fn parse_string(&mut self) -> ProtocolResult<String> {
        self.eat(b'"');
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c @ (b'"' | b'\\')) => {
                            out.push(char::from(c));
                            self.pos += 1;
                        }
                        _ => return Err(self.error("invalid escape")),
                    }
                }
                Some(c @ 0x20..=0x7e) => {
                    out.push(char::from(c));
                    self.pos += 1;
                }
                Some(_) => return Err(self.error("invalid string character")),
            }
        }
    }

    fn parse_token(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_tchar(b) || b == b':' || b == b'/' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn parse_byte_sequence(&mut self) -> ProtocolResult<Vec<u8>> {
        self.eat(b':');
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b':' {
                break;
            }
            self.pos += 1;
        }
        let encoded = &self.input[start..self.pos];
        if !self.eat(b':') {
            return Err(self.error("unterminated byte sequence"));
        }
        STANDARD
            .decode(encoded)
            .map_err(|_| self.error("invalid base64 in byte sequence"))
    }

    fn parse_boolean(&mut self) -> ProtocolResult<bool> {
        self.eat(b'?');
        if self.eat(b'1') {
            Ok(true)
        } else if self.eat(b'0') {
            Ok(false)
        } else {
            Err(self.error("invalid boolean"))
        }
    }
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}
