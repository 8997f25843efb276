use updraft_signing::SignatureHeaderInfo;

use crate::{
    ProtocolError, ProtocolResult,
    structured::{BareItem, Member, parse_dictionary},
};

/// Parse an `expo-signature` header: `sig="<base64>", keyid="root", alg="..."`.
pub fn parse_signature_header(header: &str) -> ProtocolResult<SignatureHeaderInfo> {
    let mut signature = None;
    let mut key_id = None;
    let mut algorithm = None;

    for (key, member) in parse_dictionary(header)
        .map_err(|e| ProtocolError::SignatureHeader(e.to_string()))?
    {
        let Member::Item(BareItem::String(value) | BareItem::Token(value)) = member else {
            continue;
        };
        match key.as_str() {
            "sig" => signature = Some(value),
            "keyid" => key_id = Some(value),
            "alg" => algorithm = Some(value),
            _ => {}
        }
    }

    let signature =
        signature.ok_or_else(|| ProtocolError::SignatureHeader("missing sig member".into()))?;
    Ok(SignatureHeaderInfo::new(signature, key_id, algorithm))
}
