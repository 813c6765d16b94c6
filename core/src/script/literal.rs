use alloy_primitives::{hex, Address, U256};

use crate::error::SynthesisError;

/// Renders `value` as a double-quoted Solidity string literal.
///
/// Only printable ASCII is accepted; `"` and `\` are escaped. Anything else
/// (newlines, control characters, non-ASCII) is refused rather than encoded so
/// a value can never end the literal or the line it sits on.
pub fn string_literal(field: &'static str, value: &str) -> Result<String, SynthesisError> {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            ' '..='~' => out.push(c),
            other => {
                return Err(SynthesisError::UnsafeLiteral {
                    field,
                    reason: format!("character {:?} is not allowed", other),
                })
            }
        }
    }
    out.push('"');
    Ok(out)
}

/// `hex"..."` literal re-encoded from the decoded bytes.
pub fn hex_literal(bytes: &[u8]) -> String {
    format!("hex\"{}\"", hex::encode(bytes))
}

/// EIP-55 checksummed address literal; solc rejects mis-checksummed ones.
pub fn address_literal(address: &Address) -> String {
    address.to_checksum(None)
}

pub fn uint_literal(value: &U256) -> String {
    value.to_string()
}
