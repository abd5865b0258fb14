//! Value encoding
//!
//! Turns attribute values into deterministic string tokens for cache keys.
//! Tokens stay readable so a logged key can be traced back to the item.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{CacheError, Result};
use crate::models::AttributeValue;

/// Literal used for the null value.
pub const NULL_TOKEN: &str = "NULL";

// == Encode ==
/// Encodes any attribute value.
///
/// Sets are sorted and maps are ordered by key, so equal values always
/// produce equal tokens. Collection members are length-prefixed so a
/// separator inside a member cannot shift the boundaries.
pub fn encode_value(value: &AttributeValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Encodes a value with its type tag, e.g. `N'5'` vs `S'5'`.
///
/// Used where the attribute type is not pinned down by a schema.
pub fn encode_tagged_value(value: &AttributeValue) -> String {
    format!("{}'{}'", value.type_tag(), encode_value(value))
}

/// Encodes a key attribute, enforcing the key contract.
///
/// Key attributes must be present and must be a string, number or binary.
pub fn encode_key_value(attribute: &str, value: Option<&AttributeValue>) -> Result<String> {
    match value {
        Some(value) if value.is_key_scalar() => Ok(encode_value(value)),
        Some(value) => Err(CacheError::Encoding(format!(
            "key attribute '{}' has non-key type {}",
            attribute,
            value.type_tag()
        ))),
        None => Err(CacheError::Encoding(format!(
            "missing key attribute '{}'",
            attribute
        ))),
    }
}

fn write_value(out: &mut String, value: &AttributeValue) {
    match value {
        AttributeValue::S(s) | AttributeValue::N(s) => out.push_str(s),
        AttributeValue::B(bytes) => out.push_str(&STANDARD.encode(bytes)),
        AttributeValue::Bool(true) => out.push_str("true"),
        AttributeValue::Bool(false) => out.push_str("false"),
        AttributeValue::Null => out.push_str(NULL_TOKEN),
        AttributeValue::Ss(members) | AttributeValue::Ns(members) => {
            write_set(out, value.type_tag(), members.clone())
        }
        AttributeValue::Bs(members) => {
            let encoded = members.iter().map(|b| STANDARD.encode(b)).collect();
            write_set(out, "BS", encoded)
        }
        AttributeValue::L(members) => {
            out.push_str("L[");
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_member(out, &encode_value(member));
            }
            out.push(']');
        }
        AttributeValue::M(entries) => {
            out.push_str("M{");
            for (i, (name, member)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_member(out, name);
                out.push('=');
                write_member(out, &encode_value(member));
            }
            out.push('}');
        }
    }
}

fn write_set(out: &mut String, tag: &str, mut members: Vec<String>) {
    members.sort();
    out.push_str(tag);
    out.push('{');
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_member(out, member);
    }
    out.push('}');
}

/// Writes `len:token`, so the token's end is known without scanning it.
pub(crate) fn write_member(out: &mut String, token: &str) {
    out.push_str(&token.len().to_string());
    out.push(':');
    out.push_str(token);
}
