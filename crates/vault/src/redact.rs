//! Display masking for sensitive fields.
//!
//! Masks are computed from the stored string's length alone. Nothing here
//! touches key material or parses envelopes, so a corrupted ciphertext masks
//! exactly like any other string.

use serde_json::Value;

use crate::record::{FieldKind, FieldSchema};

const MASK: char = '*';

/// Mask a routing number: first 2 and last 2 characters visible, interior
/// masked. Values under 4 characters are fully masked.
///
/// `"021000021"` → `"02*****21"`.
pub fn mask_routing_number(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    if len < 4 {
        return MASK.to_string().repeat(len);
    }
    let mut out = String::with_capacity(value.len());
    out.extend(&chars[..2]);
    out.extend(std::iter::repeat(MASK).take(len - 4));
    out.extend(&chars[len - 2..]);
    out
}

/// Mask an account number: only the last 4 characters visible. Values of 4
/// characters or fewer are fully masked.
///
/// `"000123456789"` → `"********6789"`.
pub fn mask_account_number(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    if len <= 4 {
        return MASK.to_string().repeat(len);
    }
    let mut out = String::with_capacity(value.len());
    out.extend(std::iter::repeat(MASK).take(len - 4));
    out.extend(&chars[len - 4..]);
    out
}

/// Mask `value` according to its field kind.
pub fn mask(kind: FieldKind, value: &str) -> String {
    match kind {
        FieldKind::RoutingNumber => mask_routing_number(value),
        FieldKind::AccountNumber => mask_account_number(value),
    }
}

/// Return a copy of `record` with every sensitive field masked, whatever its
/// stored format.
pub fn redact_record(record: &Value, schema: &FieldSchema) -> Value {
    let mut out = record.clone();
    schema.for_each_mut(&mut out, |_, kind, value| {
        *value = mask(kind, value);
    });
    out
}
