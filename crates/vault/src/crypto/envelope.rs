//! Envelope codec: `Envelope` ⇄ persisted string.
//!
//! Writers only ever emit `enc:<version>:<base64>`. Readers also accept the
//! legacy bare base64 form, which carries no version tag.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{cipher::Envelope, DecryptError, IV_LEN, MIN_PAYLOAD_LEN, TAG_LEN};

/// Literal prefix of every versioned envelope.
pub const VERSION_PREFIX: &str = "enc:";

/// A stored string split into its version tag and decoded payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEnvelope {
    pub version: String,
    /// Decoded `iv ‖ ciphertext ‖ tag`.
    pub raw: Vec<u8>,
    /// `false` when the version was assumed because the value predates tags.
    pub tagged: bool,
}

impl ParsedEnvelope {
    /// Split the raw payload into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError::Malformed`] if the payload is shorter than
    /// [`MIN_PAYLOAD_LEN`].
    pub fn into_envelope(self) -> Result<Envelope, DecryptError> {
        split_payload(self.version, &self.raw)
    }
}

/// Encode an envelope to its canonical `enc:<version>:<base64>` string.
pub fn serialize(envelope: &Envelope) -> String {
    let mut raw = Vec::with_capacity(IV_LEN + envelope.ciphertext.len() + TAG_LEN);
    raw.extend_from_slice(&envelope.iv);
    raw.extend_from_slice(&envelope.ciphertext);
    raw.extend_from_slice(&envelope.tag);
    format!("{VERSION_PREFIX}{}:{}", envelope.version, STANDARD.encode(raw))
}

/// Parse a stored string into a [`ParsedEnvelope`].
///
/// Strings starting with [`VERSION_PREFIX`] must match
/// `enc:v<digits>:<payload>`. Anything else is read as a legacy bare base64
/// payload and assigned `current_version`, since no tag was ever recorded.
///
/// # Errors
///
/// Returns [`DecryptError::Malformed`] on a bad tag, invalid base64, or a
/// payload too short to hold an envelope.
pub fn parse(stored: &str, current_version: &str) -> Result<ParsedEnvelope, DecryptError> {
    let (version, payload, tagged) = match stored.strip_prefix(VERSION_PREFIX) {
        Some(rest) => {
            let (version, payload) = rest.split_once(':').ok_or(DecryptError::Malformed)?;
            if !is_version_tag(version) || payload.is_empty() {
                return Err(DecryptError::Malformed);
            }
            (version, payload, true)
        }
        None => (current_version, stored, false),
    };

    let raw = STANDARD.decode(payload).map_err(|_| DecryptError::Malformed)?;
    if raw.len() < MIN_PAYLOAD_LEN {
        return Err(DecryptError::Malformed);
    }
    Ok(ParsedEnvelope {
        version: version.to_owned(),
        raw,
        tagged,
    })
}

/// Split `iv ‖ ciphertext ‖ tag` using the fixed IV and tag widths.
///
/// # Errors
///
/// Returns [`DecryptError::Malformed`] if `raw` is shorter than
/// [`MIN_PAYLOAD_LEN`].
pub fn split_payload(version: String, raw: &[u8]) -> Result<Envelope, DecryptError> {
    if raw.len() < MIN_PAYLOAD_LEN {
        return Err(DecryptError::Malformed);
    }
    let (iv_bytes, rest) = raw.split_at(IV_LEN);
    let (ciphertext, tag_bytes) = rest.split_at(rest.len() - TAG_LEN);

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(iv_bytes);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(tag_bytes);

    Ok(Envelope {
        version,
        iv,
        ciphertext: ciphertext.to_vec(),
        tag,
    })
}

/// Returns `true` for tags of the form `v<digits>` (e.g. `v0`, `v12`).
pub fn is_version_tag(tag: &str) -> bool {
    tag.strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{decrypt, encrypt};
    use crate::test_support::key_v1;

    #[test]
    fn serialized_form_has_version_prefix() {
        let envelope = encrypt("021000021", &key_v1(), "v1").unwrap();
        let s = serialize(&envelope);
        assert!(s.starts_with("enc:v1:"), "got: {s}");
    }

    #[test]
    fn parse_recovers_envelope() {
        let envelope = encrypt("021000021", &key_v1(), "v1").unwrap();
        let parsed = parse(&serialize(&envelope), "v1").unwrap();
        assert!(parsed.tagged);
        assert_eq!(parsed.version, "v1");
        assert_eq!(parsed.into_envelope().unwrap(), envelope);
    }

    #[test]
    fn parse_keeps_retired_version_tag() {
        let envelope = encrypt("x1", &key_v1(), "v0").unwrap();
        let parsed = parse(&serialize(&envelope), "v1").unwrap();
        assert_eq!(parsed.version, "v0");
    }

    #[test]
    fn legacy_payload_assumes_current_version() {
        let envelope = encrypt("021000021", &key_v1(), "v1").unwrap();
        let legacy = serialize(&envelope)
            .strip_prefix("enc:v1:")
            .unwrap()
            .to_owned();
        let parsed = parse(&legacy, "v1").unwrap();
        assert!(!parsed.tagged);
        assert_eq!(parsed.version, "v1");
        let recovered = parsed.into_envelope().unwrap();
        assert_eq!(decrypt(&recovered, &key_v1()).unwrap(), "021000021");
    }

    #[test]
    fn parse_rejects_bad_tags() {
        for s in ["enc:", "enc:v1", "enc:v1:", "enc:x1:AAAA", "enc:v:AAAA", "enc:V1:AAAA"] {
            assert_eq!(parse(s, "v1"), Err(DecryptError::Malformed), "{s}");
        }
    }

    #[test]
    fn parse_rejects_bad_base64() {
        assert_eq!(parse("enc:v1:!!!not base64!!!", "v1"), Err(DecryptError::Malformed));
    }

    #[test]
    fn parse_rejects_short_payload() {
        // IV + tag exactly, with no ciphertext byte.
        let short = STANDARD.encode([0u8; IV_LEN + TAG_LEN]);
        assert_eq!(parse(&format!("enc:v1:{short}"), "v1"), Err(DecryptError::Malformed));
        assert_eq!(parse(&short, "v1"), Err(DecryptError::Malformed));
    }

    #[test]
    fn split_payload_uses_fixed_widths() {
        let raw: Vec<u8> = (0..(IV_LEN + 3 + TAG_LEN) as u8).collect();
        let envelope = split_payload("v1".into(), &raw).unwrap();
        assert_eq!(envelope.iv[0], 0);
        assert_eq!(envelope.ciphertext, vec![16, 17, 18]);
        assert_eq!(envelope.tag[0], 19);
        assert_eq!(envelope.tag[TAG_LEN - 1], 34);
    }

    #[test]
    fn version_tags() {
        assert!(is_version_tag("v0"));
        assert!(is_version_tag("v12"));
        assert!(!is_version_tag("v"));
        assert!(!is_version_tag("1"));
        assert!(!is_version_tag("v1a"));
    }
}
