//! Fixed substitution tables for snapshot compression.
//!
//! Only the forward tables are written by hand. Reverse lookups are derived
//! from them once, so the two directions cannot drift apart.

use crate::error::{HistoryError, IntegrityErrorKind, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Prefix marking a substituted value. A literal leading `~` is doubled.
pub const VALUE_MARKER: char = '~';

/// Serialized field name to short code
const FIELD_CODES: &[(&str, &str)] = &[
    ("id", "i"),
    ("request_type", "rt"),
    ("rule_status", "st"),
    ("rule_name", "rn"),
    ("device", "dv"),
    ("src_zone", "sz"),
    ("src_name", "sn"),
    ("src_cidr", "sc"),
    ("src_service", "ss"),
    ("dst_zone", "dz"),
    ("dst_name", "dn"),
    ("dst_cidr", "dc"),
    ("dst_service", "ds"),
    ("protocol_group", "pg"),
    ("action", "a"),
    ("implementation_date", "im"),
    ("requester", "rq"),
    ("comment", "cm"),
    ("created_at", "ca"),
    ("updated_at", "ua"),
];

/// Frequent enumerated values to short code
const VALUE_CODES: &[(&str, &str)] = &[
    // actions
    ("ALLOW", "A"),
    ("ACCEPT", "AC"),
    ("PERMIT", "P"),
    ("DENY", "D"),
    ("DROP", "DR"),
    ("REJECT", "RJ"),
    ("BLOCK", "B"),
    // protocols
    ("TCP", "T"),
    ("UDP", "U"),
    ("ICMP", "I"),
    ("TCP/UDP", "TU"),
    ("ANY", "*"),
    // rule status
    ("ACTIVE", "ac"),
    ("INACTIVE", "in"),
    ("PENDING", "pe"),
    ("APPROVED", "ap"),
    ("IMPLEMENTED", "ok"),
    ("REJECTED", "rj"),
    // request types
    ("NEW", "n"),
    ("MODIFY", "m"),
    ("DELETE", "d"),
];

/// Bidirectional lookup tables.
#[derive(Debug)]
pub struct Dictionary {
    field_to_code: HashMap<&'static str, &'static str>,
    code_to_field: HashMap<&'static str, &'static str>,
    value_to_code: HashMap<&'static str, &'static str>,
    code_to_value: HashMap<&'static str, &'static str>,
}

impl Dictionary {
    fn build() -> Self {
        let field_to_code: HashMap<_, _> = FIELD_CODES.iter().copied().collect();
        let value_to_code: HashMap<_, _> = VALUE_CODES.iter().copied().collect();
        Self {
            code_to_field: field_to_code.iter().map(|(k, v)| (*v, *k)).collect(),
            code_to_value: value_to_code.iter().map(|(k, v)| (*v, *k)).collect(),
            field_to_code,
            value_to_code,
        }
    }

    /// Short code for a field name. Unknown names pass through unchanged.
    #[must_use]
    pub fn encode_field<'a>(&self, name: &'a str) -> &'a str {
        self.field_to_code.get(name).copied().unwrap_or(name)
    }

    /// Field name for a short code.
    pub fn decode_field<'a>(&self, code: &'a str) -> Result<&'a str> {
        if let Some(name) = self.code_to_field.get(code) {
            return Ok(*name);
        }
        Err(HistoryError::integrity(
            "decoding column names",
            IntegrityErrorKind::UnknownCode(code.to_string()),
        ))
    }

    /// Marked code for a known value, otherwise the value with any leading
    /// marker escaped.
    #[must_use]
    pub fn encode_value<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if let Some(code) = self.value_to_code.get(value) {
            Cow::Owned(format!("{VALUE_MARKER}{code}"))
        } else if value.starts_with(VALUE_MARKER) {
            Cow::Owned(format!("{VALUE_MARKER}{value}"))
        } else {
            Cow::Borrowed(value)
        }
    }

    /// Reverse [`Self::encode_value`].
    pub fn decode_value<'a>(&self, encoded: &'a str) -> Result<Cow<'a, str>> {
        let Some(rest) = encoded.strip_prefix(VALUE_MARKER) else {
            return Ok(Cow::Borrowed(encoded));
        };
        if rest.starts_with(VALUE_MARKER) {
            return Ok(Cow::Borrowed(rest));
        }
        self.code_to_value
            .get(rest)
            .map(|value| Cow::Borrowed(*value))
            .ok_or_else(|| {
                HistoryError::integrity(
                    "decoding values",
                    IntegrityErrorKind::UnknownCode(encoded.to_string()),
                )
            })
    }
}

/// Process-wide dictionary, built on first use.
pub fn dictionary() -> &'static Dictionary {
    static DICTIONARY: OnceLock<Dictionary> = OnceLock::new();
    DICTIONARY.get_or_init(Dictionary::build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tables_are_bijective() {
        let field_codes: HashSet<_> = FIELD_CODES.iter().map(|(_, c)| c).collect();
        assert_eq!(field_codes.len(), FIELD_CODES.len());
        let value_codes: HashSet<_> = VALUE_CODES.iter().map(|(_, c)| c).collect();
        assert_eq!(value_codes.len(), VALUE_CODES.len());

        let dict = dictionary();
        assert_eq!(dict.code_to_field.len(), FIELD_CODES.len());
        assert_eq!(dict.code_to_value.len(), VALUE_CODES.len());
    }

    #[test]
    fn test_every_entry_field_has_a_code() {
        let dict = dictionary();
        for field in crate::model::EntryField::ALL {
            assert_ne!(dict.encode_field(field.as_str()), field.as_str());
        }
    }

    #[test]
    fn test_value_escaping() {
        let dict = dictionary();
        assert_eq!(dict.encode_value("DENY"), "~D");
        assert_eq!(dict.encode_value("deny"), "deny");
        assert_eq!(dict.encode_value("~home"), "~~home");
        assert_eq!(dict.decode_value("~~home").unwrap(), "~home");
        assert_eq!(dict.decode_value("~D").unwrap(), "DENY");
        assert_eq!(dict.decode_value("plain").unwrap(), "plain");
    }

    #[test]
    fn test_unknown_codes_fail() {
        let dict = dictionary();
        assert!(dict.decode_value("~nope").unwrap_err().is_integrity());
        assert!(dict.decode_field("zz").is_err());
    }
}
