//! Byte-level stages: columnar transform, gzip and base64.

use super::dictionary::dictionary;
use crate::error::{ErrorContext, HistoryError, OptionContext, Result};
use crate::model::MatrixEntry;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::{Read, Write};

const COLUMNAR_FORMAT: &str = "columnar";

/// Column-major form of a list of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ColumnarPayload {
    #[serde(rename = "_format")]
    pub format: String,
    /// Encoded column names, sorted by their original name
    #[serde(rename = "_keys")]
    pub keys: Vec<String>,
    /// One row per entry, values in `keys` order
    #[serde(rename = "_data")]
    pub data: Vec<Vec<Value>>,
}

/// Serialize an entry to a key-sorted map with empty strings as null.
fn normalize(entry: &MatrixEntry) -> Result<Map<String, Value>> {
    let map = match serde_json::to_value(entry)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
    .context_none("entry did not serialize to an object")?;

    Ok(map
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) if s.is_empty() => (k, Value::Null),
            other => (k, other),
        })
        .collect())
}

fn encode_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(dictionary().encode_value(&s).into_owned()),
        other => other,
    }
}

fn decode_value(value: Value) -> Result<Value> {
    Ok(match value {
        Value::String(s) => Value::String(dictionary().decode_value(&s)?.into_owned()),
        other => other,
    })
}

/// Normalize, dictionary-substitute and transpose entries.
pub(crate) fn to_columnar(entries: &[MatrixEntry]) -> Result<ColumnarPayload> {
    let rows: Vec<Map<String, Value>> = entries.iter().map(normalize).collect::<Result<_>>()?;
    let names: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let data = rows
        .iter()
        .map(|row| {
            names
                .iter()
                .map(|name| encode_value(row.get(*name).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect();

    let dict = dictionary();
    Ok(ColumnarPayload {
        format: COLUMNAR_FORMAT.to_string(),
        keys: names.iter().map(|name| dict.encode_field(name).to_string()).collect(),
        data,
    })
}

/// Reverse [`to_columnar`].
pub(crate) fn from_columnar(payload: ColumnarPayload) -> Result<Vec<MatrixEntry>> {
    if payload.format != COLUMNAR_FORMAT {
        return Err(HistoryError::corrupt(
            "reading columnar payload",
            format!("unexpected format marker '{}'", payload.format),
        ));
    }
    let dict = dictionary();
    let names: Vec<&str> = payload
        .keys
        .iter()
        .map(|code| dict.decode_field(code))
        .collect::<Result<_>>()?;

    payload
        .data
        .into_iter()
        .enumerate()
        .map(|(row_index, row)| {
            if row.len() != names.len() {
                return Err(HistoryError::corrupt(
                    "reading columnar payload",
                    format!(
                        "row {row_index} has {} values for {} columns",
                        row.len(),
                        names.len()
                    ),
                ));
            }
            let mut map = Map::with_capacity(names.len());
            for (name, value) in names.iter().zip(row) {
                let value = decode_value(value)
                    .with_context(|| format!("row {row_index}, column {name}"))?;
                map.insert((*name).to_string(), value);
            }
            serde_json::from_value(Value::Object(map)).map_err(|e| {
                HistoryError::corrupt("rebuilding entry", format!("row {row_index}: {e}"))
            })
        })
        .collect()
}

/// gzip a byte slice at the given level (0 to 9).
pub fn gzip(bytes: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 4), Compression::new(level));
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Inflate gzip data. Malformed input is an integrity error.
pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::with_capacity(bytes.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| HistoryError::corrupt("inflating payload", e.to_string()))?;
    Ok(out)
}

/// JSON-serialize, gzip and base64-encode a value for text-only stores.
pub fn pack_json<T: Serialize>(value: &T, level: u32) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    Ok(STANDARD.encode(gzip(&json, level)?))
}

/// Reverse [`pack_json`].
pub fn unpack_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let compressed = STANDARD
        .decode(text.trim())
        .map_err(|e| HistoryError::corrupt("decoding base64", e.to_string()))?;
    let json = gunzip(&compressed)?;
    serde_json::from_slice(&json)
        .map_err(|e| HistoryError::corrupt("parsing packed JSON", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryField;

    #[test]
    fn test_columnar_shape() {
        let entries = vec![
            MatrixEntry::new(1).with(EntryField::Action, "ALLOW"),
            MatrixEntry::new(2).with(EntryField::Action, "custom"),
        ];
        let payload = to_columnar(&entries).unwrap();
        assert_eq!(payload.format, "columnar");
        assert_eq!(payload.data.len(), 2);
        assert!(payload.data.iter().all(|row| row.len() == payload.keys.len()));

        let action = payload.keys.iter().position(|k| k == "a").unwrap();
        assert_eq!(payload.data[0][action], Value::String("~A".into()));
        assert_eq!(payload.data[1][action], Value::String("custom".into()));
    }

    #[test]
    fn test_columnar_round_trip_nulls_empty_strings() {
        let entries = vec![MatrixEntry::new(3)
            .with(EntryField::Comment, "")
            .with(EntryField::RuleName, "~tilde")];
        let restored = from_columnar(to_columnar(&entries).unwrap()).unwrap();
        assert_eq!(restored[0].comment, None);
        assert_eq!(restored[0].rule_name.as_deref(), Some("~tilde"));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let mut payload = to_columnar(&[MatrixEntry::new(1)]).unwrap();
        payload.data[0].pop();
        assert!(from_columnar(payload).unwrap_err().is_integrity());
    }

    #[test]
    fn test_pack_unpack() {
        let value = vec!["a".to_string(), "b".to_string()];
        let packed = pack_json(&value, 6).unwrap();
        let unpacked: Vec<String> = unpack_json(&packed).unwrap();
        assert_eq!(unpacked, value);
        assert!(unpack_json::<Vec<String>>("not base64!").is_err());
    }
}
