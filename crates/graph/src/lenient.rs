//! Deserializers for indexer artifacts that may be partially malformed or written by an
//! older/newer build. A field with the wrong JSON shape reads as absent instead of
//! failing the whole artifact.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "id must be a string or number, got {other}"
        ))),
    }
}

/// Non-empty string or nothing.
pub(crate) fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_value(Value::deserialize(deserializer)?))
}

pub(crate) fn string_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

pub(crate) fn finite_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?
        .as_f64()
        .filter(|n| n.is_finite()))
}

pub(crate) fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_i64())
}

/// Array of strings, or nothing when the value is not an array. Non-string
/// entries inside an array are dropped.
pub(crate) fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_list_value(Value::deserialize(deserializer)?))
}

pub(crate) fn string_list_value(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Array(entries) => Some(strings_of(entries)),
        _ => None,
    }
}

/// Like [`string_list`] but absent/malformed collapses to an empty list.
pub(crate) fn string_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_list(deserializer)?.unwrap_or_default())
}

/// `[[from, to], ...]` call pairs; malformed pairs are skipped.
pub(crate) fn name_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Array(pair) => match (pair.first(), pair.get(1)) {
                (Some(Value::String(from)), Some(Value::String(to)))
                    if !from.is_empty() && !to.is_empty() =>
                {
                    Some((from.clone(), to.clone()))
                }
                _ => None,
            },
            _ => None,
        })
        .collect())
}

/// Sequence of records where each entry that fails to parse is replaced by
/// `T::default()`, so the sequence length still reflects what the artifact
/// declared.
pub(crate) fn records_or_default<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).unwrap_or_default())
        .collect())
}

/// Sequence of records where entries that fail to parse are dropped.
pub(crate) fn records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

fn strings_of(entries: Vec<Value>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .collect()
}
