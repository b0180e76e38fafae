use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One ranked hit as produced by a retrieval channel (lexical, dense, records).
///
/// Only `id`, `file`, `start` and `score` are read by the query core; every other
/// channel-specific field is carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(deserialize_with = "string_or_number")]
    #[schemars(with = "String")]
    pub id: String,

    #[serde(default, deserialize_with = "string_or_empty")]
    #[schemars(with = "String")]
    pub file: String,

    #[serde(
        default,
        deserialize_with = "line_number",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<i64>")]
    pub start: Option<i64>,

    #[serde(default, deserialize_with = "finite_or_zero")]
    #[schemars(with = "f64")]
    pub score: f64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            start: None,
            score: 0.0,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Chunk uid carried by the hit, if the channel attached one.
    pub fn chunk_uid(&self) -> Option<&str> {
        self.extra
            .get("chunkUid")
            .and_then(Value::as_str)
            .filter(|uid| !uid.is_empty())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "hit id must be a string or number, got {other}"
        ))),
    }
}

/// A non-string `file` (usually `null`) reads as empty.
fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// Integers pass through, finite floats are truncated, anything else is absent.
fn line_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(|n| n.trunc() as i64)
    }))
}

fn finite_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?
        .as_f64()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0))
}

/// Deserialize a ranked hit list without failing the surrounding payload.
///
/// A value that is not an array becomes an empty list and entries that do not
/// parse as a hit are dropped, keeping the relative order of the rest.
pub fn deserialize_hit_list<'de, D>(deserializer: D) -> Result<Vec<SearchHit>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(coerce_hit_list(value.unwrap_or(Value::Null)))
}

pub fn coerce_hit_list(value: Value) -> Vec<SearchHit> {
    let Value::Array(entries) = value else {
        if !value.is_null() {
            log::debug!("Ranked hit list is not an array, treating as empty");
        }
        return Vec::new();
    };

    let total = entries.len();
    let hits: Vec<SearchHit> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if hits.len() != total {
        log::debug!("Dropped {} malformed hits from ranked list", total - hits.len());
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_hit_keeps_channel_fields() {
        let hit: SearchHit = serde_json::from_value(json!({
            "id": 7,
            "file": "src/lib.rs",
            "start": 12,
            "score": 3.5,
            "kind": "FunctionDeclaration",
            "chunkUid": "ck:1"
        }))
        .unwrap();

        assert_eq!(hit.id, "7");
        assert_eq!(hit.start, Some(12));
        assert_eq!(hit.chunk_uid(), Some("ck:1"));
        assert_eq!(hit.extra.get("kind"), Some(&json!("FunctionDeclaration")));

        let back = serde_json::to_value(&hit).unwrap();
        assert_eq!(back["kind"], json!("FunctionDeclaration"));
        assert_eq!(back["id"], json!("7"));
    }

    #[test]
    fn test_coerce_non_array_to_empty() {
        assert!(coerce_hit_list(json!({"id": "a"})).is_empty());
        assert!(coerce_hit_list(json!("nope")).is_empty());
        assert!(coerce_hit_list(Value::Null).is_empty());
    }

    #[test]
    fn test_coerce_skips_malformed_entries() {
        let hits = coerce_hit_list(json!([
            {"id": "a", "file": "a.rs"},
            42,
            {"file": "missing-id.rs"},
            {"id": "b", "file": "b.rs"}
        ]));
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_loose_field_shapes_keep_the_hit() {
        let hits = coerce_hit_list(json!([
            {"id": "r1", "file": null, "score": 1.0},
            {"id": "r2", "file": "b.rs", "score": null},
            {"id": "r3", "file": 3, "start": 12.9},
            {"id": "r4", "file": "d.rs", "start": "12", "score": "high"}
        ]));
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3", "r4"]);

        assert_eq!(hits[0].file, "");
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[1].score, 0.0);
        assert_eq!(hits[2].file, "");
        assert_eq!(hits[2].start, Some(12));
        assert_eq!(hits[3].start, None);
        assert_eq!(hits[3].score, 0.0);
    }

    #[test]
    fn test_schema_is_derivable() {
        let schema = schemars::schema_for!(SearchHit);
        let value = serde_json::to_value(&schema).unwrap();
        assert!(value["properties"].get("id").is_some());
    }
}
