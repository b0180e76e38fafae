use crate::fusion::{RRFFusion, DEFAULT_PER_REPO_TOP, DEFAULT_RRF_K, DEFAULT_TOP_N};
use anyhow::{anyhow, Context, Result};
use context_graph::{
    normalize_edge_filter, ContextExpansionOptions, EdgeFilterRequest, NormalizedEdgeFilter,
    DEFAULT_NEIGHBORHOOD_CACHE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const NEIGHBORHOOD_CACHE_SIZE_ENV: &str = "CONTEXT_NEIGHBORHOOD_CACHE_SIZE";

const SUPPORTED_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub rrf_k: f64,
    pub top_n: usize,
    pub per_repo_top: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            top_n: DEFAULT_TOP_N,
            per_repo_top: DEFAULT_PER_REPO_TOP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborhoodCacheConfig {
    pub max_size: usize,
}

impl Default for NeighborhoodCacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_NEIGHBORHOOD_CACHE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationsConfig {
    pub case_sensitive_files: bool,
}

/// Query-time fusion and expansion settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    pub fusion: FusionConfig,
    pub context_expansion: ContextExpansionOptions,
    pub edge_filter: EdgeFilterRequest,
    pub neighborhood_cache: NeighborhoodCacheConfig,
    pub relations: RelationsConfig,
}

impl SearchConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read search config {}", path.display()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("Invalid search config {}", path.display()))
    }

    /// Parse JSON (tried first) or TOML, then validate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut config = parse(bytes)?;
        config.neighborhood_cache.max_size =
            neighborhood_cache_size_from_env(config.neighborhood_cache.max_size);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(schema_version) = self.schema_version {
            if schema_version != SUPPORTED_SCHEMA_VERSION {
                return Err(anyhow!(
                    "search_config.schema_version {schema_version} is not supported (expected {SUPPORTED_SCHEMA_VERSION})"
                ));
            }
        }
        self.fusion().context("Invalid fusion config")?;
        self.context_expansion
            .validate()
            .context("Invalid context_expansion config")?;
        Ok(())
    }

    /// Fusion engine with `top_n`/`per_repo_top` clamped into range.
    pub fn fusion(&self) -> Result<RRFFusion> {
        Ok(RRFFusion::new(
            self.fusion.rrf_k,
            self.fusion.top_n,
            self.fusion.per_repo_top,
        )?)
    }

    pub fn normalized_edge_filter(&self) -> NormalizedEdgeFilter {
        normalize_edge_filter(&self.edge_filter)
    }
}

fn parse_neighborhood_cache_size(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
}

/// `CONTEXT_NEIGHBORHOOD_CACHE_SIZE` when set and parsable, else `default_value`.
pub fn neighborhood_cache_size_from_env(default_value: usize) -> usize {
    let raw = std::env::var(NEIGHBORHOOD_CACHE_SIZE_ENV).ok();
    parse_neighborhood_cache_size(raw.as_deref(), default_value)
}

/// Accepted keys per section; `""` is the top level.
const CONFIG_KEYS: &[(&str, &[&str])] = &[
    (
        "",
        &[
            "schema_version",
            "fusion",
            "context_expansion",
            "edge_filter",
            "neighborhood_cache",
            "relations",
        ],
    ),
    ("fusion", &["rrf_k", "top_n", "per_repo_top"]),
    (
        "context_expansion",
        &[
            "enabled",
            "max_per_hit",
            "max_total",
            "include_calls",
            "include_imports",
            "include_usages",
            "include_exports",
            "max_call_edges",
            "max_usage_edges",
            "max_import_edges",
            "max_export_edges",
            "max_name_candidates",
        ],
    ),
    (
        "edge_filter",
        &["graphs", "graph", "edgeTypes", "edge_types", "minConfidence", "min_confidence"],
    ),
    ("neighborhood_cache", &["max_size"]),
    ("relations", &["case_sensitive_files"]),
];

/// Decode without validating values or applying env overrides.
fn parse(bytes: &[u8]) -> Result<SearchConfig> {
    let value = config_value(bytes)?;
    let unknown = unknown_keys(&value)?;
    if !unknown.is_empty() {
        return Err(anyhow!("Unknown search config keys: {}", unknown.join(", ")));
    }
    serde_json::from_value(value).context("Search config has fields of the wrong type")
}

/// JSON first, TOML second, both as a JSON value.
fn config_value(bytes: &[u8]) -> Result<serde_json::Value> {
    let json_err = match serde_json::from_slice(bytes) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    let text = std::str::from_utf8(bytes)
        .with_context(|| format!("Search config is neither JSON ({json_err}) nor UTF-8 text"))?;
    let table: toml::Table = toml::from_str(text)
        .with_context(|| format!("Search config is neither JSON ({json_err}) nor TOML"))?;
    serde_json::to_value(table).context("TOML search config has no JSON equivalent")
}

/// Dotted paths of keys outside [`CONFIG_KEYS`], sorted.
fn unknown_keys(value: &serde_json::Value) -> Result<Vec<String>> {
    let serde_json::Value::Object(root) = value else {
        return Err(anyhow!("Search config must be a table/object"));
    };

    let mut unknown = Vec::new();
    for (section, allowed) in CONFIG_KEYS {
        let object = if section.is_empty() {
            Some(root)
        } else {
            root.get(*section).and_then(serde_json::Value::as_object)
        };
        for key in object.into_iter().flat_map(|obj| obj.keys()) {
            if allowed.contains(&key.as_str()) {
                continue;
            }
            unknown.push(if section.is_empty() {
                key.clone()
            } else {
                format!("{section}.{key}")
            });
        }
    }
    unknown.sort();
    Ok(unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.fusion, FusionConfig::default());
        assert!(!config.context_expansion.enabled);
        assert_eq!(config.neighborhood_cache.max_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_json_and_toml() {
        let json = br#"{"schema_version":1,"fusion":{"rrf_k":30,"top_n":5}}"#;
        let config = parse(json).unwrap();
        assert_eq!(config.fusion.rrf_k, 30.0);
        assert_eq!(config.fusion.top_n, 5);
        assert_eq!(config.fusion.per_repo_top, DEFAULT_PER_REPO_TOP);

        let toml = br#"
[context_expansion]
enabled = true
max_per_hit = 2

[edge_filter]
edgeTypes = "calls,imports"

[relations]
case_sensitive_files = true
"#;
        let config = parse(toml).unwrap();
        assert!(config.context_expansion.enabled);
        assert_eq!(config.context_expansion.max_per_hit, 2);
        assert_eq!(config.context_expansion.max_total, 40);
        assert!(config.relations.case_sensitive_files);
        assert_eq!(config.normalized_edge_filter().normalized_edge_types.len(), 2);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = parse(br#"{"fusion":{"rrf":1},"extra":true}"#).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("extra"), "{message}");
        assert!(message.contains("fusion.rrf"), "{message}");
    }

    #[test]
    fn test_validation() {
        let bad_version = parse(br#"{"schema_version":2}"#).unwrap();
        assert!(bad_version.validate().is_err());

        let bad_k = parse(br#"{"fusion":{"rrf_k":0.5}}"#).unwrap();
        assert!(bad_k.validate().is_err());

        let wide_per_hit = parse(br#"{"context_expansion":{"max_per_hit":50,"max_total":10}}"#)
            .unwrap();
        assert!(wide_per_hit.validate().is_ok());

        let no_names = parse(br#"{"context_expansion":{"max_name_candidates":0}}"#).unwrap();
        assert!(no_names.validate().is_err());

        let clamped = parse(br#"{"fusion":{"top_n":100000,"per_repo_top":0}}"#).unwrap();
        let fusion = clamped.fusion().unwrap();
        assert_eq!(fusion.top_n(), 500);
        assert_eq!(fusion.per_repo_top(), 1);
    }

    #[test]
    fn test_cache_size_override_parsing() {
        assert_eq!(parse_neighborhood_cache_size(Some("12"), 64), 12);
        assert_eq!(parse_neighborhood_cache_size(Some(" 7 "), 64), 7);
        assert_eq!(parse_neighborhood_cache_size(Some("lots"), 64), 64);
        assert_eq!(parse_neighborhood_cache_size(Some(""), 64), 64);
        assert_eq!(parse_neighborhood_cache_size(None, 32), 32);
    }
}
