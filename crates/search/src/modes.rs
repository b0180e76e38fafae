use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result partitions a federated search answers independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SearchMode {
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "prose")]
    Prose,
    #[serde(rename = "extracted-prose", alias = "extractedProse")]
    ExtractedProse,
    #[serde(rename = "records")]
    Records,
}

impl SearchMode {
    pub const ALL: [SearchMode; 4] = [
        SearchMode::Code,
        SearchMode::Prose,
        SearchMode::ExtractedProse,
        SearchMode::Records,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Prose => "prose",
            Self::ExtractedProse => "extracted-prose",
            Self::Records => "records",
        }
    }

    /// Key of this mode inside result payloads.
    pub fn payload_key(self) -> &'static str {
        match self {
            Self::ExtractedProse => "extractedProse",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "prose" => Ok(Self::Prose),
            "extracted-prose" | "extractedprose" => Ok(Self::ExtractedProse),
            "records" => Ok(Self::Records),
            other => Err(format!("unknown search mode '{other}'")),
        }
    }
}

const DEFAULT_MODES: [SearchMode; 3] = [
    SearchMode::Code,
    SearchMode::Prose,
    SearchMode::ExtractedProse,
];

/// Expand a user-facing mode selector into concrete modes.
///
/// Unknown selectors fall back to the default set instead of failing the request.
pub fn resolve_requested_modes(mode: &str) -> Vec<SearchMode> {
    match mode.trim().to_lowercase().as_str() {
        "" | "default" | "both" => DEFAULT_MODES.to_vec(),
        "all" => SearchMode::ALL.to_vec(),
        "code" => vec![SearchMode::Code],
        "prose" => vec![SearchMode::Prose, SearchMode::ExtractedProse],
        "extracted-prose" => vec![SearchMode::ExtractedProse],
        "records" => vec![SearchMode::Records],
        other => {
            log::debug!("Unknown search mode '{other}', using defaults");
            DEFAULT_MODES.to_vec()
        }
    }
}
