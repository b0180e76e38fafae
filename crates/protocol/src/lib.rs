//! Shared in-process payload types for the query core: ranked hits, warnings and
//! truncation records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod hit;

pub use hit::{coerce_hit_list, deserialize_hit_list, SearchHit};

/// Diagnostic codes surfaced to callers instead of failing a search.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    GraphCountMismatch,
    GraphNodeInvalid,
    UnresolvedSeed,
    MissingGraphRelations,
    ImportGraphLookupMiss,
    RelationLookupAmbiguous,
    UnknownEdgeFilter,
}

impl WarningCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GraphCountMismatch => "GRAPH_COUNT_MISMATCH",
            Self::GraphNodeInvalid => "GRAPH_NODE_INVALID",
            Self::UnresolvedSeed => "UNRESOLVED_SEED",
            Self::MissingGraphRelations => "MISSING_GRAPH_RELATIONS",
            Self::ImportGraphLookupMiss => "IMPORT_GRAPH_LOOKUP_MISS",
            Self::RelationLookupAmbiguous => "RELATION_LOOKUP_AMBIGUOUS",
            Self::UnknownEdgeFilter => "UNKNOWN_EDGE_FILTER",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Warning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Which cap cut a result short.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TruncationCap {
    MaxPerHit,
    MaxTotal,
    MaxNameCandidates,
    MaxCallEdges,
    MaxUsageEdges,
    MaxImportEdges,
    MaxExportEdges,
    MaxDepth,
    MaxFanoutPerNode,
    MaxNodes,
    MaxEdges,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruncationRecord {
    pub scope: String,
    pub cap: TruncationCap,
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omitted: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
}

/// Collects truncation records for one scope, one record per cap.
///
/// The first hit of a cap fixes `limit`/`observed`/`at`; later hits only add
/// to `omitted`.
#[derive(Debug, Clone, Default)]
pub struct TruncationLog {
    scope: String,
    records: Vec<TruncationRecord>,
}

impl TruncationLog {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            records: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        cap: TruncationCap,
        limit: usize,
        observed: Option<usize>,
        omitted: Option<usize>,
        at: Option<String>,
    ) {
        if let Some(existing) = self.records.iter_mut().find(|r| r.cap == cap) {
            if let Some(more) = omitted {
                existing.omitted = Some(existing.omitted.unwrap_or(0) + more);
            }
            return;
        }
        self.records.push(TruncationRecord {
            scope: self.scope.clone(),
            cap,
            limit,
            observed,
            omitted,
            at,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TruncationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TruncationRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_warning_code_wire_names() {
        let warning = Warning::new(WarningCode::GraphCountMismatch, "mismatch")
            .with_data(serde_json::json!({"expected": 3, "actual": 2}));
        let value = serde_json::to_value(&warning).unwrap();
        assert_eq!(value["code"], "GRAPH_COUNT_MISMATCH");
        assert_eq!(value["data"]["expected"], 3);
        assert_eq!(WarningCode::UnknownEdgeFilter.to_string(), "UNKNOWN_EDGE_FILTER");
    }

    #[test]
    fn test_truncation_log_merges_per_cap() {
        let mut log = TruncationLog::new("context");
        log.record(TruncationCap::MaxPerHit, 2, Some(5), Some(3), Some("a".into()));
        log.record(TruncationCap::MaxPerHit, 2, Some(4), Some(2), Some("b".into()));
        log.record(TruncationCap::MaxTotal, 10, None, None, None);

        let records = log.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].omitted, Some(5));
        assert_eq!(records[0].at.as_deref(), Some("a"));
        assert_eq!(records[1].cap, TruncationCap::MaxTotal);
        assert_eq!(records[1].scope, "context");
    }
}
