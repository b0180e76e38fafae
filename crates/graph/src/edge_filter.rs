use crate::types::{EdgeType, GraphKind};
use context_protocol::{Warning, WarningCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;

/// User-facing list input: either a comma-separated string or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterList {
    One(String),
    Many(Vec<Value>),
    /// Any other JSON shape; contributes nothing.
    Other(Value),
}

impl FilterList {
    fn entries(&self) -> Vec<String> {
        match self {
            Self::One(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
            Self::Many(values) => values
                .iter()
                .filter_map(|value| match value {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Self::Other(_) => Vec::new(),
        }
    }
}

impl From<&str> for FilterList {
    fn from(raw: &str) -> Self {
        Self::One(raw.to_string())
    }
}

impl From<Vec<&str>> for FilterList {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(|v| Value::String(v.to_string())).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfidenceInput {
    Number(f64),
    Text(String),
    Other(Value),
}

impl ConfidenceInput {
    fn parse(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => Some(*n),
            Self::Text(raw) => raw.trim().parse::<f64>().ok(),
            Self::Other(_) => None,
        };
        value.filter(|n| n.is_finite())
    }
}

/// Raw edge filter as supplied by a request or config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeFilterRequest {
    #[serde(default, alias = "graph")]
    pub graphs: Option<FilterList>,
    #[serde(default, alias = "edge_types")]
    pub edge_types: Option<FilterList>,
    #[serde(default, alias = "min_confidence")]
    pub min_confidence: Option<ConfidenceInput>,
}

/// Normalized edge filter. `None` sets mean "no restriction"; an empty set is never
/// produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEdgeFilter {
    pub graphs: Option<BTreeSet<GraphKind>>,
    pub edge_types: Option<BTreeSet<EdgeType>>,
    pub min_confidence: Option<f64>,
    pub unknown_graphs: Vec<String>,
    pub unknown_edge_types: Vec<String>,
    pub normalized_edge_types: Vec<EdgeType>,
}

/// The parts of an edge the filter looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeProbe<'a> {
    pub graph: &'a str,
    pub edge_type: &'a str,
    pub confidence: Option<f64>,
}

impl<'a> EdgeProbe<'a> {
    pub fn new(graph: GraphKind, edge_type: EdgeType, confidence: Option<f64>) -> Self {
        Self {
            graph: graph.as_str(),
            edge_type: edge_type.as_str(),
            confidence,
        }
    }
}

pub fn normalize_edge_filter(request: &EdgeFilterRequest) -> NormalizedEdgeFilter {
    let mut graphs = BTreeSet::new();
    let mut unknown_graphs = Vec::new();
    for name in request.graphs.as_ref().map(FilterList::entries).unwrap_or_default() {
        match GraphKind::from_str(&name) {
            Ok(kind) => {
                graphs.insert(kind);
            }
            Err(_) => push_unique(&mut unknown_graphs, name),
        }
    }

    let mut normalized_edge_types = Vec::new();
    let mut unknown_edge_types = Vec::new();
    for raw in request.edge_types.as_ref().map(FilterList::entries).unwrap_or_default() {
        match EdgeType::parse_alias(&raw) {
            Some(edge_type) => {
                if !normalized_edge_types.contains(&edge_type) {
                    normalized_edge_types.push(edge_type);
                }
            }
            None => push_unique(&mut unknown_edge_types, raw.to_lowercase()),
        }
    }

    let edge_types: BTreeSet<EdgeType> = normalized_edge_types.iter().copied().collect();

    NormalizedEdgeFilter {
        graphs: (!graphs.is_empty()).then_some(graphs),
        edge_types: (!edge_types.is_empty()).then_some(edge_types),
        min_confidence: request.min_confidence.as_ref().and_then(ConfidenceInput::parse),
        unknown_graphs,
        unknown_edge_types,
        normalized_edge_types,
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

impl NormalizedEdgeFilter {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.graphs.is_none() && self.edge_types.is_none() && self.min_confidence.is_none()
    }

    pub fn includes_graph(&self, graph: GraphKind) -> bool {
        self.graphs.as_ref().map_or(true, |set| set.contains(&graph))
    }

    pub fn includes_edge_type(&self, edge_type: EdgeType) -> bool {
        self.edge_types.as_ref().map_or(true, |set| set.contains(&edge_type))
    }

    /// Whether an edge passes the filter. A missing confidence never fails the
    /// confidence check.
    pub fn allows(&self, edge: &EdgeProbe<'_>) -> bool {
        if let Some(graphs) = &self.graphs {
            match GraphKind::from_str(edge.graph) {
                Ok(kind) if graphs.contains(&kind) => {}
                _ => return false,
            }
        }
        if let Some(edge_types) = &self.edge_types {
            match EdgeType::parse_alias(edge.edge_type) {
                Some(edge_type) if edge_types.contains(&edge_type) => {}
                _ => return false,
            }
        }
        if let (Some(min), Some(confidence)) = (self.min_confidence, edge.confidence) {
            if confidence < min {
                return false;
            }
        }
        true
    }

    pub fn predicate(&self) -> impl Fn(&EdgeProbe<'_>) -> bool + '_ {
        move |edge| self.allows(edge)
    }

    /// One warning describing unrecognized graph names / edge types, if any.
    pub fn diagnostics(&self) -> Option<Warning> {
        if self.unknown_graphs.is_empty() && self.unknown_edge_types.is_empty() {
            return None;
        }
        Some(
            Warning::new(
                WarningCode::UnknownEdgeFilter,
                "Edge filter contains unknown graphs or edge types; they were ignored.",
            )
            .with_data(serde_json::json!({
                "unknownGraphs": self.unknown_graphs,
                "unknownEdgeTypes": self.unknown_edge_types,
            })),
        )
    }

    /// Stable rendering used inside cache keys.
    pub fn signature(&self) -> String {
        let graphs = self.graphs.as_ref().map_or_else(
            || "*".to_string(),
            |set| set.iter().map(|g| g.as_str()).collect::<Vec<_>>().join(","),
        );
        let edge_types = self.edge_types.as_ref().map_or_else(
            || "*".to_string(),
            |set| set.iter().map(|e| e.as_str()).collect::<Vec<_>>().join(","),
        );
        let min = self
            .min_confidence
            .map_or_else(|| "-".to_string(), |m| m.to_string());
        format!("g={graphs};t={edge_types};c={min}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request(value: Value) -> EdgeFilterRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_graph_list_is_unrestricted() {
        let filter = normalize_edge_filter(&request(json!({"graphs": []})));
        assert_eq!(filter.graphs, None);
        assert!(filter.is_unrestricted());
        assert!(filter.allows(&EdgeProbe::new(GraphKind::CallGraph, EdgeType::Call, None)));
    }

    #[test]
    fn test_edge_type_aliases_and_unknowns() {
        let filter = normalize_edge_filter(&request(json!({"edgeTypes": "calls,bogus"})));
        assert_eq!(filter.normalized_edge_types, vec![EdgeType::Call]);
        assert_eq!(filter.unknown_edge_types, vec!["bogus".to_string()]);
        assert_eq!(
            serde_json::to_value(&filter).unwrap()["normalizedEdgeTypes"],
            json!(["call"])
        );
        assert!(filter.diagnostics().is_some());
    }

    #[test]
    fn test_unknown_graphs_do_not_abort() {
        let filter = normalize_edge_filter(&request(json!({
            "graphs": ["callGraph", "nopeGraph", "", 7]
        })));
        assert_eq!(
            filter.graphs,
            Some(BTreeSet::from([GraphKind::CallGraph]))
        );
        assert_eq!(filter.unknown_graphs, vec!["nopeGraph".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_only_unknown_values_leave_filter_open() {
        let filter = normalize_edge_filter(&request(json!({"edgeTypes": "bogus"})));
        assert_eq!(filter.edge_types, None);
        assert!(filter.allows(&EdgeProbe::new(GraphKind::UsageGraph, EdgeType::Usage, None)));
    }

    #[test]
    fn test_min_confidence_parsing() {
        let numeric = normalize_edge_filter(&request(json!({"minConfidence": 0.5})));
        assert_eq!(numeric.min_confidence, Some(0.5));
        let text = normalize_edge_filter(&request(json!({"minConfidence": " 0.25 "})));
        assert_eq!(text.min_confidence, Some(0.25));
        let junk = normalize_edge_filter(&request(json!({"minConfidence": "high"})));
        assert_eq!(junk.min_confidence, None);
        let shape = normalize_edge_filter(&request(json!({"minConfidence": [1]})));
        assert_eq!(shape.min_confidence, None);
    }

    #[test]
    fn test_predicate_rejections() {
        let filter = normalize_edge_filter(&request(json!({
            "graphs": "callGraph,importGraph",
            "edgeTypes": ["call", "IMPORTS"],
            "minConfidence": 0.5
        })));
        let allows = filter.predicate();

        assert!(allows(&EdgeProbe::new(GraphKind::CallGraph, EdgeType::Call, None)));
        assert!(allows(&EdgeProbe::new(GraphKind::ImportGraph, EdgeType::Import, Some(0.5))));
        assert!(!allows(&EdgeProbe::new(GraphKind::UsageGraph, EdgeType::Call, None)));
        assert!(!allows(&EdgeProbe::new(GraphKind::CallGraph, EdgeType::Usage, None)));
        assert!(!allows(&EdgeProbe::new(GraphKind::CallGraph, EdgeType::Call, Some(0.2))));
        assert!(allows(&EdgeProbe {
            graph: "callGraph",
            edge_type: "CALL",
            confidence: None,
        }));
        assert!(!allows(&EdgeProbe {
            graph: "mystery",
            edge_type: "call",
            confidence: None,
        }));
    }

    #[test]
    fn test_malformed_shapes_normalize_to_open_filter() {
        let filter = normalize_edge_filter(&request(json!({
            "graphs": {"callGraph": true},
            "edgeTypes": 12
        })));
        assert!(filter.is_unrestricted());
        assert_eq!(filter.diagnostics(), None);
    }

    #[test]
    fn test_signature_is_stable() {
        let a = normalize_edge_filter(&request(json!({"edgeTypes": "usage,call"})));
        let b = normalize_edge_filter(&request(json!({"edgeTypes": ["calls", "usages"]})));
        assert_eq!(a.signature(), b.signature());
        assert_eq!(NormalizedEdgeFilter::unrestricted().signature(), "g=*;t=*;c=-");
    }
}
