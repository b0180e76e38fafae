use crate::error::GraphError;
use crate::lenient;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Canonical identity of a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeRef {
    Chunk {
        #[serde(rename = "chunkUid")]
        chunk_uid: String,
    },
    File {
        path: String,
    },
    Symbol {
        #[serde(rename = "symbolId")]
        symbol_id: String,
    },
}

impl NodeRef {
    pub fn chunk(chunk_uid: impl Into<String>) -> Self {
        Self::Chunk {
            chunk_uid: chunk_uid.into(),
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self::File { path: path.into() }
    }

    pub fn symbol(symbol_id: impl Into<String>) -> Self {
        Self::Symbol {
            symbol_id: symbol_id.into(),
        }
    }

    /// Stable string key, unique across node kinds.
    pub fn key(&self) -> String {
        match self {
            Self::Chunk { chunk_uid } => format!("chunk:{chunk_uid}"),
            Self::File { path } => format!("file:{path}"),
            Self::Symbol { symbol_id } => format!("symbol:{symbol_id}"),
        }
    }

    pub fn chunk_uid(&self) -> Option<&str> {
        match self {
            Self::Chunk { chunk_uid } => Some(chunk_uid),
            _ => None,
        }
    }
}

/// Loose identity record as written by symbol resolution; any subset of the fields
/// may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRef {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub chunk_uid: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CandidateRef {
    /// chunkUid, then symbolId, then path.
    pub fn to_node_ref(&self) -> Option<NodeRef> {
        if let Some(uid) = &self.chunk_uid {
            return Some(NodeRef::chunk(uid.clone()));
        }
        if let Some(symbol_id) = &self.symbol_id {
            return Some(NodeRef::symbol(symbol_id.clone()));
        }
        self.path.as_ref().map(|path| NodeRef::file(path.clone()))
    }
}

/// Disambiguation record for a seed that has not been pinned to one node yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSeed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<CandidateRef>,
    #[serde(default, deserialize_with = "lenient::records")]
    pub candidates: Vec<CandidateRef>,
}

/// Starting point for graph expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seed {
    Node(NodeRef),
    Pending(PendingSeed),
}

impl From<NodeRef> for Seed {
    fn from(node: NodeRef) -> Self {
        Self::Node(node)
    }
}

/// Graph artifacts a relation can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphKind {
    CallGraph,
    UsageGraph,
    ImportGraph,
    SymbolEdges,
}

impl GraphKind {
    pub const ALL: [GraphKind; 4] = [
        GraphKind::CallGraph,
        GraphKind::UsageGraph,
        GraphKind::ImportGraph,
        GraphKind::SymbolEdges,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallGraph => "callGraph",
            Self::UsageGraph => "usageGraph",
            Self::ImportGraph => "importGraph",
            Self::SymbolEdges => "symbolEdges",
        }
    }
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GraphKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GraphError::UnknownGraph(s.to_string()))
    }
}

/// Classification of a relation between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Call,
    Usage,
    Import,
    Export,
    Dataflow,
    Symbol,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Usage => "usage",
            Self::Import => "import",
            Self::Export => "export",
            Self::Dataflow => "dataflow",
            Self::Symbol => "symbol",
        }
    }

    /// Case-insensitive parse accepting the plural aliases (`calls`, `imports`, ...).
    pub fn parse_alias(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "call" | "calls" => Some(Self::Call),
            "usage" | "usages" => Some(Self::Usage),
            "import" | "imports" => Some(Self::Import),
            "export" | "exports" => Some(Self::Export),
            "dataflow" => Some(Self::Dataflow),
            "symbol" | "symbols" => Some(Self::Symbol),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_alias(s).ok_or_else(|| GraphError::UnknownEdgeType(s.to_string()))
    }
}

/// Per-chunk relations recorded by the indexer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRelations {
    /// `(caller name, callee name)` pairs.
    #[serde(default, deserialize_with = "lenient::name_pairs")]
    pub calls: Vec<(String, String)>,
    #[serde(default, deserialize_with = "lenient::string_vec")]
    pub usages: Vec<String>,
}

/// Chunk metadata as written by the indexer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub chunk_uid: Option<String>,
    #[serde(default)]
    pub file: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub signature: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub start: Option<i64>,
    #[serde(default)]
    pub code_relations: Option<CodeRelations>,
}

impl ChunkMeta {
    pub fn new(id: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn calls(mut self, callee: impl Into<String>) -> Self {
        let caller = self.name.clone().unwrap_or_default();
        self.code_relations
            .get_or_insert_with(CodeRelations::default)
            .calls
            .push((caller, callee.into()));
        self
    }

    /// Uid used for graph identity; falls back to the chunk id.
    pub fn uid(&self) -> &str {
        self.chunk_uid.as_deref().unwrap_or(&self.id)
    }
}

/// One node of a graph artifact. Fields with the wrong JSON shape read as `None`.
///
/// `out` and `in` keep only non-empty string ids; `out_len` is the length of the
/// `out` array as written, which is what declared edge counts are checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawGraphNode")]
pub struct GraphNodeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<Vec<String>>,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub incoming: Option<Vec<String>>,
    #[serde(skip)]
    pub out_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Deserialize)]
struct RawGraphNode {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    out: Value,
    #[serde(default, rename = "in")]
    incoming: Value,
    #[serde(default)]
    file: Value,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    kind: Value,
    #[serde(default)]
    signature: Value,
}

impl From<RawGraphNode> for GraphNodeRecord {
    fn from(raw: RawGraphNode) -> Self {
        let out_len = raw.out.as_array().map_or(0, Vec::len);
        Self {
            id: match raw.id {
                Value::String(id) => Some(id),
                _ => None,
            },
            out: lenient::string_list_value(raw.out),
            incoming: lenient::string_list_value(raw.incoming),
            out_len,
            file: lenient::string_value(raw.file),
            name: lenient::string_value(raw.name),
            kind: lenient::string_value(raw.kind),
            signature: lenient::string_value(raw.signature),
        }
    }
}

impl GraphNodeRecord {
    pub fn new(id: impl Into<String>, out: &[&str], incoming: &[&str]) -> Self {
        Self {
            id: Some(id.into()),
            out: Some(out.iter().map(|s| s.to_string()).collect()),
            incoming: Some(incoming.iter().map(|s| s.to_string()).collect()),
            out_len: out.len(),
            ..Self::default()
        }
    }

    pub fn has_metadata(&self) -> bool {
        self.file.is_some() || self.name.is_some() || self.kind.is_some() || self.signature.is_some()
    }
}

/// A serialized relation graph with advisory build-time counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphArtifact {
    #[serde(default, deserialize_with = "lenient::records_or_default")]
    pub nodes: Vec<GraphNodeRecord>,
    #[serde(default, deserialize_with = "lenient::finite_number")]
    pub node_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient::finite_number")]
    pub edge_count: Option<f64>,
}

impl GraphArtifact {
    pub fn from_nodes(nodes: Vec<GraphNodeRecord>) -> Self {
        Self {
            nodes,
            node_count: None,
            edge_count: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRelations {
    #[serde(default)]
    pub call_graph: Option<GraphArtifact>,
    #[serde(default)]
    pub usage_graph: Option<GraphArtifact>,
    #[serde(default)]
    pub import_graph: Option<GraphArtifact>,
}

impl GraphRelations {
    /// The three node/edge graphs in a fixed order.
    pub fn graphs(&self) -> [(GraphKind, Option<&GraphArtifact>); 3] {
        [
            (GraphKind::CallGraph, self.call_graph.as_ref()),
            (GraphKind::UsageGraph, self.usage_graph.as_ref()),
            (GraphKind::ImportGraph, self.import_graph.as_ref()),
        ]
    }
}

/// A resolved call site between two chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSite {
    #[serde(default, deserialize_with = "lenient::string")]
    pub caller_chunk_uid: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub target_chunk_uid: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub call_site_id: Option<String>,
}

/// Directed relation graph over string node ids (chunk uids or normalized paths).
pub struct RelationGraph {
    pub graph: DiGraph<String, ()>,
    pub node_index: HashMap<String, NodeIndex>,
}
