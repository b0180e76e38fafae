use crate::edge_filter::{normalize_edge_filter, EdgeFilterRequest, EdgeProbe, NormalizedEdgeFilter};
use crate::error::GraphError;
use crate::node_ref::{
    format_evidence, normalize_import_path, resolve_node_meta, resolve_seed_node_ref,
    CallSiteIndex, ChunkInfo, Evidence, ImportGraphIndex,
};
use crate::types::{CallSite, EdgeType, GraphKind, GraphRelations, NodeRef, RelationGraph, Seed};
use context_protocol::{TruncationCap, TruncationLog, TruncationRecord, Warning, WarningCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const MAX_IMPORT_MISS_WARNINGS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    #[default]
    Both,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Both => "both",
        }
    }

    /// Anything unrecognized reads as `Both`.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    fn follows_out(self) -> bool {
        matches!(self, Self::Out | Self::Both)
    }

    fn follows_in(self) -> bool {
        matches!(self, Self::In | Self::Both)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "both" => Ok(Self::Both),
            _ => Err(GraphError::UnknownDirection(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Self::parse_lenient).unwrap_or_default())
    }
}

/// Size limits for one neighborhood walk. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NeighborhoodCaps {
    pub max_depth: Option<usize>,
    pub max_fanout_per_node: Option<usize>,
    pub max_nodes: Option<usize>,
    pub max_edges: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodRequest {
    pub seed: Seed,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_depth")]
    pub depth: usize,
    #[serde(default, alias = "edgeFilters")]
    pub edge_filter: EdgeFilterRequest,
    #[serde(default)]
    pub caps: NeighborhoodCaps,
}

fn default_depth() -> usize {
    1
}

impl NeighborhoodRequest {
    pub fn new(seed: impl Into<Seed>) -> Self {
        Self {
            seed: seed.into(),
            direction: Direction::Both,
            depth: 1,
            edge_filter: EdgeFilterRequest::default(),
            caps: NeighborhoodCaps::default(),
        }
    }

    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn with_caps(mut self, caps: NeighborhoodCaps) -> Self {
        self.caps = caps;
        self
    }

    #[must_use]
    pub fn with_edge_filter(mut self, edge_filter: EdgeFilterRequest) -> Self {
        self.edge_filter = edge_filter;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodNode {
    #[serde(rename = "ref")]
    pub node: NodeRef,
    pub distance: usize,
    pub label: Option<String>,
    pub file: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodEdge {
    pub edge_type: EdgeType,
    pub graph: GraphKind,
    pub from: NodeRef,
    pub to: NodeRef,
    pub confidence: Option<f64>,
    pub evidence: Option<Evidence>,
}

impl NeighborhoodEdge {
    fn key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.graph,
            self.edge_type,
            self.from.key(),
            self.to.key()
        )
    }
}

fn compare_edges(a: &NeighborhoodEdge, b: &NeighborhoodEdge) -> Ordering {
    a.graph
        .cmp(&b.graph)
        .then_with(|| a.edge_type.cmp(&b.edge_type))
        .then_with(|| a.from.key().cmp(&b.from.key()))
        .then_with(|| a.to.key().cmp(&b.to.key()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodStats {
    pub graph_relations: bool,
    pub call_sites: bool,
    pub nodes_returned: usize,
    pub edges_returned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNeighborhood {
    pub nodes: Vec<NeighborhoodNode>,
    pub edges: Vec<NeighborhoodEdge>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub truncation: Vec<TruncationRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    pub stats: NeighborhoodStats,
}

/// Graphs and indexes of one repository, built once and queried many times.
pub struct GraphSession {
    call_graph: Option<RelationGraph>,
    usage_graph: Option<RelationGraph>,
    import_graph: Option<RelationGraph>,
    has_graph_relations: bool,
    chunk_info: ChunkInfo,
    import_index: ImportGraphIndex,
    call_sites: CallSiteIndex,
    repo_root: Option<PathBuf>,
}

impl GraphSession {
    pub fn new(
        graph_relations: Option<&GraphRelations>,
        call_sites: &[CallSite],
        repo_root: Option<&Path>,
    ) -> Self {
        let plain = |id: &str| (!id.is_empty()).then(|| id.to_string());
        let normalize = |id: &str| normalize_import_path(id, repo_root);
        let build = |graph: Option<&crate::types::GraphArtifact>, import: bool| {
            graph
                .map(|artifact| {
                    if import {
                        RelationGraph::from_artifact(artifact, normalize)
                    } else {
                        RelationGraph::from_artifact(artifact, plain)
                    }
                })
                .filter(|g| g.node_count() > 0)
        };

        let session = Self {
            call_graph: build(graph_relations.and_then(|r| r.call_graph.as_ref()), false),
            usage_graph: build(graph_relations.and_then(|r| r.usage_graph.as_ref()), false),
            import_graph: build(graph_relations.and_then(|r| r.import_graph.as_ref()), true),
            has_graph_relations: graph_relations.is_some(),
            chunk_info: graph_relations
                .map(ChunkInfo::from_graph_relations)
                .unwrap_or_default(),
            import_index: ImportGraphIndex::build(
                graph_relations.and_then(|r| r.import_graph.as_ref()),
                repo_root,
            ),
            call_sites: CallSiteIndex::build(call_sites),
            repo_root: repo_root.map(Path::to_path_buf),
        };
        log::debug!(
            "Graph session: call={} usage={} import={} nodes",
            session.call_graph.as_ref().map_or(0, RelationGraph::node_count),
            session.usage_graph.as_ref().map_or(0, RelationGraph::node_count),
            session.import_graph.as_ref().map_or(0, RelationGraph::node_count),
        );
        session
    }

    fn normalize(&self, path: &str) -> Option<String> {
        normalize_import_path(path, self.repo_root.as_deref())
    }

    pub fn neighborhood(&self, request: &NeighborhoodRequest) -> GraphNeighborhood {
        let filter = normalize_edge_filter(&request.edge_filter);
        let mut walk = Walk::new(self, &filter, request);

        if let Some(warning) = filter.diagnostics() {
            walk.warnings.push(warning);
        }
        let wants_relations = [GraphKind::CallGraph, GraphKind::UsageGraph, GraphKind::ImportGraph]
            .into_iter()
            .any(|kind| filter.includes_graph(kind));
        if !self.has_graph_relations && wants_relations {
            walk.warnings.push(Warning::new(
                WarningCode::MissingGraphRelations,
                "Graph relations artifact missing; graph expansion limited.",
            ));
        }

        let Some(seed) = resolve_seed_node_ref(&request.seed) else {
            walk.warnings.push(Warning::new(
                WarningCode::UnresolvedSeed,
                "Seed could not be resolved to a graph node.",
            ));
            return walk.finish();
        };

        walk.add_node(seed, 0);
        walk.run();
        walk.finish()
    }
}

struct Candidate {
    edge: NeighborhoodEdge,
    next: NodeRef,
}

struct Walk<'a> {
    session: &'a GraphSession,
    filter: &'a NormalizedEdgeFilter,
    direction: Direction,
    depth: usize,
    caps: NeighborhoodCaps,
    nodes: HashMap<String, NeighborhoodNode>,
    edge_keys: HashSet<String>,
    edges: Vec<NeighborhoodEdge>,
    queue: VecDeque<(NodeRef, usize)>,
    truncation: TruncationLog,
    warnings: Vec<Warning>,
    import_misses: Vec<String>,
}

impl<'a> Walk<'a> {
    fn new(
        session: &'a GraphSession,
        filter: &'a NormalizedEdgeFilter,
        request: &NeighborhoodRequest,
    ) -> Self {
        let mut truncation = TruncationLog::new("graph");
        let depth = match request.caps.max_depth {
            Some(max_depth) if request.depth > max_depth => {
                truncation.record(TruncationCap::MaxDepth, max_depth, Some(request.depth), None, None);
                max_depth
            }
            _ => request.depth,
        };
        Self {
            session,
            filter,
            direction: request.direction,
            depth,
            caps: request.caps,
            nodes: HashMap::new(),
            edge_keys: HashSet::new(),
            edges: Vec::new(),
            queue: VecDeque::new(),
            truncation,
            warnings: Vec::new(),
            import_misses: Vec::new(),
        }
    }

    fn normalize_file_ref(&self, node: NodeRef) -> NodeRef {
        match &node {
            NodeRef::File { path } => match self.session.normalize(path) {
                Some(normalized) if &normalized != path => NodeRef::file(normalized),
                _ => node,
            },
            _ => node,
        }
    }

    fn add_node(&mut self, node: NodeRef, distance: usize) -> bool {
        let node = self.normalize_file_ref(node);
        let key = node.key();
        if self.nodes.contains_key(&key) {
            return false;
        }
        if let Some(max_nodes) = self.caps.max_nodes {
            if self.nodes.len() >= max_nodes {
                self.truncation.record(
                    TruncationCap::MaxNodes,
                    max_nodes,
                    Some(self.nodes.len()),
                    Some(1),
                    Some(key),
                );
                return false;
            }
        }
        let meta = resolve_node_meta(
            &node,
            &self.session.chunk_info,
            &self.session.import_index,
            |path| self.session.normalize(path),
        );
        if distance < self.depth {
            self.queue.push_back((node.clone(), distance));
        }
        self.nodes.insert(
            key,
            NeighborhoodNode {
                label: meta.label().map(ToString::to_string),
                node,
                distance,
                file: meta.file,
                kind: meta.kind,
                name: meta.name,
                signature: meta.signature,
            },
        );
        true
    }

    fn run(&mut self) {
        while let Some((current, distance)) = self.queue.pop_front() {
            if distance >= self.depth {
                continue;
            }
            let mut candidates = self.candidates(&current);
            candidates.sort_by(|a, b| compare_edges(&a.edge, &b.edge));

            if let Some(max_fanout) = self.caps.max_fanout_per_node {
                if candidates.len() > max_fanout {
                    self.truncation.record(
                        TruncationCap::MaxFanoutPerNode,
                        max_fanout,
                        Some(candidates.len()),
                        Some(candidates.len() - max_fanout),
                        Some(current.key()),
                    );
                    candidates.truncate(max_fanout);
                }
            }

            for Candidate { edge, next } in candidates {
                if !self.add_edge(edge) {
                    return;
                }
                if !self.nodes.contains_key(&next.key()) {
                    self.add_node(next, distance + 1);
                }
            }
        }
    }

    /// Adds the edge unless it is a duplicate. Returns `false` once the edge cap
    /// stops the walk.
    fn add_edge(&mut self, edge: NeighborhoodEdge) -> bool {
        let key = edge.key();
        if self.edge_keys.contains(&key) {
            return true;
        }
        if let Some(max_edges) = self.caps.max_edges {
            if self.edges.len() >= max_edges {
                self.truncation.record(
                    TruncationCap::MaxEdges,
                    max_edges,
                    Some(self.edges.len()),
                    Some(1),
                    None,
                );
                return false;
            }
        }
        self.edge_keys.insert(key);
        self.edges.push(edge);
        true
    }

    fn candidates(&mut self, current: &NodeRef) -> Vec<Candidate> {
        let mut out = Vec::new();
        let session = self.session;

        if let NodeRef::Chunk { chunk_uid } = current {
            for (kind, edge_type, graph) in [
                (GraphKind::CallGraph, EdgeType::Call, session.call_graph.as_ref()),
                (GraphKind::UsageGraph, EdgeType::Usage, session.usage_graph.as_ref()),
            ] {
                let Some(graph) = graph else {
                    continue;
                };
                self.push_relations(&mut out, kind, edge_type, graph, chunk_uid, current, |id| {
                    NodeRef::Chunk { chunk_uid: id }
                });
            }
        }

        let import_graph = session
            .import_graph
            .as_ref()
            .filter(|_| self.filter.includes_graph(GraphKind::ImportGraph));
        if let Some(import_graph) = import_graph {
            if let Some(source_id) = self.import_source_id(current) {
                if !session.import_index.contains(&source_id) {
                    self.record_import_miss(&source_id);
                }
                let from = match current {
                    NodeRef::File { .. } => NodeRef::file(source_id.clone()),
                    other => other.clone(),
                };
                self.push_relations(
                    &mut out,
                    GraphKind::ImportGraph,
                    EdgeType::Import,
                    import_graph,
                    &source_id,
                    &from,
                    |path| NodeRef::File { path },
                );
            }
        }

        out
    }

    #[allow(clippy::too_many_arguments)]
    fn push_relations(
        &self,
        out: &mut Vec<Candidate>,
        kind: GraphKind,
        edge_type: EdgeType,
        graph: &RelationGraph,
        id: &str,
        current: &NodeRef,
        to_ref: fn(String) -> NodeRef,
    ) {
        if !self.filter.allows(&EdgeProbe::new(kind, edge_type, None)) {
            return;
        }
        let mut push = |from: NodeRef, to: NodeRef, next: NodeRef| {
            let evidence = format_evidence(edge_type, &from, &to, &self.session.call_sites);
            out.push(Candidate {
                edge: NeighborhoodEdge {
                    edge_type,
                    graph: kind,
                    from,
                    to,
                    confidence: None,
                    evidence,
                },
                next,
            });
        };
        if self.direction.follows_out() {
            for neighbor in graph.successors(id) {
                let neighbor = to_ref(neighbor);
                push(current.clone(), neighbor.clone(), neighbor);
            }
        }
        if self.direction.follows_in() {
            for neighbor in graph.predecessors(id) {
                let neighbor = to_ref(neighbor);
                push(neighbor.clone(), current.clone(), neighbor);
            }
        }
    }

    fn import_source_id(&self, node: &NodeRef) -> Option<String> {
        match node {
            NodeRef::File { path } => self.session.normalize(path),
            NodeRef::Chunk { chunk_uid } => self
                .session
                .chunk_info
                .get(chunk_uid)
                .and_then(|meta| meta.file.as_deref())
                .and_then(|file| self.session.normalize(file)),
            NodeRef::Symbol { .. } => None,
        }
    }

    fn record_import_miss(&mut self, source_id: &str) {
        if self.import_misses.len() >= MAX_IMPORT_MISS_WARNINGS
            || self.import_misses.iter().any(|m| m == source_id)
        {
            return;
        }
        self.import_misses.push(source_id.to_string());
        self.warnings.push(
            Warning::new(
                WarningCode::ImportGraphLookupMiss,
                "Import graph lookup missed for a normalized path; import expansion may be incomplete.",
            )
            .with_data(serde_json::json!({ "path": source_id })),
        );
    }

    fn finish(self) -> GraphNeighborhood {
        let mut nodes: Vec<NeighborhoodNode> = self.nodes.into_values().collect();
        nodes.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.node.key().cmp(&b.node.key()))
        });
        let mut edges = self.edges;
        edges.sort_by(compare_edges);

        let stats = NeighborhoodStats {
            graph_relations: self.session.has_graph_relations,
            call_sites: !self.session.call_sites.is_empty(),
            nodes_returned: nodes.len(),
            edges_returned: edges.len(),
        };
        GraphNeighborhood {
            nodes,
            edges,
            truncation: self.truncation.into_records(),
            warnings: self.warnings,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn relations() -> GraphRelations {
        serde_json::from_value(json!({
            "callGraph": {"nodes": [
                {"id": "a", "out": ["b", "c"], "in": [], "file": "src/a.ts", "name": "alpha"},
                {"id": "b", "out": ["d"], "in": ["a"], "file": "src/b.ts", "name": "beta"},
                {"id": "c", "out": [], "in": ["a"], "file": "src/c.ts"},
                {"id": "d", "out": [], "in": ["b"], "file": "src/d.ts"}
            ]},
            "usageGraph": {"nodes": []},
            "importGraph": {"nodes": [
                {"id": "src/a.ts", "out": ["src/lib.ts"], "in": []},
                {"id": "src/lib.ts", "out": [], "in": ["src/a.ts"]}
            ]}
        }))
        .unwrap()
    }

    fn keys(result: &GraphNeighborhood) -> Vec<String> {
        result.nodes.iter().map(|n| n.node.key()).collect()
    }

    #[test]
    fn test_one_hop_out_is_sorted() {
        let session = GraphSession::new(Some(&relations()), &[], None);
        let result = session.neighborhood(
            &NeighborhoodRequest::new(NodeRef::chunk("a")).with_direction(Direction::Out),
        );

        assert_eq!(
            keys(&result),
            vec!["chunk:a", "chunk:b", "chunk:c", "file:src/lib.ts"]
        );
        assert_eq!(result.nodes[0].label.as_deref(), Some("alpha"));
        assert_eq!(result.nodes[2].label.as_deref(), Some("src/c.ts"));
        assert_eq!(result.edges.len(), 3);
        assert_eq!(result.edges[0].graph, GraphKind::CallGraph);
        assert_eq!(result.edges[2].graph, GraphKind::ImportGraph);
        assert_eq!(result.edges[2].from, NodeRef::chunk("a"));
        assert!(result.warnings.is_empty());
        assert!(result.truncation.is_empty());
    }

    #[test]
    fn test_incoming_edges_are_oriented() {
        let session = GraphSession::new(Some(&relations()), &[], None);
        let request = NeighborhoodRequest::new(NodeRef::chunk("b"))
            .with_direction(Direction::In)
            .with_edge_filter(EdgeFilterRequest {
                graphs: Some("callGraph".into()),
                ..EdgeFilterRequest::default()
            });
        let result = session.neighborhood(&request);

        assert_eq!(keys(&result), vec!["chunk:b", "chunk:a"]);
        assert_eq!(result.edges[0].from, NodeRef::chunk("a"));
        assert_eq!(result.edges[0].to, NodeRef::chunk("b"));
    }

    #[test]
    fn test_depth_and_caps_record_truncation() {
        let session = GraphSession::new(Some(&relations()), &[], None);
        let request = NeighborhoodRequest::new(NodeRef::chunk("a"))
            .with_direction(Direction::Out)
            .with_depth(5)
            .with_caps(NeighborhoodCaps {
                max_depth: Some(2),
                max_fanout_per_node: Some(1),
                ..NeighborhoodCaps::default()
            });
        let result = session.neighborhood(&request);

        assert_eq!(keys(&result), vec!["chunk:a", "chunk:b", "chunk:d"]);
        let caps: Vec<TruncationCap> = result.truncation.iter().map(|t| t.cap).collect();
        assert_eq!(caps, vec![TruncationCap::MaxDepth, TruncationCap::MaxFanoutPerNode]);
        assert_eq!(result.truncation[0].observed, Some(5));
    }

    #[test]
    fn test_edge_cap_stops_the_walk() {
        let session = GraphSession::new(Some(&relations()), &[], None);
        let request = NeighborhoodRequest::new(NodeRef::chunk("a"))
            .with_direction(Direction::Out)
            .with_caps(NeighborhoodCaps {
                max_edges: Some(1),
                ..NeighborhoodCaps::default()
            });
        let result = session.neighborhood(&request);

        assert_eq!(result.edges.len(), 1);
        assert_eq!(keys(&result), vec!["chunk:a", "chunk:b"]);
        assert_eq!(result.truncation[0].cap, TruncationCap::MaxEdges);
    }

    #[test]
    fn test_call_site_evidence() {
        let sites = [CallSite {
            caller_chunk_uid: Some("a".into()),
            target_chunk_uid: Some("b".into()),
            call_site_id: Some("cs-1".into()),
        }];
        let session = GraphSession::new(Some(&relations()), &sites, None);
        let result = session.neighborhood(
            &NeighborhoodRequest::new(NodeRef::chunk("a")).with_direction(Direction::Out),
        );
        assert_eq!(
            result.edges[0].evidence.as_ref().map(|e| e.call_site_ids.clone()),
            Some(vec!["cs-1".to_string()])
        );
        assert!(result.stats.call_sites);
    }

    #[test]
    fn test_unresolved_seed_and_missing_relations() {
        let session = GraphSession::new(None, &[], None);
        let seed: Seed = serde_json::from_value(json!({"candidates": []})).unwrap();
        let result = session.neighborhood(&NeighborhoodRequest::new(seed));

        assert!(result.nodes.is_empty());
        let codes: Vec<WarningCode> = result.warnings.iter().map(|w| w.code).collect();
        assert_eq!(
            codes,
            vec![WarningCode::MissingGraphRelations, WarningCode::UnresolvedSeed]
        );
    }

    #[test]
    fn test_import_misses_are_capped() {
        let session = GraphSession::new(Some(&relations()), &[], None);
        let mut warnings = Vec::new();
        for path in ["x1.ts", "x2.ts", "x3.ts", "x4.ts"] {
            let result = session.neighborhood(&NeighborhoodRequest::new(NodeRef::file(path)));
            warnings.extend(result.warnings);
        }
        assert_eq!(warnings.len(), 4);

        let filter = normalize_edge_filter(&EdgeFilterRequest::default());
        let request = NeighborhoodRequest::new(NodeRef::file("x.ts"));
        let mut walk = Walk::new(&session, &filter, &request);
        for path in ["m1", "m2", "m2", "m3", "m4"] {
            walk.record_import_miss(path);
        }
        assert_eq!(walk.warnings.len(), MAX_IMPORT_MISS_WARNINGS);
    }

    #[test]
    fn test_request_from_json() {
        let request: NeighborhoodRequest = serde_json::from_value(json!({
            "seed": {"type": "file", "path": "/repo/src/a.ts"},
            "direction": "sideways",
            "edgeFilters": {"graphs": "importGraph"}
        }))
        .unwrap();
        assert_eq!(request.direction, Direction::Both);
        assert_eq!(request.depth, 1);

        let session = GraphSession::new(Some(&relations()), &[], Some(Path::new("/repo")));
        let result = session.neighborhood(&request);
        assert_eq!(keys(&result), vec!["file:src/a.ts", "file:src/lib.ts"]);
        assert_eq!(result.edges[0].from, NodeRef::file("src/a.ts"));
        assert!("sideways".parse::<Direction>().is_err());
    }
}
