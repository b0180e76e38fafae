use crate::types::{GraphArtifact, RelationGraph};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction as EdgeDirection;
use std::collections::{BTreeSet, HashMap};

impl RelationGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    /// Build from an artifact using both `out` and `in` lists, so a relation
    /// written on only one side still becomes an edge. Ids pass through `map_id`
    /// (used to normalize import paths); ids it rejects are skipped.
    pub fn from_artifact(
        artifact: &GraphArtifact,
        map_id: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut graph = Self::new();
        for node in &artifact.nodes {
            let Some(id) = node.id.as_deref().and_then(&map_id) else {
                continue;
            };
            let from = graph.ensure_node(&id);
            for target in node.out.iter().flatten() {
                if let Some(target) = map_id(target) {
                    let to = graph.ensure_node(&target);
                    graph.add_edge(from, to);
                }
            }
            for source in node.incoming.iter().flatten() {
                if let Some(source) = map_id(source) {
                    let src = graph.ensure_node(&source);
                    graph.add_edge(src, from);
                }
            }
        }
        graph
    }

    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.node_index.insert(id.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Outgoing neighbor ids, deduplicated and sorted.
    pub fn successors(&self, id: &str) -> Vec<String> {
        self.neighbors(id, EdgeDirection::Outgoing)
    }

    /// Incoming neighbor ids, deduplicated and sorted.
    pub fn predecessors(&self, id: &str) -> Vec<String> {
        self.neighbors(id, EdgeDirection::Incoming)
    }

    fn neighbors(&self, id: &str, direction: EdgeDirection) -> Vec<String> {
        let Some(&idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for RelationGraph {
    fn default() -> Self {
        Self::new()
    }
}
