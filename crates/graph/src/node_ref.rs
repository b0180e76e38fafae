use crate::types::{
    CallSite, ChunkMeta, EdgeType, GraphArtifact, GraphNodeRecord, GraphRelations, NodeRef, Seed,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Upper bound on call-site ids attached to one call edge.
pub const MAX_EVIDENCE_CALL_SITES: usize = 25;

/// Resolve a seed to one canonical node.
///
/// A seed that is already a node is returned unchanged. Otherwise `resolved` wins,
/// then the first candidate that carries any identity field.
pub fn resolve_seed_node_ref(seed: &Seed) -> Option<NodeRef> {
    match seed {
        Seed::Node(node) => Some(node.clone()),
        Seed::Pending(pending) => pending
            .resolved
            .as_ref()
            .and_then(|resolved| resolved.to_node_ref())
            .or_else(|| pending.candidates.iter().find_map(|c| c.to_node_ref())),
    }
}

/// Repo-relative, forward-slash form of a path as used by the import graph.
pub fn normalize_import_path(value: &str, repo_root: Option<&Path>) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    let mut normalized = value.to_string();
    if let Some(root) = repo_root {
        let path = Path::new(value);
        if path.is_absolute() {
            if let Ok(rel) = path.strip_prefix(root) {
                let rel = rel.to_string_lossy();
                normalized = if rel.is_empty() {
                    ".".to_string()
                } else {
                    rel.into_owned()
                };
            }
        }
    }
    let normalized = normalized.replace('\\', "/");
    Some(match normalized.strip_prefix("./") {
        Some(stripped) => stripped.to_string(),
        None => normalized,
    })
}

/// Display metadata for a node. Fields the source does not know stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl NodeMeta {
    pub fn label(&self) -> Option<&str> {
        self.name.as_deref().or(self.file.as_deref())
    }
}

/// Chunk uid -> metadata.
#[derive(Debug, Clone, Default)]
pub struct ChunkInfo {
    by_uid: HashMap<String, NodeMeta>,
}

impl ChunkInfo {
    /// From call/usage graph nodes; the first node carrying metadata wins.
    pub fn from_graph_relations(relations: &GraphRelations) -> Self {
        let mut info = Self::default();
        for artifact in [&relations.call_graph, &relations.usage_graph]
            .into_iter()
            .flatten()
        {
            for node in &artifact.nodes {
                info.ingest(node);
            }
        }
        info
    }

    pub fn from_chunks(chunks: &[ChunkMeta]) -> Self {
        let mut by_uid = HashMap::with_capacity(chunks.len());
        for chunk in chunks {
            by_uid.entry(chunk.uid().to_string()).or_insert_with(|| NodeMeta {
                file: (!chunk.file.is_empty()).then(|| chunk.file.clone()),
                kind: chunk.kind.clone(),
                name: chunk.name.clone(),
                signature: chunk.signature.clone(),
            });
        }
        Self { by_uid }
    }

    fn ingest(&mut self, node: &GraphNodeRecord) {
        let Some(id) = node.id.as_ref().filter(|id| !id.is_empty()) else {
            return;
        };
        if !node.has_metadata() {
            return;
        }
        self.by_uid.entry(id.clone()).or_insert_with(|| NodeMeta {
            file: node.file.clone(),
            kind: node.kind.clone(),
            name: node.name.clone(),
            signature: node.signature.clone(),
        });
    }

    pub fn get(&self, chunk_uid: &str) -> Option<&NodeMeta> {
        self.by_uid.get(chunk_uid)
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }
}

/// Import graph nodes keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct ImportGraphIndex {
    by_path: HashMap<String, GraphNodeRecord>,
}

impl ImportGraphIndex {
    pub fn build(artifact: Option<&GraphArtifact>, repo_root: Option<&Path>) -> Self {
        let mut by_path = HashMap::new();
        for node in artifact.map(|a| a.nodes.as_slice()).unwrap_or_default() {
            let Some(id) = node.id.as_deref() else {
                continue;
            };
            if let Some(path) = normalize_import_path(id, repo_root) {
                by_path.insert(path, node.clone());
            }
        }
        Self { by_path }
    }

    pub fn get(&self, normalized_path: &str) -> Option<&GraphNodeRecord> {
        self.by_path.get(normalized_path)
    }

    pub fn contains(&self, normalized_path: &str) -> bool {
        self.by_path.contains_key(normalized_path)
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// `"{caller}|{target}"` -> call-site ids, in artifact order.
#[derive(Debug, Clone, Default)]
pub struct CallSiteIndex {
    by_pair: HashMap<String, Vec<String>>,
}

impl CallSiteIndex {
    pub fn build(call_sites: &[CallSite]) -> Self {
        let mut by_pair: HashMap<String, Vec<String>> = HashMap::new();
        for site in call_sites {
            let (Some(caller), Some(target), Some(id)) = (
                &site.caller_chunk_uid,
                &site.target_chunk_uid,
                &site.call_site_id,
            ) else {
                continue;
            };
            by_pair
                .entry(pair_key(caller, target))
                .or_default()
                .push(id.clone());
        }
        Self { by_pair }
    }

    pub fn get(&self, caller: &str, target: &str) -> Option<&[String]> {
        self.by_pair.get(&pair_key(caller, target)).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.by_pair.is_empty()
    }
}

fn pair_key(caller: &str, target: &str) -> String {
    format!("{caller}|{target}")
}

pub fn resolve_node_meta(
    node: &NodeRef,
    chunk_info: &ChunkInfo,
    import_graph_index: &ImportGraphIndex,
    normalize_import_path: impl Fn(&str) -> Option<String>,
) -> NodeMeta {
    match node {
        NodeRef::Chunk { chunk_uid } => chunk_info.get(chunk_uid).cloned().unwrap_or_default(),
        NodeRef::File { path } => {
            let indexed = normalize_import_path(path)
                .and_then(|normalized| import_graph_index.get(&normalized))
                .and_then(|record| record.file.as_deref());
            let raw = indexed.unwrap_or(path);
            NodeMeta {
                file: Some(normalize_import_path(raw).unwrap_or_else(|| path.clone())),
                ..NodeMeta::default()
            }
        }
        NodeRef::Symbol { symbol_id } => NodeMeta {
            name: Some(symbol_id.clone()),
            ..NodeMeta::default()
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub call_site_ids: Vec<String>,
}

/// Call-site evidence for a call edge between two chunks.
pub fn format_evidence(
    edge_type: EdgeType,
    from: &NodeRef,
    to: &NodeRef,
    call_sites: &CallSiteIndex,
) -> Option<Evidence> {
    if edge_type != EdgeType::Call {
        return None;
    }
    let (NodeRef::Chunk { chunk_uid: caller }, NodeRef::Chunk { chunk_uid: target }) = (from, to)
    else {
        return None;
    };
    let ids = call_sites.get(caller, target)?;
    if ids.is_empty() {
        return None;
    }
    Some(Evidence {
        call_site_ids: ids.iter().take(MAX_EVIDENCE_CALL_SITES).cloned().collect(),
    })
}
