use crate::types::{GraphArtifact, GraphKind, GraphRelations};
use context_protocol::{Warning, WarningCode};
use serde_json::json;

const MAX_INVALID_NODE_SAMPLES: usize = 3;

/// Check declared node/edge counts and node shapes of every graph artifact.
///
/// Never fails and never touches the artifacts; problems are appended to `warnings`.
pub fn validate_graph_relations(relations: &GraphRelations, warnings: &mut Vec<Warning>) {
    for (kind, artifact) in relations.graphs() {
        if let Some(artifact) = artifact {
            validate_artifact(kind, artifact, warnings);
        }
    }
}

fn validate_artifact(kind: GraphKind, artifact: &GraphArtifact, warnings: &mut Vec<Warning>) {
    let actual_nodes = artifact.nodes.len();
    if let Some(declared) = artifact.node_count {
        check_count(kind, "nodeCount", declared, actual_nodes, warnings);
    }

    if let Some(declared) = artifact.edge_count {
        let actual_edges: usize = artifact.nodes.iter().map(|node| node.out_len).sum();
        check_count(kind, "edgeCount", declared, actual_edges, warnings);
    }

    let mut invalid = 0usize;
    let mut samples = Vec::new();
    for (index, node) in artifact.nodes.iter().enumerate() {
        let mut missing = Vec::new();
        if node.id.is_none() {
            missing.push("id");
        }
        if node.out.is_none() {
            missing.push("out");
        }
        if node.incoming.is_none() {
            missing.push("in");
        }
        if missing.is_empty() {
            continue;
        }
        invalid += 1;
        if samples.len() < MAX_INVALID_NODE_SAMPLES {
            samples.push(json!({
                "index": index,
                "id": node.id,
                "missing": missing,
            }));
        }
    }

    if invalid > 0 {
        log::warn!("{kind}: {invalid} of {actual_nodes} nodes are malformed");
        warnings.push(
            Warning::new(
                WarningCode::GraphNodeInvalid,
                format!("{kind} has {invalid} malformed nodes"),
            )
            .with_data(json!({
                "graph": kind.as_str(),
                "invalidNodes": invalid,
                "samples": samples,
            })),
        );
    }
}

fn check_count(
    kind: GraphKind,
    field: &str,
    declared: f64,
    actual: usize,
    warnings: &mut Vec<Warning>,
) {
    if declared == actual as f64 {
        return;
    }
    log::warn!("{kind}.{field} declares {declared} but found {actual}");
    warnings.push(
        Warning::new(
            WarningCode::GraphCountMismatch,
            format!("{kind}.{field} does not match the artifact"),
        )
        .with_data(json!({
            "graph": kind.as_str(),
            "field": field,
            "expected": declared,
            "actual": actual,
        })),
    );
}
