use context_graph::{
    normalize_edge_filter, resolve_seed_node_ref, validate_graph_relations, ChunkMeta,
    ContextExpander, ContextExpansionOptions, ContextIndex, EdgeFilterRequest, EdgeType,
    FileRelationsStore, GraphRelations, GraphSession, NeighborhoodCaps, NeighborhoodRequest,
    NodeRef, RelationRecord, RelationResolver, Seed,
};
use context_protocol::{SearchHit, WarningCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn filter(value: serde_json::Value) -> context_graph::NormalizedEdgeFilter {
    let request: EdgeFilterRequest = serde_json::from_value(value).expect("filter request");
    normalize_edge_filter(&request)
}

#[test]
fn edge_filter_reports_unknown_edge_types() {
    let normalized = filter(json!({"edgeTypes": "calls,bogus"}));
    assert_eq!(normalized.normalized_edge_types, vec![EdgeType::Call]);
    assert_eq!(normalized.unknown_edge_types, vec!["bogus".to_string()]);

    let warning = normalized.diagnostics().expect("diagnostic");
    assert_eq!(warning.code, WarningCode::UnknownEdgeFilter);
}

#[test]
fn seed_candidates_resolve_by_first_usable_entry() {
    let seed: Seed = serde_json::from_value(json!({
        "candidates": [{"symbolId": "s1"}, {"chunkUid": "c1"}]
    }))
    .expect("seed");
    assert_eq!(
        serde_json::to_value(resolve_seed_node_ref(&seed)).unwrap(),
        json!({"type": "symbol", "symbolId": "s1"})
    );
}

#[test]
fn validator_reports_single_count_mismatch() {
    let relations: GraphRelations = serde_json::from_value(json!({
        "callGraph": {
            "nodeCount": 3,
            "nodes": [{"id": "n1", "out": [], "in": []}, {"id": "n2", "out": [], "in": []}]
        }
    }))
    .expect("relations");
    let mut warnings = Vec::new();
    validate_graph_relations(&relations, &mut warnings);

    assert_eq!(warnings.len(), 1);
    let data = warnings[0].data.clone().expect("data");
    assert_eq!(data["expected"], json!(3.0));
    assert_eq!(data["actual"], json!(2));
}

#[test]
fn ambiguous_relation_keys_never_resolve_case_insensitively() {
    let first = RelationRecord {
        usages: Some(vec!["one".to_string()]),
        ..RelationRecord::default()
    };
    let second = RelationRecord {
        usages: Some(vec!["two".to_string()]),
        ..RelationRecord::default()
    };
    let store: Arc<FileRelationsStore> = Arc::new(
        [
            ("src/Widget.ts".to_string(), first.clone()),
            ("src/widget.TS".to_string(), second),
        ]
        .into_iter()
        .collect(),
    );
    let mut resolver = RelationResolver::new();

    assert_eq!(resolver.resolve_file_relations(&store, "src/widget.ts", false), None);
    assert_eq!(
        resolver.resolve_file_relations(&store, "src/Widget.ts", false),
        Some(&first)
    );
}

#[test]
fn expansion_warns_about_ambiguous_relations() {
    let store: FileRelationsStore = [
        (
            "src/A.ts".to_string(),
            RelationRecord {
                import_links: Some(vec!["src/b.ts".to_string()]),
                ..RelationRecord::default()
            },
        ),
        ("src/a.TS".to_string(), RelationRecord::default()),
    ]
    .into_iter()
    .collect();
    let index = ContextIndex::new(vec![
        ChunkMeta::new("c1", "src/a.ts").named("alpha"),
        ChunkMeta::new("c2", "src/b.ts").named("beta"),
    ])
    .with_file_relations(Arc::new(store));
    let mut expander = ContextExpander::new(
        ContextExpansionOptions::default(),
        filter(json!({})),
    )
    .expect("expander");

    let expansion = expander.expand(&[SearchHit::new("c1", "src/a.ts")], &index, None);
    assert!(expansion.context_hits.is_empty());
    assert_eq!(expansion.warnings.len(), 1);
    assert_eq!(expansion.warnings[0].code, WarningCode::RelationLookupAmbiguous);
}

#[test]
fn expansion_cache_follows_filter_changes() {
    let index = ContextIndex::new(vec![
        ChunkMeta::new("c1", "src/a.rs").named("alpha").calls("beta"),
        ChunkMeta::new("c2", "src/b.rs").named("beta"),
    ]);
    let mut expander =
        ContextExpander::new(ContextExpansionOptions::default(), filter(json!({}))).unwrap();
    let hits = [SearchHit::new("c1", "src/a.rs")];

    assert!(!expander.expand(&hits, &index, None).stats.cache_hit);
    assert!(expander.expand(&hits, &index, None).stats.cache_hit);

    expander.set_filter(filter(json!({"edgeTypes": "imports"})));
    let filtered = expander.expand(&hits, &index, None);
    assert!(!filtered.stats.cache_hit);
    assert!(filtered.context_hits.is_empty());
    assert_eq!(expander.cached_entries(), 2);
}

#[test]
fn neighborhood_is_bounded_and_sorted() {
    let relations: GraphRelations = serde_json::from_value(json!({
        "callGraph": {"nodes": [
            {"id": "root", "out": ["z", "y", "x", "w"], "in": []}
        ]}
    }))
    .unwrap();
    let session = GraphSession::new(Some(&relations), &[], None);
    let request = NeighborhoodRequest::new(NodeRef::chunk("root")).with_caps(NeighborhoodCaps {
        max_nodes: Some(3),
        ..NeighborhoodCaps::default()
    });
    let result = session.neighborhood(&request);

    let keys: Vec<String> = result.nodes.iter().map(|n| n.node.key()).collect();
    assert_eq!(keys, vec!["chunk:root", "chunk:w", "chunk:x"]);
    assert_eq!(result.edges.len(), 4);
    assert_eq!(result.truncation.len(), 1);
    assert_eq!(result.truncation[0].omitted, Some(2));
}

#[test]
fn expansion_cache_distinguishes_chunk_uids_behind_one_hit_id() {
    let index = ContextIndex::new(vec![
        ChunkMeta::new("c1", "src/a.rs").named("alpha").calls("beta"),
        ChunkMeta::new("c2", "src/b.rs").named("beta"),
        ChunkMeta::new("c3", "src/a.rs").named("gamma").calls("delta"),
        ChunkMeta::new("c4", "src/d.rs").named("delta"),
    ]);
    let mut expander =
        ContextExpander::new(ContextExpansionOptions::default(), filter(json!({}))).unwrap();
    let hit = |uid: &str| SearchHit::new("h", "src/a.rs").with_field("chunkUid", json!(uid));

    let first = expander.expand(&[hit("c1")], &index, None);
    let ids: Vec<&str> = first.context_hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["c2"]);

    let second = expander.expand(&[hit("c3")], &index, None);
    assert!(!second.stats.cache_hit);
    let ids: Vec<&str> = second.context_hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["c4"]);
}
