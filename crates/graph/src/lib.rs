//! # Context Graph
//!
//! Query-time relation graph services over indexer artifacts.
//!
//! ## Features
//!
//! - **Edge filters** - normalize user graph/edge-type/confidence filters into a predicate
//! - **Relation lookup** - file relations with a case-insensitive fallback that refuses ambiguous keys
//! - **Context expansion** - pull related chunks (calls, imports, usages, exports) next to search hits
//! - **Graph neighborhood** - bounded breadth-first walk around one seed node
//! - **Artifact validation** - count and shape checks reported as warnings
//!
//! ## Architecture
//!
//! ```text
//! GraphRelations / ChunkMeta[] / FileRelationsStore / CallSite[]
//!     │
//!     ├──> Validator (nodeCount / edgeCount / node shape warnings)
//!     │
//!     ├──> ContextIndex (by id, name, file, callee)
//!     │      └─> ContextExpander
//!     │             ├─ Seed resolution (chunk > symbol > path)
//!     │             ├─ Candidate collection + edge filter
//!     │             ├─ Per-hit / total caps with truncation records
//!     │             └─ NeighborhoodCache (LRU, keyed by index generation + request shape)
//!     │
//!     └──> GraphSession (petgraph per artifact)
//!            └─ neighborhood(): sorted nodes/edges, caps, call-site evidence
//! ```
//!
//! Malformed artifacts never fail a request: problems degrade to empty results plus
//! [`context_protocol::Warning`]s.

mod cache;
mod edge_filter;
mod error;
mod expansion;
mod graph;
mod lenient;
mod neighborhood;
mod node_ref;
mod relations;
mod types;
mod validate;

pub use cache::NeighborhoodCache;
pub use edge_filter::{
    normalize_edge_filter, ConfidenceInput, EdgeFilterRequest, EdgeProbe, FilterList,
    NormalizedEdgeFilter,
};
pub use error::{GraphError, Result};
pub use expansion::{
    ContextExpander, ContextExpansion, ContextExpansionOptions, ContextHit, ContextIndex,
    ExpansionStats, DEFAULT_NEIGHBORHOOD_CACHE_SIZE,
};
pub use neighborhood::{
    Direction, GraphNeighborhood, GraphSession, NeighborhoodCaps, NeighborhoodEdge,
    NeighborhoodNode, NeighborhoodRequest, NeighborhoodStats,
};
pub use node_ref::{
    format_evidence, normalize_import_path, resolve_node_meta, resolve_seed_node_ref,
    CallSiteIndex, ChunkInfo, Evidence, ImportGraphIndex, NodeMeta, MAX_EVIDENCE_CALL_SITES,
};
pub use relations::{FileRelationsStore, RelationLookup, RelationRecord, RelationResolver};
pub use types::{
    CallSite, CandidateRef, ChunkMeta, CodeRelations, EdgeType, GraphArtifact, GraphKind,
    GraphNodeRecord, GraphRelations, NodeRef, PendingSeed, RelationGraph, Seed,
};
pub use validate::validate_graph_relations;
