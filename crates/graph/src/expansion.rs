use crate::cache::NeighborhoodCache;
use crate::edge_filter::{EdgeProbe, NormalizedEdgeFilter};
use crate::error::{GraphError, Result};
use crate::node_ref::{format_evidence, resolve_seed_node_ref, CallSiteIndex, ChunkInfo, Evidence};
use crate::relations::{FileRelationsStore, RelationLookup, RelationRecord, RelationResolver};
use crate::types::{CandidateRef, ChunkMeta, EdgeType, GraphKind, NodeRef, PendingSeed, Seed};
use context_protocol::{SearchHit, TruncationCap, TruncationLog, TruncationRecord, Warning, WarningCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_NEIGHBORHOOD_CACHE_SIZE: usize = 64;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Lookup tables over one loaded index. Built once, then shared read-only.
///
/// Each instance gets a process-unique generation that scopes cached expansions,
/// so attaching relations or call sites yields a new generation as well.
#[derive(Debug)]
pub struct ContextIndex {
    generation: u64,
    chunks: Vec<ChunkMeta>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    by_file: HashMap<String, Vec<usize>>,
    callers_by_name: HashMap<String, Vec<usize>>,
    chunk_info: ChunkInfo,
    file_relations: Option<Arc<FileRelationsStore>>,
    call_sites: Option<CallSiteIndex>,
}

impl ContextIndex {
    pub fn new(chunks: Vec<ChunkMeta>) -> Self {
        let mut by_id = HashMap::with_capacity(chunks.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
        let mut callers_by_name: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            by_id.entry(chunk.id.clone()).or_insert(idx);
            by_id.entry(chunk.uid().to_string()).or_insert(idx);
            if let Some(name) = &chunk.name {
                by_name.entry(name.clone()).or_default().push(idx);
            }
            if !chunk.file.is_empty() {
                by_file.entry(chunk.file.clone()).or_default().push(idx);
            }
            if let Some(relations) = &chunk.code_relations {
                for (_, callee) in &relations.calls {
                    let callers = callers_by_name.entry(callee.clone()).or_default();
                    if callers.last() != Some(&idx) {
                        callers.push(idx);
                    }
                }
            }
        }

        let chunk_info = ChunkInfo::from_chunks(&chunks);
        log::debug!(
            "Context index: {} chunks, {} names, {} files",
            chunks.len(),
            by_name.len(),
            by_file.len()
        );

        Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            chunks,
            by_id,
            by_name,
            by_file,
            callers_by_name,
            chunk_info,
            file_relations: None,
            call_sites: None,
        }
    }

    #[must_use]
    pub fn with_file_relations(mut self, store: Arc<FileRelationsStore>) -> Self {
        self.file_relations = Some(store);
        self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        self
    }

    #[must_use]
    pub fn with_call_sites(mut self, call_sites: CallSiteIndex) -> Self {
        self.call_sites = Some(call_sites);
        self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Chunk by id or chunk uid.
    pub fn get(&self, id: &str) -> Option<&ChunkMeta> {
        self.by_id.get(id).map(|&idx| &self.chunks[idx])
    }

    pub fn chunk_info(&self) -> &ChunkInfo {
        &self.chunk_info
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn named(&self, name: &str) -> &[usize] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    fn in_file(&self, file: &str) -> &[usize] {
        self.by_file.get(file).map(Vec::as_slice).unwrap_or_default()
    }

    fn callers_of(&self, name: &str) -> &[usize] {
        self.callers_by_name
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextExpansionOptions {
    pub enabled: bool,
    pub max_per_hit: usize,
    pub max_total: usize,
    pub include_calls: bool,
    pub include_imports: bool,
    pub include_usages: bool,
    pub include_exports: bool,
    pub max_call_edges: Option<usize>,
    pub max_usage_edges: Option<usize>,
    pub max_import_edges: Option<usize>,
    pub max_export_edges: Option<usize>,
    pub max_name_candidates: usize,
}

impl Default for ContextExpansionOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_per_hit: 4,
            max_total: 40,
            include_calls: true,
            include_imports: true,
            include_usages: false,
            include_exports: false,
            max_call_edges: None,
            max_usage_edges: None,
            max_import_edges: None,
            max_export_edges: None,
            max_name_candidates: 8,
        }
    }
}

impl ContextExpansionOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_name_candidates == 0 {
            return Err(GraphError::InvalidConfig(
                "max_name_candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Stable rendering of everything that changes the expansion result.
    pub fn signature(&self) -> String {
        fn cap(value: Option<usize>) -> String {
            value.map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        format!(
            "ph={};t={};c={};i={};u={};e={};mc={};mu={};mi={};me={};n={}",
            self.max_per_hit,
            self.max_total,
            u8::from(self.include_calls),
            u8::from(self.include_imports),
            u8::from(self.include_usages),
            u8::from(self.include_exports),
            cap(self.max_call_edges),
            cap(self.max_usage_edges),
            cap(self.max_import_edges),
            cap(self.max_export_edges),
            self.max_name_candidates,
        )
    }

    fn edge_cap(&self, edge_type: EdgeType) -> Option<(usize, TruncationCap)> {
        match edge_type {
            EdgeType::Call => self.max_call_edges.map(|m| (m, TruncationCap::MaxCallEdges)),
            EdgeType::Usage => self.max_usage_edges.map(|m| (m, TruncationCap::MaxUsageEdges)),
            EdgeType::Import => self.max_import_edges.map(|m| (m, TruncationCap::MaxImportEdges)),
            EdgeType::Export => self.max_export_edges.map(|m| (m, TruncationCap::MaxExportEdges)),
            EdgeType::Dataflow | EdgeType::Symbol => None,
        }
    }
}

/// A chunk pulled in next to a search hit through a relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextHit {
    pub id: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub edge_type: EdgeType,
    pub graph: GraphKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    pub source_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionStats {
    pub added: usize,
    pub seeds_resolved: usize,
    pub seeds_unresolved: usize,
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truncation: Vec<TruncationRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextExpansion {
    pub context_hits: Vec<ContextHit>,
    pub stats: ExpansionStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

struct Candidate {
    chunk: usize,
    graph: GraphKind,
    edge_type: EdgeType,
    confidence: Option<f64>,
    evidence: Option<Evidence>,
}

/// What a resolved seed contributes to candidate collection.
struct SeedView<'a> {
    node: NodeRef,
    own_chunk: Option<usize>,
    name: Option<&'a str>,
    file: Option<&'a str>,
}

/// Expands search hits with related chunks, memoizing results per request shape.
pub struct ContextExpander {
    options: ContextExpansionOptions,
    filter: NormalizedEdgeFilter,
    case_sensitive_files: bool,
    cache_max_size: usize,
    cache: NeighborhoodCache<String, Arc<ContextExpansion>>,
    resolver: RelationResolver,
}

impl ContextExpander {
    pub fn new(options: ContextExpansionOptions, filter: NormalizedEdgeFilter) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            filter,
            case_sensitive_files: false,
            cache_max_size: DEFAULT_NEIGHBORHOOD_CACHE_SIZE,
            cache: NeighborhoodCache::new(),
            resolver: RelationResolver::new(),
        })
    }

    #[must_use]
    pub fn with_cache_size(mut self, max_size: usize) -> Self {
        self.cache_max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_case_sensitive_files(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive_files = case_sensitive;
        self
    }

    pub fn options(&self) -> &ContextExpansionOptions {
        &self.options
    }

    pub fn filter(&self) -> &NormalizedEdgeFilter {
        &self.filter
    }

    /// Swap the edge filter for following requests. Cached results stay valid
    /// because the filter is part of the cache key.
    pub fn set_filter(&mut self, filter: NormalizedEdgeFilter) {
        self.filter = filter;
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn expand(
        &mut self,
        hits: &[SearchHit],
        index: &ContextIndex,
        allowed_ids: Option<&HashSet<String>>,
    ) -> ContextExpansion {
        let key = self.cache_key(hits, index, allowed_ids);
        if let Some(cached) = self.cache.get(&key) {
            log::debug!("Context expansion cache hit ({} seeds)", hits.len());
            let mut expansion = ContextExpansion::clone(cached);
            expansion.stats.cache_hit = true;
            return expansion;
        }
        log::debug!("Context expansion cache miss ({} seeds)", hits.len());

        let expansion = self.compute(hits, index, allowed_ids);
        self.cache
            .set(key, Arc::new(expansion.clone()), self.cache_max_size);
        expansion
    }

    fn cache_key(
        &self,
        hits: &[SearchHit],
        index: &ContextIndex,
        allowed_ids: Option<&HashSet<String>>,
    ) -> String {
        let mut seeds = String::new();
        for hit in hits {
            seeds.push_str(&hit.id);
            seeds.push('\u{1f}');
            seeds.push_str(&hit.file);
            seeds.push('\u{1f}');
            seeds.push_str(hit.chunk_uid().unwrap_or(&hit.id));
            seeds.push('\u{1e}');
        }
        format!(
            "gen={}|seeds={}|filter={}|opts={}|cs={}|allow={}",
            index.generation(),
            sha256_hex(seeds.as_bytes()),
            self.filter.signature(),
            self.options.signature(),
            u8::from(self.case_sensitive_files),
            allow_list_digest(allowed_ids),
        )
    }

    fn compute(
        &mut self,
        hits: &[SearchHit],
        index: &ContextIndex,
        allowed_ids: Option<&HashSet<String>>,
    ) -> ContextExpansion {
        let mut stats = ExpansionStats::default();
        let mut warnings = Vec::new();
        if let Some(warning) = self.filter.diagnostics() {
            warnings.push(warning);
        }
        let mut truncation = TruncationLog::new("contextExpansion");
        let mut ambiguous_files: Vec<String> = Vec::new();

        let mut excluded: HashSet<&str> = HashSet::new();
        for hit in hits {
            excluded.insert(hit.id.as_str());
            if let Some(uid) = hit.chunk_uid() {
                excluded.insert(uid);
            }
        }
        let mut added: HashSet<usize> = HashSet::new();
        let mut context_hits = Vec::new();

        for hit in hits {
            let Some(node) = resolve_seed_node_ref(&seed_for_hit(hit)) else {
                stats.seeds_unresolved += 1;
                continue;
            };
            stats.seeds_resolved += 1;
            let seed = seed_view(node, hit, index);

            let relations = match (seed.file, index.file_relations.as_ref()) {
                (Some(file), Some(store)) => {
                    match self.resolver.lookup(store, file, self.case_sensitive_files) {
                        RelationLookup::Found(record) => Some(record),
                        RelationLookup::Ambiguous => {
                            if !ambiguous_files.iter().any(|f| f == file) {
                                ambiguous_files.push(file.to_string());
                            }
                            None
                        }
                        RelationLookup::Missing => None,
                    }
                }
                _ => None,
            };

            let candidates = self.collect_candidates(&seed, relations, index, &mut truncation);

            let mut eligible: Vec<Candidate> = Vec::new();
            let mut seen: HashSet<usize> = HashSet::new();
            for candidate in candidates {
                let edge =
                    EdgeProbe::new(candidate.graph, candidate.edge_type, candidate.confidence);
                if !self.filter.allows(&edge) {
                    continue;
                }
                let chunk = &index.chunks[candidate.chunk];
                if seed.own_chunk == Some(candidate.chunk)
                    || excluded.contains(chunk.id.as_str())
                    || excluded.contains(chunk.uid())
                    || added.contains(&candidate.chunk)
                    || !seen.insert(candidate.chunk)
                {
                    continue;
                }
                if let Some(allowed) = allowed_ids {
                    if !allowed.contains(&chunk.id) && !allowed.contains(chunk.uid()) {
                        continue;
                    }
                }
                eligible.push(candidate);
            }

            let per_hit = eligible.len().min(self.options.max_per_hit);
            if eligible.len() > self.options.max_per_hit {
                truncation.record(
                    TruncationCap::MaxPerHit,
                    self.options.max_per_hit,
                    Some(eligible.len()),
                    Some(eligible.len() - self.options.max_per_hit),
                    Some(hit.id.clone()),
                );
            }
            let budget = self.options.max_total.saturating_sub(context_hits.len());
            let take = per_hit.min(budget);
            if take < per_hit {
                truncation.record(
                    TruncationCap::MaxTotal,
                    self.options.max_total,
                    None,
                    Some(per_hit - take),
                    Some(hit.id.clone()),
                );
            }

            for candidate in eligible.into_iter().take(take) {
                added.insert(candidate.chunk);
                let chunk = &index.chunks[candidate.chunk];
                context_hits.push(ContextHit {
                    id: chunk.id.clone(),
                    file: chunk.file.clone(),
                    start: chunk.start,
                    name: chunk.name.clone(),
                    edge_type: candidate.edge_type,
                    graph: candidate.graph,
                    confidence: candidate.confidence,
                    evidence: candidate.evidence,
                    source_id: hit.id.clone(),
                });
            }
        }

        if stats.seeds_unresolved > 0 {
            warnings.push(
                Warning::new(
                    WarningCode::UnresolvedSeed,
                    format!("{} hits could not be resolved to a graph node", stats.seeds_unresolved),
                )
                .with_data(serde_json::json!({ "count": stats.seeds_unresolved })),
            );
        }
        if !ambiguous_files.is_empty() {
            warnings.push(
                Warning::new(
                    WarningCode::RelationLookupAmbiguous,
                    "File relations lookup matched several differently-cased paths",
                )
                .with_data(serde_json::json!({ "files": ambiguous_files })),
            );
        }

        stats.added = context_hits.len();
        stats.truncation = truncation.into_records();
        ContextExpansion {
            context_hits,
            stats,
            warnings,
        }
    }

    fn collect_candidates(
        &self,
        seed: &SeedView<'_>,
        relations: Option<&RelationRecord>,
        index: &ContextIndex,
        truncation: &mut TruncationLog,
    ) -> Vec<Candidate> {
        let mut out = Vec::new();

        if let NodeRef::Symbol { symbol_id } = &seed.node {
            let group = self.by_name(index, symbol_id, GraphKind::SymbolEdges, EdgeType::Symbol, truncation);
            out.extend(group);
            return out;
        }

        if self.options.include_calls {
            if let Some(name) = seed.name {
                let mut group = Vec::new();
                let mut callees: Vec<&str> = Vec::new();
                if let Some(code_relations) = seed
                    .own_chunk
                    .and_then(|idx| index.chunks[idx].code_relations.as_ref())
                {
                    for (from, to) in &code_relations.calls {
                        if from == name && !callees.contains(&to.as_str()) {
                            callees.push(to.as_str());
                        }
                    }
                }
                for callee in callees {
                    group.extend(self.by_name(index, callee, GraphKind::CallGraph, EdgeType::Call, truncation));
                }
                let same_named = index.named(name).len();
                let confidence = (same_named > 1).then(|| 1.0 / same_named as f64);
                for &caller in index.callers_of(name) {
                    group.push(Candidate {
                        chunk: caller,
                        graph: GraphKind::CallGraph,
                        edge_type: EdgeType::Call,
                        confidence,
                        evidence: None,
                    });
                }
                if let Some(call_sites) = index.call_sites.as_ref() {
                    for candidate in &mut group {
                        let other = NodeRef::chunk(index.chunks[candidate.chunk].uid());
                        candidate.evidence = format_evidence(EdgeType::Call, &seed.node, &other, call_sites)
                            .or_else(|| format_evidence(EdgeType::Call, &other, &seed.node, call_sites));
                    }
                }
                out.extend(self.cap_group(group, EdgeType::Call, truncation));
            }
        }

        let Some(record) = relations else {
            return out;
        };

        if self.options.include_imports {
            let group: Vec<Candidate> = record
                .import_links
                .iter()
                .flatten()
                .flat_map(|linked| index.in_file(linked))
                .map(|&chunk| Candidate {
                    chunk,
                    graph: GraphKind::ImportGraph,
                    edge_type: EdgeType::Import,
                    confidence: None,
                    evidence: None,
                })
                .collect();
            out.extend(self.cap_group(group, EdgeType::Import, truncation));
        }

        if self.options.include_usages {
            let mut group = Vec::new();
            for name in record.usages.iter().flatten() {
                group.extend(self.by_name(index, name, GraphKind::UsageGraph, EdgeType::Usage, truncation));
            }
            out.extend(self.cap_group(group, EdgeType::Usage, truncation));
        }

        if self.options.include_exports {
            if let (Some(file), Some(exports)) = (seed.file, record.exports.as_ref()) {
                let group: Vec<Candidate> = index
                    .in_file(file)
                    .iter()
                    .filter(|&&chunk| {
                        index.chunks[chunk]
                            .name
                            .as_ref()
                            .is_some_and(|name| exports.contains(name))
                    })
                    .map(|&chunk| Candidate {
                        chunk,
                        graph: GraphKind::ImportGraph,
                        edge_type: EdgeType::Export,
                        confidence: None,
                        evidence: None,
                    })
                    .collect();
                out.extend(self.cap_group(group, EdgeType::Export, truncation));
            }
        }

        out
    }

    /// Chunks carrying `name`, capped at `max_name_candidates`; an ambiguous name
    /// spreads confidence evenly over its matches.
    fn by_name(
        &self,
        index: &ContextIndex,
        name: &str,
        graph: GraphKind,
        edge_type: EdgeType,
        truncation: &mut TruncationLog,
    ) -> Vec<Candidate> {
        let matches = index.named(name);
        let limit = self.options.max_name_candidates;
        if matches.len() > limit {
            truncation.record(
                TruncationCap::MaxNameCandidates,
                limit,
                Some(matches.len()),
                Some(matches.len() - limit),
                Some(name.to_string()),
            );
        }
        let confidence = (matches.len() > 1).then(|| 1.0 / matches.len() as f64);
        matches
            .iter()
            .take(limit)
            .map(|&chunk| Candidate {
                chunk,
                graph,
                edge_type,
                confidence,
                evidence: None,
            })
            .collect()
    }

    fn cap_group(
        &self,
        mut group: Vec<Candidate>,
        edge_type: EdgeType,
        truncation: &mut TruncationLog,
    ) -> Vec<Candidate> {
        if let Some((limit, cap)) = self.options.edge_cap(edge_type) {
            if group.len() > limit {
                truncation.record(cap, limit, Some(group.len()), Some(group.len() - limit), None);
                group.truncate(limit);
            }
        }
        group
    }
}

fn seed_for_hit(hit: &SearchHit) -> Seed {
    let chunk_uid = hit.chunk_uid().unwrap_or(&hit.id);
    Seed::Pending(PendingSeed {
        status: None,
        resolved: None,
        candidates: vec![CandidateRef {
            chunk_uid: (!chunk_uid.is_empty()).then(|| chunk_uid.to_string()),
            symbol_id: None,
            path: (!hit.file.is_empty()).then(|| hit.file.clone()),
        }],
    })
}

fn seed_view<'a>(node: NodeRef, hit: &'a SearchHit, index: &'a ContextIndex) -> SeedView<'a> {
    let hit_file = (!hit.file.is_empty()).then_some(hit.file.as_str());
    let own_chunk = node
        .chunk_uid()
        .and_then(|uid| index.by_id.get(uid).copied());
    let chunk = own_chunk.map(|idx| &index.chunks[idx]);
    let (name, file) = match &node {
        NodeRef::Chunk { .. } => (
            chunk.and_then(|c| c.name.as_deref()),
            chunk
                .map(|c| c.file.as_str())
                .filter(|f| !f.is_empty())
                .or(hit_file),
        ),
        NodeRef::File { .. } => (None, hit_file),
        NodeRef::Symbol { .. } => (None, None),
    };
    SeedView {
        node,
        own_chunk,
        name,
        file,
    }
}

fn allow_list_digest(allowed_ids: Option<&HashSet<String>>) -> String {
    let Some(allowed) = allowed_ids else {
        return "*".to_string();
    };
    let mut ids: Vec<&str> = allowed.iter().map(String::as_str).collect();
    ids.sort_unstable();
    sha256_hex(ids.join("\n").as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
