use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::fusion::{FederatedRepoResult, MergedByMode, MergedHit, RRFFusion};
use crate::modes::{resolve_requested_modes, SearchMode};
use context_graph::{
    validate_graph_relations, ContextExpander, ContextHit, ContextIndex, ExpansionStats,
    GraphRelations,
};
use context_protocol::{SearchHit, Warning};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

/// Loaded lookup data of one federated repository.
#[derive(Debug, Clone)]
pub struct RepoIndex {
    pub context: Arc<ContextIndex>,
    pub graph_relations: Option<Arc<GraphRelations>>,
}

impl RepoIndex {
    pub fn new(context: Arc<ContextIndex>) -> Self {
        Self {
            context,
            graph_relations: None,
        }
    }

    #[must_use]
    pub fn with_graph_relations(mut self, relations: Arc<GraphRelations>) -> Self {
        self.graph_relations = Some(relations);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Mode selector such as `code`, `prose`, `all` or empty for defaults.
    pub mode: String,
    pub per_repo: Vec<FederatedRepoResult>,
    /// Restricts each mode to the listed repos when present.
    pub selected_repos_by_mode: Option<HashMap<SearchMode, Vec<String>>>,
}

impl SearchRequest {
    pub fn new(mode: impl Into<String>, per_repo: Vec<FederatedRepoResult>) -> Self {
        Self {
            mode: mode.into(),
            per_repo,
            selected_repos_by_mode: None,
        }
    }

    #[must_use]
    pub fn with_selection(mut self, selected: HashMap<SearchMode, Vec<String>>) -> Self {
        self.selected_repos_by_mode = Some(selected);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoContextHit {
    pub repo_id: String,
    #[serde(flatten)]
    pub hit: ContextHit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoExpansionStats {
    pub repo_id: String,
    #[serde(flatten)]
    pub stats: ExpansionStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeResponse {
    pub hits: Vec<MergedHit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_hits: Vec<RepoContextHit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expansion: Vec<RepoExpansionStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Keyed by the mode's payload key (`extractedProse` for extracted prose).
    pub modes: BTreeMap<String, ModeResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl SearchResponse {
    pub fn mode(&self, mode: SearchMode) -> Option<&ModeResponse> {
        self.modes.get(mode.payload_key())
    }
}

/// Runs federated searches: fuse per-repo results, then expand with related context.
pub struct SearchSession {
    config: SearchConfig,
    fusion: RRFFusion,
    expander: ContextExpander,
    repos: HashMap<String, RepoIndex>,
    /// Relations last validated per repo, compared by allocation.
    validated: HashMap<String, Weak<GraphRelations>>,
}

impl SearchSession {
    pub fn new(config: SearchConfig) -> Result<Self> {
        if let Some(version) = config.schema_version.filter(|v| *v != 1) {
            return Err(SearchError::InvalidConfig(format!(
                "schema_version {version} is not supported"
            )));
        }
        let fusion = RRFFusion::new(
            config.fusion.rrf_k,
            config.fusion.top_n,
            config.fusion.per_repo_top,
        )?;
        let expander = ContextExpander::new(
            config.context_expansion.clone(),
            config.normalized_edge_filter(),
        )?
        .with_cache_size(config.neighborhood_cache.max_size)
        .with_case_sensitive_files(config.relations.case_sensitive_files);

        Ok(Self {
            config,
            fusion,
            expander,
            repos: HashMap::new(),
            validated: HashMap::new(),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn fusion(&self) -> &RRFFusion {
        &self.fusion
    }

    pub fn expander(&self) -> &ContextExpander {
        &self.expander
    }

    /// Register (or replace) the index of a repository.
    pub fn register_repo(&mut self, repo_id: impl Into<String>, index: RepoIndex) {
        let repo_id = repo_id.into();
        log::debug!(
            "Registered repo {repo_id} ({} chunks, generation {})",
            index.context.len(),
            index.context.generation()
        );
        self.repos.insert(repo_id, index);
    }

    pub fn search(&mut self, request: &SearchRequest) -> SearchResponse {
        let merged = match &request.selected_repos_by_mode {
            Some(selected) => self.fusion.merge_scoped(&request.per_repo, selected),
            None => self.fusion.merge(&request.per_repo),
        };
        self.finish(&request.mode, &merged)
    }

    /// Like [`SearchSession::search`], with unscoped per-mode merges run as
    /// blocking tasks on the tokio runtime.
    pub async fn search_concurrent(&mut self, request: SearchRequest) -> Result<SearchResponse> {
        let merged = match &request.selected_repos_by_mode {
            Some(selected) => self.fusion.merge_scoped(&request.per_repo, selected),
            None => {
                self.fusion
                    .merge_concurrent(Arc::new(request.per_repo))
                    .await?
            }
        };
        Ok(self.finish(&request.mode, &merged))
    }

    fn finish(&mut self, selector: &str, merged: &MergedByMode) -> SearchResponse {
        let mut response = SearchResponse::default();
        for mode in resolve_requested_modes(selector) {
            let hits = merged.get(mode).to_vec();
            let mut mode_response = ModeResponse::default();

            for (repo_id, repo_hits) in group_by_repo(&hits) {
                let Some(repo) = self.repos.get(repo_id) else {
                    continue;
                };
                let repo = repo.clone();
                self.validate_once(repo_id, &repo, &mut response.warnings);

                if !self.config.context_expansion.enabled {
                    continue;
                }
                let expansion = self.expander.expand(&repo_hits, &repo.context, None);
                mode_response
                    .context_hits
                    .extend(expansion.context_hits.into_iter().map(|hit| RepoContextHit {
                        repo_id: repo_id.to_string(),
                        hit,
                    }));
                mode_response.expansion.push(RepoExpansionStats {
                    repo_id: repo_id.to_string(),
                    stats: expansion.stats,
                });
                for warning in expansion.warnings {
                    if !response.warnings.contains(&warning) {
                        response.warnings.push(warning);
                    }
                }
            }

            log::debug!(
                "Search {mode}: {} hits, {} context hits",
                hits.len(),
                mode_response.context_hits.len()
            );
            mode_response.hits = hits;
            response
                .modes
                .insert(mode.payload_key().to_string(), mode_response);
        }
        response
    }

    fn validate_once(&mut self, repo_id: &str, repo: &RepoIndex, warnings: &mut Vec<Warning>) {
        let Some(relations) = &repo.graph_relations else {
            return;
        };
        let current = Arc::downgrade(relations);
        if self
            .validated
            .get(repo_id)
            .is_some_and(|seen| seen.ptr_eq(&current))
        {
            return;
        }
        self.validated.insert(repo_id.to_string(), current);
        validate_graph_relations(relations, warnings);
    }
}

/// Merged hits grouped per repo, repos in first-appearance order.
fn group_by_repo(hits: &[MergedHit]) -> Vec<(&str, Vec<SearchHit>)> {
    let mut groups: Vec<(&str, Vec<SearchHit>)> = Vec::new();
    for merged in hits {
        match groups.iter_mut().find(|(id, _)| *id == merged.repo_id) {
            Some((_, list)) => list.push(merged.hit.clone()),
            None => groups.push((merged.repo_id.as_str(), vec![merged.hit.clone()])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_graph::ChunkMeta;
    use context_protocol::WarningCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn mismatched_relations() -> Arc<GraphRelations> {
        let relations: GraphRelations = serde_json::from_value(json!({
            "callGraph": {"nodeCount": 5, "nodes": [{"id": "c1", "out": [], "in": []}]}
        }))
        .unwrap();
        Arc::new(relations)
    }

    fn context() -> Arc<ContextIndex> {
        Arc::new(ContextIndex::new(vec![ChunkMeta::new("c1", "a.rs")]))
    }

    fn repo_index() -> RepoIndex {
        RepoIndex::new(context()).with_graph_relations(mismatched_relations())
    }

    fn code_request() -> SearchRequest {
        SearchRequest::new(
            "code",
            vec![FederatedRepoResult::new("r")
                .with_hits(SearchMode::Code, vec![SearchHit::new("c1", "a.rs")])],
        )
    }

    #[test]
    fn test_relations_revalidated_when_swapped_under_same_context() {
        let mut session = SearchSession::new(SearchConfig::default()).unwrap();
        let shared = context();
        let relations = mismatched_relations();
        session.register_repo(
            "r",
            RepoIndex::new(Arc::clone(&shared)).with_graph_relations(Arc::clone(&relations)),
        );
        assert_eq!(session.search(&code_request()).warnings.len(), 1);

        session.register_repo(
            "r",
            RepoIndex::new(Arc::clone(&shared)).with_graph_relations(mismatched_relations()),
        );
        assert_eq!(session.search(&code_request()).warnings.len(), 1);

        session.register_repo(
            "r",
            RepoIndex::new(context()).with_graph_relations(Arc::clone(&relations)),
        );
        assert_eq!(session.search(&code_request()).warnings.len(), 1);
        assert!(session.search(&code_request()).warnings.is_empty());
    }

    #[test]
    fn test_same_relations_validated_once() {
        let mut session = SearchSession::new(SearchConfig::default()).unwrap();
        let relations = mismatched_relations();
        session.register_repo(
            "r",
            RepoIndex::new(context()).with_graph_relations(Arc::clone(&relations)),
        );
        assert_eq!(session.search(&code_request()).warnings.len(), 1);

        session.register_repo(
            "r",
            RepoIndex::new(context()).with_graph_relations(Arc::clone(&relations)),
        );
        assert!(session.search(&code_request()).warnings.is_empty());
    }

    #[test]
    fn test_graph_validated_once_until_replaced() {
        let mut session = SearchSession::new(SearchConfig::default()).unwrap();
        session.register_repo("r", repo_index());
        let request = code_request();

        let first = session.search(&request);
        assert_eq!(first.warnings.len(), 1);
        assert_eq!(first.warnings[0].code, WarningCode::GraphCountMismatch);
        assert!(session.search(&request).warnings.is_empty());

        session.register_repo("r", repo_index());
        assert_eq!(session.search(&request).warnings.len(), 1);
    }

    #[test]
    fn test_only_requested_modes_are_returned() {
        let mut session = SearchSession::new(SearchConfig::default()).unwrap();
        let response = session.search(&SearchRequest::new("prose", Vec::new()));
        let keys: Vec<&str> = response.modes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["extractedProse", "prose"]);
        assert!(response.mode(SearchMode::Code).is_none());
    }

    #[test]
    fn test_group_by_repo_keeps_rank_order() {
        let fusion = RRFFusion::default();
        let merged = fusion.merge_mode(
            &[
                FederatedRepoResult::new("a").with_hits(
                    SearchMode::Code,
                    vec![SearchHit::new("a1", "x.rs"), SearchHit::new("a2", "y.rs")],
                ),
                FederatedRepoResult::new("b")
                    .with_hits(SearchMode::Code, vec![SearchHit::new("b1", "z.rs")]),
            ],
            SearchMode::Code,
        );
        let groups = group_by_repo(&merged);
        let shape: Vec<(&str, Vec<&str>)> = groups
            .iter()
            .map(|(repo, hits)| (*repo, hits.iter().map(|h| h.id.as_str()).collect()))
            .collect();
        assert_eq!(shape, vec![("a", vec!["a1", "a2"]), ("b", vec!["b1"])]);
    }
}
