use crate::error::{Result, SearchError};
use crate::modes::SearchMode;
use context_protocol::{deserialize_hit_list, SearchHit};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const DEFAULT_RRF_K: f64 = 60.0;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_PER_REPO_TOP: usize = 20;
pub const MAX_TOP_N: usize = 500;
pub const MAX_PER_REPO_TOP: usize = 1000;

/// Fields the merge writes onto every hit; stale copies in channel payloads are dropped.
const ANNOTATION_KEYS: [&str; 4] = ["repoId", "repoAlias", "globalId", "repoPriority"];

/// Ranked lists of one repository, best hit first, per mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeResults {
    #[serde(default, deserialize_with = "deserialize_hit_list")]
    pub code: Vec<SearchHit>,
    #[serde(default, deserialize_with = "deserialize_hit_list")]
    pub prose: Vec<SearchHit>,
    #[serde(default, alias = "extracted-prose", deserialize_with = "deserialize_hit_list")]
    pub extracted_prose: Vec<SearchHit>,
    #[serde(default, deserialize_with = "deserialize_hit_list")]
    pub records: Vec<SearchHit>,
}

impl ModeResults {
    pub fn get(&self, mode: SearchMode) -> &[SearchHit] {
        match mode {
            SearchMode::Code => &self.code,
            SearchMode::Prose => &self.prose,
            SearchMode::ExtractedProse => &self.extracted_prose,
            SearchMode::Records => &self.records,
        }
    }

    pub fn get_mut(&mut self, mode: SearchMode) -> &mut Vec<SearchHit> {
        match mode {
            SearchMode::Code => &mut self.code,
            SearchMode::Prose => &mut self.prose,
            SearchMode::ExtractedProse => &mut self.extracted_prose,
            SearchMode::Records => &mut self.records,
        }
    }
}

/// Search output of one federated repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedRepoResult {
    pub repo_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_alias: Option<String>,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: f64,
    #[serde(default)]
    pub result: ModeResults,
}

impl FederatedRepoResult {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.repo_alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_hits(mut self, mode: SearchMode, hits: Vec<SearchHit>) -> Self {
        *self.result.get_mut(mode) = hits;
        self
    }
}

fn lenient_priority<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(serde_json::Value::deserialize(deserializer)?
        .as_f64()
        .filter(|p| p.is_finite())
        .unwrap_or(0.0))
}

/// A hit placed into the federated ranking. `hit.score` carries the rounded RRF score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedHit {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub repo_id: String,
    pub repo_alias: Option<String>,
    pub global_id: String,
    pub repo_priority: f64,
}

/// Merged lists for all four modes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedByMode {
    pub code: Vec<MergedHit>,
    pub prose: Vec<MergedHit>,
    pub extracted_prose: Vec<MergedHit>,
    pub records: Vec<MergedHit>,
}

impl MergedByMode {
    pub fn get(&self, mode: SearchMode) -> &[MergedHit] {
        match mode {
            SearchMode::Code => &self.code,
            SearchMode::Prose => &self.prose,
            SearchMode::ExtractedProse => &self.extracted_prose,
            SearchMode::Records => &self.records,
        }
    }

    fn set(&mut self, mode: SearchMode, hits: Vec<MergedHit>) {
        match mode {
            SearchMode::Code => self.code = hits,
            SearchMode::Prose => self.prose = hits,
            SearchMode::ExtractedProse => self.extracted_prose = hits,
            SearchMode::Records => self.records = hits,
        }
    }
}

struct Ranked<'a> {
    hit: &'a SearchHit,
    repo: &'a FederatedRepoResult,
    rrf: f64,
    insert_index: usize,
}

fn compare_ranked(a: &Ranked<'_>, b: &Ranked<'_>) -> Ordering {
    b.rrf
        .total_cmp(&a.rrf)
        .then_with(|| b.repo.priority.total_cmp(&a.repo.priority))
        .then_with(|| a.repo.repo_id.cmp(&b.repo.repo_id))
        .then_with(|| a.hit.id.cmp(&b.hit.id))
        .then_with(|| a.hit.file.cmp(&b.hit.file))
        .then_with(|| a.hit.start.cmp(&b.hit.start))
        .then_with(|| a.insert_index.cmp(&b.insert_index))
}

fn round_score(value: f64) -> f64 {
    (value * 1e12).round() / 1e12
}

/// Reciprocal Rank Fusion across federated repositories
///
/// RRF formula: score(d) = 1 / (k + rank(d) + 1), rank zero-based within its repo list.
/// Only rank positions are compared, so channels with incomparable raw scores fuse
/// cleanly. Ties are broken by repo priority, then identity fields, then input order,
/// which makes the output a total order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RRFFusion {
    /// RRF constant k (typically 60)
    k: f64,
    top_n: usize,
    per_repo_top: usize,
}

impl RRFFusion {
    /// `top_n` and `per_repo_top` are clamped into range; `k` must be finite and `>= 1`.
    pub fn new(k: f64, top_n: usize, per_repo_top: usize) -> Result<Self> {
        if !k.is_finite() || k < 1.0 {
            return Err(SearchError::InvalidConfig(format!(
                "rrf_k must be a finite number >= 1, got {k}"
            )));
        }
        Ok(Self {
            k,
            top_n: top_n.clamp(1, MAX_TOP_N),
            per_repo_top: per_repo_top.clamp(1, MAX_PER_REPO_TOP),
        })
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn per_repo_top(&self) -> usize {
        self.per_repo_top
    }

    /// Fuse one mode across all given repos.
    pub fn merge_mode(&self, per_repo: &[FederatedRepoResult], mode: SearchMode) -> Vec<MergedHit> {
        let mut ranked = Vec::new();
        for repo in per_repo {
            for (rank, hit) in repo.result.get(mode).iter().take(self.per_repo_top).enumerate() {
                ranked.push(Ranked {
                    hit,
                    repo,
                    rrf: 1.0 / (self.k + rank as f64 + 1.0),
                    insert_index: ranked.len(),
                });
            }
        }
        let candidates = ranked.len();
        ranked.sort_by(compare_ranked);
        ranked.truncate(self.top_n);

        log::debug!(
            "RRF {mode}: {} repos, {candidates} candidates, {} kept",
            per_repo.len(),
            ranked.len()
        );

        ranked.into_iter().map(Self::finish_hit).collect()
    }

    fn finish_hit(ranked: Ranked<'_>) -> MergedHit {
        let mut hit = ranked.hit.clone();
        for key in ANNOTATION_KEYS {
            hit.extra.remove(key);
        }
        hit.score = round_score(ranked.rrf);
        MergedHit {
            global_id: format!("{}:{}", ranked.repo.repo_id, hit.id),
            hit,
            repo_id: ranked.repo.repo_id.clone(),
            repo_alias: ranked.repo.repo_alias.clone(),
            repo_priority: ranked.repo.priority,
        }
    }

    /// Fuse every mode over all repos.
    pub fn merge(&self, per_repo: &[FederatedRepoResult]) -> MergedByMode {
        let mut merged = MergedByMode::default();
        for mode in SearchMode::ALL {
            merged.set(mode, self.merge_mode(per_repo, mode));
        }
        merged
    }

    /// Fuse each mode over only the repos selected for it. A mode without any
    /// selected repo comes back empty.
    pub fn merge_scoped(
        &self,
        per_repo: &[FederatedRepoResult],
        selected_repos_by_mode: &HashMap<SearchMode, Vec<String>>,
    ) -> MergedByMode {
        let mut merged = MergedByMode::default();
        for mode in SearchMode::ALL {
            let selected: HashSet<&str> = selected_repos_by_mode
                .get(&mode)
                .map(|ids| ids.iter().map(String::as_str).collect())
                .unwrap_or_default();
            if selected.is_empty() {
                continue;
            }
            let scoped: Vec<FederatedRepoResult> = per_repo
                .iter()
                .filter(|repo| selected.contains(repo.repo_id.as_str()))
                .cloned()
                .collect();
            merged.set(mode, self.merge_mode(&scoped, mode));
        }
        merged
    }

    /// Same output as [`RRFFusion::merge`], with the four modes fused on blocking
    /// tasks of the current tokio runtime.
    pub async fn merge_concurrent(&self, per_repo: Arc<Vec<FederatedRepoResult>>) -> Result<MergedByMode> {
        let fusion = *self;
        let handles: Vec<_> = SearchMode::ALL
            .into_iter()
            .map(|mode| {
                let per_repo = Arc::clone(&per_repo);
                (
                    mode,
                    tokio::task::spawn_blocking(move || fusion.merge_mode(&per_repo, mode)),
                )
            })
            .collect();

        let mut merged = MergedByMode::default();
        for (mode, handle) in handles {
            merged.set(mode, handle.await?);
        }
        Ok(merged)
    }
}

impl Default for RRFFusion {
    fn default() -> Self {
        Self {
            k: DEFAULT_RRF_K,
            top_n: DEFAULT_TOP_N,
            per_repo_top: DEFAULT_PER_REPO_TOP,
        }
    }
}
