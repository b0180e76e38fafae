//! # Context Search
//!
//! Federated result fusion over per-repository search output.
//!
//! ## Features
//!
//! - **Mode selection** - `code`, `prose`, `extracted-prose`, `records` and the `default`/`all` groups
//! - **RRF fusion** - rank-only merge across repositories with a total tie order
//! - **Scoped merge** - each mode fused over its own repo selection
//! - **Concurrent merge** - per-mode merges on tokio blocking tasks, same output as sequential
//! - **Search session** - fusion plus graph validation and context expansion per repo
//!
//! ## Usage
//!
//! ```no_run
//! use context_search::{FederatedRepoResult, SearchConfig, SearchMode, SearchRequest, SearchSession};
//! use context_protocol::SearchHit;
//!
//! # fn main() -> context_search::Result<()> {
//! let mut session = SearchSession::new(SearchConfig::default())?;
//! let request = SearchRequest::new(
//!     "code",
//!     vec![
//!         FederatedRepoResult::new("A")
//!             .with_priority(1.0)
//!             .with_hits(SearchMode::Code, vec![SearchHit::new("a1", "src/a.rs")]),
//!         FederatedRepoResult::new("B")
//!             .with_hits(SearchMode::Code, vec![SearchHit::new("b1", "src/b.rs")]),
//!     ],
//! );
//! let response = session.search(&request);
//! for hit in &response.modes["code"].hits {
//!     println!("{} {:.6}", hit.global_id, hit.hit.score);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod fusion;
mod modes;
mod session;

pub use config::{
    neighborhood_cache_size_from_env, FusionConfig, NeighborhoodCacheConfig, RelationsConfig,
    SearchConfig, NEIGHBORHOOD_CACHE_SIZE_ENV,
};
pub use error::{Result, SearchError};
pub use fusion::{
    FederatedRepoResult, MergedByMode, MergedHit, ModeResults, RRFFusion, DEFAULT_PER_REPO_TOP,
    DEFAULT_RRF_K, DEFAULT_TOP_N, MAX_PER_REPO_TOP, MAX_TOP_N,
};
pub use modes::{resolve_requested_modes, SearchMode};
pub use session::{
    ModeResponse, RepoContextHit, RepoExpansionStats, RepoIndex, SearchRequest, SearchResponse,
    SearchSession,
};
