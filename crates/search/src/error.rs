use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Graph error: {0}")]
    Graph(#[from] context_graph::GraphError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Merge task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
