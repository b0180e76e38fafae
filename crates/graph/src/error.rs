use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unknown graph: {0}")]
    UnknownGraph(String),

    #[error("Unknown edge type: {0}")]
    UnknownEdgeType(String),

    #[error("Unknown traversal direction: {0}")]
    UnknownDirection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
