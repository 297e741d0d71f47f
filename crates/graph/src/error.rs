use crate::types::GraphNodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Ambiguous symbol {name}: {} candidates", candidates.len())]
    AmbiguousSymbol {
        name: String,
        candidates: Vec<GraphNodeId>,
    },
}
