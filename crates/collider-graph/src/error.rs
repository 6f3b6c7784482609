use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("subtask not found in graph: {0}")]
  NodeNotFound(String),
}
