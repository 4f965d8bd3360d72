use arbor_loader::{DependencyError, LoadError};
use thiserror::Error;

use crate::classify::FieldKind;

/// Structural problems with a node type declaration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
  #[error("{kind} target '{field}' is not a field of '{node_type}'")]
  UnknownTarget {
    node_type: String,
    field: String,
    kind: FieldKind,
  },

  #[error("field '{field}' of '{node_type}' is targeted by more than one resolve/post declaration")]
  DuplicateTarget { node_type: String, field: String },

  #[error("field '{field}' is declared more than once on '{node_type}'")]
  DuplicateField { node_type: String, field: String },

  #[error("field '{field}' is not declared on '{node_type}'")]
  UnknownField { node_type: String, field: String },
}

/// Failure of a single resolve, mapper or post function.
#[derive(Debug, Error)]
pub enum FieldError {
  #[error(transparent)]
  Load(#[from] LoadError),

  #[error(transparent)]
  Dependency(#[from] DependencyError),

  #[error("{0}")]
  Mapping(String),

  #[error("{0}")]
  Failed(String),
}

impl FieldError {
  pub fn failed(message: impl ToString) -> Self {
    Self::Failed(message.to_string())
  }
}
