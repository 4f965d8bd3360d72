//! Error types for tree resolution.

use arbor_loader::{DependencyError, LoadError};
use arbor_schema::{FieldError, SchemaError};
use thiserror::Error;

/// Errors that abort a resolve call. No partial tree is returned with any of
/// them.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A node type declaration is invalid.
  #[error("schema error: {0}")]
  Schema(#[from] SchemaError),

  /// A resolve field depends on a loader that is not registered.
  #[error("field '{field}' of '{node_type}' depends on unregistered loader '{loader}'")]
  LoaderField {
    node_type: String,
    field: String,
    loader: String,
  },

  /// A loader could not be constructed in this scope.
  #[error("loader for field '{field}' of '{node_type}' could not be built: {source}")]
  Dependency {
    node_type: String,
    field: String,
    #[source]
    source: DependencyError,
  },

  /// A batch fetch failed.
  #[error("fetch failed for field '{field}' of '{node_type}': {source}")]
  Fetch {
    node_type: String,
    field: String,
    #[source]
    source: LoadError,
  },

  /// The mapper rejected a raw result.
  #[error("mapping failed for field '{field}' of '{node_type}': {message}")]
  Mapping {
    node_type: String,
    field: String,
    message: String,
  },

  /// A resolve function failed on its own.
  #[error("resolve failed for field '{field}' of '{node_type}': {message}")]
  Field {
    node_type: String,
    field: String,
    message: String,
  },

  /// A post field failed.
  #[error("post field '{field}' of '{node_type}' failed: {source}")]
  Post {
    node_type: String,
    field: String,
    #[source]
    source: FieldError,
  },

  /// The call was cancelled before it completed.
  #[error("resolve cancelled")]
  Cancelled,
}

impl ResolveError {
  /// Attach node context to a resolve-field failure.
  pub(crate) fn from_field(node_type: &str, field: &str, error: FieldError) -> Self {
    let node_type = node_type.to_string();
    let field = field.to_string();
    match error {
      FieldError::Load(source) => Self::Fetch {
        node_type,
        field,
        source,
      },
      FieldError::Dependency(source) => Self::Dependency {
        node_type,
        field,
        source,
      },
      FieldError::Mapping(message) => Self::Mapping {
        node_type,
        field,
        message,
      },
      FieldError::Failed(message) => Self::Field {
        node_type,
        field,
        message,
      },
    }
  }

  /// Node type the error was raised for, when known.
  pub fn node_type(&self) -> Option<&str> {
    match self {
      Self::Schema(
        SchemaError::UnknownTarget { node_type, .. }
        | SchemaError::DuplicateTarget { node_type, .. }
        | SchemaError::DuplicateField { node_type, .. }
        | SchemaError::UnknownField { node_type, .. },
      )
      | Self::LoaderField { node_type, .. }
      | Self::Dependency { node_type, .. }
      | Self::Fetch { node_type, .. }
      | Self::Mapping { node_type, .. }
      | Self::Field { node_type, .. }
      | Self::Post { node_type, .. } => Some(node_type),
      Self::Cancelled => None,
    }
  }

  /// Field the error was raised for, when known.
  pub fn field(&self) -> Option<&str> {
    match self {
      Self::Schema(
        SchemaError::UnknownTarget { field, .. }
        | SchemaError::DuplicateTarget { field, .. }
        | SchemaError::DuplicateField { field, .. }
        | SchemaError::UnknownField { field, .. },
      )
      | Self::LoaderField { field, .. }
      | Self::Dependency { field, .. }
      | Self::Fetch { field, .. }
      | Self::Mapping { field, .. }
      | Self::Field { field, .. }
      | Self::Post { field, .. } => Some(field),
      Self::Cancelled => None,
    }
  }
}
