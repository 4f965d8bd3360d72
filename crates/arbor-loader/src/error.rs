//! Error types for batch loading and loader construction.

use thiserror::Error;

/// Errors delivered to the callers of [`BatchLoader::load`](crate::BatchLoader::load).
///
/// A single batch failure is fanned out to every waiter of that batch, so the
/// error is cheap to clone.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
  /// The batch-fetch function itself failed.
  #[error("batch fetch failed in loader '{loader}': {message}")]
  Fetch { loader: String, message: String },

  /// The batch-fetch function returned a different number of values than keys.
  #[error("loader '{loader}' returned {actual} values for {expected} keys")]
  LengthMismatch {
    loader: String,
    expected: usize,
    actual: usize,
  },

  /// The dispatching load was dropped before results were delivered.
  #[error("batch in loader '{loader}' was abandoned before completion")]
  Abandoned { loader: String },
}

impl LoadError {
  /// Build a fetch failure from any displayable error.
  pub fn fetch(loader: impl Into<String>, message: impl ToString) -> Self {
    Self::Fetch {
      loader: loader.into(),
      message: message.to_string(),
    }
  }
}

/// Errors raised while constructing a loader inside a scope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DependencyError {
  /// No factory is registered for the requested loader.
  #[error("no factory registered for loader '{loader}'")]
  MissingFactory { loader: String },

  /// A construction parameter was not supplied.
  #[error("loader '{loader}' requires parameter '{param}' which was not provided")]
  MissingParam { loader: String, param: String },

  /// A construction parameter could not be deserialized.
  #[error("loader '{loader}' parameter '{param}' is invalid: {message}")]
  InvalidParam {
    loader: String,
    param: String,
    message: String,
  },

  /// Loader factories depend on each other in a cycle.
  #[error("cyclic loader dependency: {}", path.join(" -> "))]
  Cycle { path: Vec<String> },

  /// The factory ran but refused to build the loader.
  #[error("failed to construct loader '{loader}': {message}")]
  Construction { loader: String, message: String },

  /// A cached instance did not have the type its dependency declared.
  #[error("loader '{loader}' instance has an unexpected type")]
  TypeMismatch { loader: String },
}
