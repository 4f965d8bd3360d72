//! Resolver configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Serializable resolver settings.
///
/// ```json
/// {
///   "loader_params": {
///     "feedback": { "private": true }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
  /// Construction parameters keyed by registered loader name.
  #[serde(default)]
  pub loader_params: HashMap<String, serde_json::Value>,
}

impl ResolverConfig {
  pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(raw)
  }

  /// Set the parameters of one loader, replacing any previous value.
  pub fn with_loader_params(mut self, loader: impl Into<String>, params: serde_json::Value) -> Self {
    self.loader_params.insert(loader.into(), params);
    self
  }
}
