//! Loader factories and construction context.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::batch::{BatchLoad, BatchLoader};
use crate::error::DependencyError;
use crate::scope::{LoaderHandle, Scope};

/// A batch-fetch function that knows how to build itself inside a scope.
///
/// Implementations read construction parameters and other loaders from the
/// [`LoaderContext`]:
///
/// ```ignore
/// impl Loader for FeedbackLoader {
///   const NAME: &'static str = "feedback";
///
///   fn create(ctx: &mut LoaderContext<'_>) -> Result<Self, DependencyError> {
///     Ok(Self {
///       private: ctx.param("private")?,
///     })
///   }
/// }
/// ```
pub trait Loader: BatchLoad + Sized {
  /// Name used for parameter lookup and diagnostics.
  const NAME: &'static str;

  fn create(ctx: &mut LoaderContext<'_>) -> Result<Self, DependencyError>;
}

/// Reference from a resolve field to the loader it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoaderDependency {
  id: TypeId,
  name: &'static str,
}

impl LoaderDependency {
  pub fn of<L: Loader>() -> Self {
    Self {
      id: TypeId::of::<L>(),
      name: L::NAME,
    }
  }

  pub fn id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }
}

type Construct =
  Arc<dyn Fn(&mut LoaderContext<'_>) -> Result<LoaderHandle, DependencyError> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Factory {
  pub(crate) name: &'static str,
  pub(crate) construct: Construct,
}

/// The set of loaders a resolver may construct, plus their parameters.
///
/// Shared read-only by every scope.
#[derive(Clone, Default)]
pub struct LoaderFactories {
  factories: HashMap<TypeId, Factory>,
  params: HashMap<String, serde_json::Value>,
}

impl LoaderFactories {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a loader type.
  pub fn register<L: Loader>(&mut self) -> &mut Self {
    self.factories.insert(
      TypeId::of::<L>(),
      Factory {
        name: L::NAME,
        construct: Arc::new(construct::<L>),
      },
    );
    self
  }

  /// Set construction parameters for the loader registered under `loader`.
  ///
  /// `params` is expected to be a JSON object; each key is one parameter.
  pub fn set_params(&mut self, loader: impl Into<String>, params: serde_json::Value) -> &mut Self {
    self.params.insert(loader.into(), params);
    self
  }

  pub fn contains(&self, dependency: &LoaderDependency) -> bool {
    self.factories.contains_key(&dependency.id())
  }

  pub fn len(&self) -> usize {
    self.factories.len()
  }

  pub fn is_empty(&self) -> bool {
    self.factories.is_empty()
  }

  pub(crate) fn get(&self, id: TypeId) -> Option<&Factory> {
    self.factories.get(&id)
  }

  pub(crate) fn params(&self, loader: &str) -> Option<&serde_json::Value> {
    self.params.get(loader)
  }
}

impl fmt::Debug for LoaderFactories {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names: Vec<_> = self.factories.values().map(|f| f.name).collect();
    names.sort_unstable();
    f.debug_struct("LoaderFactories")
      .field("loaders", &names)
      .field("params", &self.params)
      .finish()
  }
}

fn construct<L: Loader>(ctx: &mut LoaderContext<'_>) -> Result<LoaderHandle, DependencyError> {
  let batch = L::create(ctx)?;
  Ok(Arc::new(BatchLoader::named(L::NAME, batch)))
}

/// Handed to [`Loader::create`] while a loader is being built.
pub struct LoaderContext<'a> {
  pub(crate) scope: &'a Scope,
  pub(crate) name: &'static str,
  pub(crate) stack: &'a mut Vec<(TypeId, &'static str)>,
}

impl LoaderContext<'_> {
  /// Name of the loader under construction.
  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Identifier of the owning scope.
  pub fn scope_id(&self) -> &str {
    self.scope.id()
  }

  /// Read a required construction parameter.
  pub fn param<T: DeserializeOwned>(&self, param: &str) -> Result<T, DependencyError> {
    self
      .optional_param(param)?
      .ok_or_else(|| DependencyError::MissingParam {
        loader: self.name.to_string(),
        param: param.to_string(),
      })
  }

  /// Read a construction parameter that may be absent.
  pub fn optional_param<T: DeserializeOwned>(
    &self,
    param: &str,
  ) -> Result<Option<T>, DependencyError> {
    let Some(value) = self
      .scope
      .factories()
      .params(self.name)
      .and_then(|params| params.get(param))
    else {
      return Ok(None);
    };

    serde_json::from_value(value.clone())
      .map(Some)
      .map_err(|e| DependencyError::InvalidParam {
        loader: self.name.to_string(),
        param: param.to_string(),
        message: e.to_string(),
      })
  }

  /// Get (or build) another loader in the same scope.
  pub fn loader<M: Loader>(&mut self) -> Result<Arc<BatchLoader<M>>, DependencyError> {
    let handle = self
      .scope
      .get_or_create_in(TypeId::of::<M>(), M::NAME, self.stack)?;
    BatchLoader::<M>::from_handle(handle)
  }
}
