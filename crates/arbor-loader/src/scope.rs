//! Scoped loader registry.
//!
//! A [`Scope`] lives for exactly one top-level resolve call. The first request
//! for a loader constructs it; every later request in the same scope gets the
//! same instance. Nothing is shared between scopes.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::batch::BatchLoader;
use crate::error::DependencyError;
use crate::factory::{Loader, LoaderContext, LoaderDependency, LoaderFactories};

/// Type-erased loader instance as stored in a scope.
pub type LoaderHandle = Arc<dyn Any + Send + Sync>;

pub struct Scope {
  id: String,
  factories: Arc<LoaderFactories>,
  loaders: Mutex<HashMap<TypeId, LoaderHandle>>,
}

impl Scope {
  pub fn new(id: impl Into<String>, factories: Arc<LoaderFactories>) -> Self {
    Self {
      id: id.into(),
      factories,
      loaders: Mutex::new(HashMap::new()),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn factories(&self) -> &LoaderFactories {
    &self.factories
  }

  /// Get the loader a dependency refers to, constructing it on first use.
  pub fn get_or_create(
    &self,
    dependency: &LoaderDependency,
  ) -> Result<LoaderHandle, DependencyError> {
    let mut stack = Vec::new();
    self.get_or_create_in(dependency.id(), dependency.name(), &mut stack)
  }

  /// Typed variant of [`get_or_create`](Self::get_or_create).
  pub fn loader<L: Loader>(&self) -> Result<Arc<BatchLoader<L>>, DependencyError> {
    let handle = self.get_or_create(&LoaderDependency::of::<L>())?;
    BatchLoader::<L>::from_handle(handle)
  }

  /// Number of loaders constructed so far.
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  pub(crate) fn get_or_create_in(
    &self,
    id: TypeId,
    name: &'static str,
    stack: &mut Vec<(TypeId, &'static str)>,
  ) -> Result<LoaderHandle, DependencyError> {
    if let Some(handle) = self.lock().get(&id) {
      return Ok(handle.clone());
    }

    if let Some(start) = stack.iter().position(|(seen, _)| *seen == id) {
      let mut path: Vec<String> = stack[start..]
        .iter()
        .map(|(_, name)| name.to_string())
        .collect();
      path.push(name.to_string());
      return Err(DependencyError::Cycle { path });
    }

    let factory = self
      .factories
      .get(id)
      .cloned()
      .ok_or_else(|| DependencyError::MissingFactory {
        loader: name.to_string(),
      })?;

    // The registry lock is not held here: construction may recurse into
    // other loaders of this scope.
    stack.push((id, factory.name));
    let built = {
      let mut ctx = LoaderContext {
        scope: self,
        name: factory.name,
        stack: &mut *stack,
      };
      (factory.construct)(&mut ctx)
    };
    stack.pop();
    let handle = built?;

    debug!(scope_id = %self.id, loader = factory.name, "loader_constructed");

    Ok(self.lock().entry(id).or_insert(handle).clone())
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<TypeId, LoaderHandle>> {
    self.loaders.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl fmt::Debug for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scope")
      .field("id", &self.id)
      .field("loaders", &self.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::batch::BatchLoad;
  use crate::error::LoadError;
  use async_trait::async_trait;
  use serde_json::json;

  struct Books {
    private: bool,
  }

  #[async_trait]
  impl BatchLoad for Books {
    type Key = u32;
    type Value = String;

    async fn load_batch(&self, keys: &[u32]) -> Result<Vec<String>, LoadError> {
      Ok(
        keys
          .iter()
          .map(|k| format!("book-{k}-private={}", self.private))
          .collect(),
      )
    }
  }

  impl Loader for Books {
    const NAME: &'static str = "books";

    fn create(ctx: &mut LoaderContext<'_>) -> Result<Self, DependencyError> {
      Ok(Self {
        private: ctx.param("private")?,
      })
    }
  }

  /// Depends on `Books` through the context.
  struct Shelves {
    books: Arc<BatchLoader<Books>>,
  }

  #[async_trait]
  impl BatchLoad for Shelves {
    type Key = u32;
    type Value = Vec<String>;

    async fn load_batch(&self, keys: &[u32]) -> Result<Vec<Vec<String>>, LoadError> {
      let mut shelves = Vec::with_capacity(keys.len());
      for key in keys {
        shelves.push(vec![self.books.load(*key).await?]);
      }
      Ok(shelves)
    }
  }

  impl Loader for Shelves {
    const NAME: &'static str = "shelves";

    fn create(ctx: &mut LoaderContext<'_>) -> Result<Self, DependencyError> {
      Ok(Self {
        books: ctx.loader::<Books>()?,
      })
    }
  }

  struct Ping;
  struct Pong;

  macro_rules! unit_loader {
    ($ty:ident, $name:literal, $dep:ident) => {
      #[async_trait]
      impl BatchLoad for $ty {
        type Key = u32;
        type Value = u32;

        async fn load_batch(&self, keys: &[u32]) -> Result<Vec<u32>, LoadError> {
          Ok(keys.to_vec())
        }
      }

      impl Loader for $ty {
        const NAME: &'static str = $name;

        fn create(ctx: &mut LoaderContext<'_>) -> Result<Self, DependencyError> {
          ctx.loader::<$dep>()?;
          Ok($ty)
        }
      }
    };
  }

  unit_loader!(Ping, "ping", Pong);
  unit_loader!(Pong, "pong", Ping);

  fn factories() -> Arc<LoaderFactories> {
    let mut factories = LoaderFactories::new();
    factories
      .register::<Books>()
      .register::<Shelves>()
      .register::<Ping>()
      .register::<Pong>()
      .set_params("books", json!({ "private": true }));
    Arc::new(factories)
  }

  #[tokio::test]
  async fn test_same_instance_within_scope() {
    let scope = Scope::new("s1", factories());

    let first = scope.loader::<Books>().unwrap();
    let second = scope.loader::<Books>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(scope.len(), 1);
    assert_eq!(first.load(4).await.unwrap(), "book-4-private=true");
  }

  #[test]
  fn test_fresh_instance_per_scope() {
    let factories = factories();
    let a = Scope::new("a", factories.clone()).loader::<Books>().unwrap();
    let b = Scope::new("b", factories).loader::<Books>().unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
  }

  #[test]
  fn test_nested_dependency_shares_instance() {
    let scope = Scope::new("s1", factories());

    let shelves = scope.loader::<Shelves>().unwrap();
    let books = scope.loader::<Books>().unwrap();

    assert!(Arc::ptr_eq(&shelves.inner().books, &books));
    assert_eq!(scope.len(), 2);
  }

  #[test]
  fn test_missing_param() {
    let mut factories = LoaderFactories::new();
    factories.register::<Books>();
    let scope = Scope::new("s1", Arc::new(factories));

    let err = scope.loader::<Books>().unwrap_err();
    assert_eq!(
      err,
      DependencyError::MissingParam {
        loader: "books".to_string(),
        param: "private".to_string(),
      }
    );
    assert!(scope.is_empty());
  }

  #[test]
  fn test_invalid_param() {
    let mut factories = LoaderFactories::new();
    factories
      .register::<Books>()
      .set_params("books", json!({ "private": "yes" }));
    let scope = Scope::new("s1", Arc::new(factories));

    assert!(matches!(
      scope.loader::<Books>(),
      Err(DependencyError::InvalidParam { .. })
    ));
  }

  #[test]
  fn test_missing_factory() {
    let mut factories = LoaderFactories::new();
    factories.register::<Shelves>();
    let scope = Scope::new("s1", Arc::new(factories));

    assert_eq!(
      scope.loader::<Shelves>().unwrap_err(),
      DependencyError::MissingFactory {
        loader: "books".to_string(),
      }
    );
  }

  #[test]
  fn test_cycle_is_reported_with_path() {
    let scope = Scope::new("s1", factories());

    let err = scope.loader::<Ping>().unwrap_err();
    assert_eq!(
      err,
      DependencyError::Cycle {
        path: vec!["ping".to_string(), "pong".to_string(), "ping".to_string()],
      }
    );
    assert_eq!(err.to_string(), "cyclic loader dependency: ping -> pong -> ping");
  }
}
