//! Resolve and post field declarations.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arbor_loader::{BatchLoader, DependencyError, Loader, LoaderDependency, LoaderHandle};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::FieldError;
use crate::mapper::Mapper;
use crate::node::Node;
use crate::value::FieldValue;

/// Future returned by a resolve function: the raw, unmapped result.
pub type ResolveFuture = BoxFuture<'static, Result<Value, FieldError>>;

type ResolveFn = Arc<dyn Fn(&Node, Option<LoaderHandle>) -> ResolveFuture + Send + Sync>;
type PostFn = Arc<dyn Fn(&Node) -> Result<FieldValue, FieldError> + Send + Sync>;

/// A field populated by a (possibly asynchronous) fetch.
///
/// Resolve functions read what they need from the node up front and return a
/// `'static` future; the node is never borrowed across a suspension point.
#[derive(Clone)]
pub struct ResolveField {
  target: String,
  dependency: Option<LoaderDependency>,
  resolve: ResolveFn,
  mapper: Option<Mapper>,
}

impl ResolveField {
  /// Resolve through the scope's batch loader `L`.
  ///
  /// The engine constructs (or reuses) the loader for the current scope and
  /// passes it in.
  pub fn with_loader<L, F, Fut>(target: impl Into<String>, resolve: F) -> Self
  where
    L: Loader,
    F: Fn(&Node, Arc<BatchLoader<L>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FieldError>> + Send + 'static,
  {
    let resolve: ResolveFn = Arc::new(move |node: &Node, handle: Option<LoaderHandle>| {
      let loader = handle
        .ok_or_else(|| DependencyError::MissingFactory {
          loader: L::NAME.to_string(),
        })
        .and_then(BatchLoader::<L>::from_handle);
      match loader {
        Ok(loader) => resolve(node, loader).boxed(),
        Err(e) => future::ready(Err(FieldError::from(e))).boxed(),
      }
    });

    Self {
      target: target.into(),
      dependency: Some(LoaderDependency::of::<L>()),
      resolve,
      mapper: None,
    }
  }

  /// Resolve with an arbitrary async function.
  pub fn from_fn<F, Fut>(target: impl Into<String>, resolve: F) -> Self
  where
    F: Fn(&Node) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FieldError>> + Send + 'static,
  {
    Self {
      target: target.into(),
      dependency: None,
      resolve: Arc::new(move |node: &Node, _: Option<LoaderHandle>| resolve(node).boxed()),
      mapper: None,
    }
  }

  /// Resolve with a synchronous function.
  pub fn from_value<F>(target: impl Into<String>, resolve: F) -> Self
  where
    F: Fn(&Node) -> Result<Value, FieldError> + Send + Sync + 'static,
  {
    Self {
      target: target.into(),
      dependency: None,
      resolve: Arc::new(move |node: &Node, _: Option<LoaderHandle>| {
        future::ready(resolve(node)).boxed()
      }),
      mapper: None,
    }
  }

  /// Convert the raw result into child nodes before assignment.
  pub fn map(mut self, mapper: Mapper) -> Self {
    self.mapper = Some(mapper);
    self
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  pub fn dependency(&self) -> Option<&LoaderDependency> {
    self.dependency.as_ref()
  }

  pub fn mapper(&self) -> Option<&Mapper> {
    self.mapper.as_ref()
  }

  /// Start resolving `node`. `loader` must be the instance for
  /// [`dependency`](Self::dependency) when one is declared.
  pub fn call(&self, node: &Node, loader: Option<LoaderHandle>) -> ResolveFuture {
    (self.resolve)(node, loader)
  }
}

impl fmt::Debug for ResolveField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResolveField")
      .field("target", &self.target)
      .field("dependency", &self.dependency.map(|d| d.name()))
      .field("mapper", &self.mapper)
      .finish()
  }
}

/// A field computed synchronously once the node's subtree is complete.
#[derive(Clone)]
pub struct PostField {
  target: String,
  compute: PostFn,
}

impl PostField {
  pub fn new<F, V>(target: impl Into<String>, compute: F) -> Self
  where
    F: Fn(&Node) -> Result<V, FieldError> + Send + Sync + 'static,
    V: Into<FieldValue>,
  {
    Self {
      target: target.into(),
      compute: Arc::new(move |node: &Node| -> Result<FieldValue, FieldError> {
        compute(node).map(Into::into)
      }),
    }
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  pub fn compute(&self, node: &Node) -> Result<FieldValue, FieldError> {
    (self.compute)(node)
  }
}

impl fmt::Debug for PostField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PostField")
      .field("target", &self.target)
      .finish()
  }
}
