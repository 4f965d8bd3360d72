//! Public resolve entry points.

use std::sync::Arc;

use arbor_loader::{Loader, LoaderFactories};
use arbor_schema::Node;
use tokio_util::sync::CancellationToken;
use tracing::{Span, field, instrument};

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::execution::ScopeExecution;

/// Populates node trees.
///
/// A resolver only holds the registered loader factories and their
/// parameters. Each call opens its own scope, so loader caches never outlive
/// the call that filled them. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
  factories: Arc<LoaderFactories>,
}

impl Resolver {
  /// A resolver with no loaders registered.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn builder() -> ResolverBuilder {
    ResolverBuilder::default()
  }

  pub fn factories(&self) -> &LoaderFactories {
    &self.factories
  }

  /// Resolve a single root.
  #[instrument(
    name = "resolve",
    skip_all,
    fields(node_type = %root.type_name(), scope_id = field::Empty)
  )]
  pub async fn resolve(&self, root: Node) -> Result<Node, ResolveError> {
    let execution = self.open();
    let root_types = ScopeExecution::instance_types(std::slice::from_ref(&root));
    execution
      .run(
        root_types,
        execution.resolve_node(root),
        &CancellationToken::new(),
      )
      .await
  }

  /// Resolve several roots in one scope, so their loads batch together.
  #[instrument(
    name = "resolve_all",
    skip_all,
    fields(roots = roots.len(), scope_id = field::Empty)
  )]
  pub async fn resolve_all(&self, roots: Vec<Node>) -> Result<Vec<Node>, ResolveError> {
    self.run_all(roots, &CancellationToken::new()).await
  }

  /// Like [`resolve_all`](Self::resolve_all), aborting with
  /// [`ResolveError::Cancelled`] once `cancel` fires.
  #[instrument(
    name = "resolve_all",
    skip_all,
    fields(roots = roots.len(), scope_id = field::Empty)
  )]
  pub async fn resolve_all_cancellable(
    &self,
    roots: Vec<Node>,
    cancel: CancellationToken,
  ) -> Result<Vec<Node>, ResolveError> {
    self.run_all(roots, &cancel).await
  }

  async fn run_all(
    &self,
    roots: Vec<Node>,
    cancel: &CancellationToken,
  ) -> Result<Vec<Node>, ResolveError> {
    let execution = self.open();
    let root_types = ScopeExecution::instance_types(&roots);
    execution
      .run(root_types, execution.resolve_many(roots), cancel)
      .await
  }

  fn open(&self) -> ScopeExecution {
    let execution = ScopeExecution::open(self.factories.clone());
    Span::current().record("scope_id", execution.id());
    execution
  }
}

/// Builder for [`Resolver`].
///
/// ```ignore
/// let resolver = Resolver::builder()
///   .loader::<CommentLoader>()
///   .loader::<FeedbackLoader>()
///   .config(ResolverConfig::from_json(raw)?)
///   .build();
/// ```
#[derive(Debug, Default)]
pub struct ResolverBuilder {
  factories: LoaderFactories,
  config: ResolverConfig,
}

impl ResolverBuilder {
  /// Register a loader type.
  pub fn loader<L: Loader>(mut self) -> Self {
    self.factories.register::<L>();
    self
  }

  /// Construction parameters for the loader registered as `loader`.
  pub fn loader_params(mut self, loader: impl Into<String>, params: serde_json::Value) -> Self {
    self.config = self.config.with_loader_params(loader, params);
    self
  }

  /// Merge a configuration. Later values win per loader.
  pub fn config(mut self, config: ResolverConfig) -> Self {
    self.config.loader_params.extend(config.loader_params);
    self
  }

  pub fn build(self) -> Resolver {
    let mut factories = self.factories;
    for (loader, params) in self.config.loader_params {
      factories.set_params(loader, params);
    }
    Resolver {
      factories: Arc::new(factories),
    }
  }
}
