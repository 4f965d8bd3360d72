//! One resolve call: a scope plus the per-node state machine.
//!
//! Every node moves through
//! `pending -> resolving_fields -> resolving_children -> post_processing -> done`.
//! Sibling fields and sibling subtrees are joined rather than spawned, so the
//! whole tree runs inside the caller's task and sibling loads land in the
//! same batch.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use arbor_loader::{LoaderFactories, Scope};
use arbor_schema::{FieldError, FieldKind, FieldPlan, FieldValue, Mapper, Node, NodeType, classify};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::error::ResolveError;

pub(crate) struct ScopeExecution {
  scope: Scope,
}

impl ScopeExecution {
  /// Open a fresh scope. Nothing is shared with any other call.
  pub(crate) fn open(factories: Arc<LoaderFactories>) -> Self {
    let scope_id = uuid::Uuid::new_v4().to_string();
    Self {
      scope: Scope::new(scope_id, factories),
    }
  }

  pub(crate) fn id(&self) -> &str {
    self.scope.id()
  }

  /// Types of `roots` and of every node already present beneath them,
  /// deduplicated. Post slots are skipped since they are recomputed.
  pub(crate) fn instance_types(roots: &[Node]) -> Vec<Arc<NodeType>> {
    let mut seen = HashSet::new();
    let mut types = Vec::new();
    let mut pending: Vec<&Node> = roots.iter().collect();

    while let Some(node) = pending.pop() {
      if seen.insert(node.node_type().key()) {
        types.push(node.node_type().clone());
      }
      // An invalid type is reported by `prepare`; its slots are not walked
      let Ok(plan) = classify(node.node_type()) else {
        continue;
      };
      for index in 0..node.len() {
        if plan.kind(index) == Some(FieldKind::Post) {
          continue;
        }
        if let Some(value) = node.slot(index) {
          pending.extend(value.as_nodes());
        }
      }
    }

    types
  }

  /// Validate every type reachable from `root_types`, then drive `work` to
  /// completion unless `cancel` fires first.
  pub(crate) async fn run<T, F>(
    &self,
    root_types: Vec<Arc<NodeType>>,
    work: F,
    cancel: &CancellationToken,
  ) -> Result<T, ResolveError>
  where
    F: Future<Output = Result<T, ResolveError>>,
  {
    info!(
      scope_id = %self.id(),
      node_types = root_types.len(),
      "resolve_started"
    );

    let result = self.drive(root_types, work, cancel).await;

    match &result {
      Ok(_) => {
        info!(
          scope_id = %self.id(),
          loaders = self.scope.len(),
          "resolve_completed"
        );
      }
      Err(e) => {
        error!(
          scope_id = %self.id(),
          error = %e,
          "resolve_failed"
        );
      }
    }

    result
  }

  async fn drive<T, F>(
    &self,
    root_types: Vec<Arc<NodeType>>,
    work: F,
    cancel: &CancellationToken,
  ) -> Result<T, ResolveError>
  where
    F: Future<Output = Result<T, ResolveError>>,
  {
    if cancel.is_cancelled() {
      warn!(scope_id = %self.id(), "resolve cancelled");
      return Err(ResolveError::Cancelled);
    }

    // Schema and binding problems surface before any fetch runs
    self.prepare(root_types)?;

    tokio::select! {
      result = work => result,
      _ = cancel.cancelled() => {
        warn!(scope_id = %self.id(), "resolve cancelled during resolution");
        Err(ResolveError::Cancelled)
      }
    }
  }

  /// Classify every type reachable through declared mapper targets.
  ///
  /// `root_types` must already include the types of nodes the caller built
  /// into the roots; see [`instance_types`](Self::instance_types).
  fn prepare(&self, root_types: Vec<Arc<NodeType>>) -> Result<(), ResolveError> {
    let mut seen = HashSet::new();
    let mut pending = root_types;

    while let Some(node_type) = pending.pop() {
      if !seen.insert(node_type.key()) {
        continue;
      }

      let plan = self.plan(&node_type)?;
      pending.extend(
        plan
          .resolve_fields()
          .iter()
          .filter_map(|descriptor| descriptor.mapper().and_then(Mapper::target))
          .cloned(),
      );
    }

    Ok(())
  }

  /// Classify a type and check that every loader it needs is registered.
  fn plan(&self, node_type: &NodeType) -> Result<Arc<FieldPlan>, ResolveError> {
    let plan = classify(node_type)?;

    for descriptor in plan.resolve_fields() {
      let Some(dependency) = descriptor.dependency() else {
        continue;
      };
      if !self.scope.factories().contains(dependency) {
        return Err(ResolveError::LoaderField {
          node_type: plan.node_type().to_string(),
          field: descriptor.name().to_string(),
          loader: dependency.name().to_string(),
        });
      }
    }

    Ok(plan)
  }

  pub(crate) async fn resolve_many(&self, roots: Vec<Node>) -> Result<Vec<Node>, ResolveError> {
    try_join_all(roots.into_iter().map(|root| self.resolve_node(root))).await
  }

  /// Drive one node, and its whole subtree, to `done`.
  pub(crate) fn resolve_node(&self, mut node: Node) -> BoxFuture<'_, Result<Node, ResolveError>> {
    async move {
      let plan = self.plan(node.node_type())?;
      self.transition(&plan, "resolving_fields");

      let mut fetches = Vec::with_capacity(plan.resolve_fields().len());
      for descriptor in plan.resolve_fields() {
        let loader = match descriptor.dependency() {
          Some(dependency) => Some(self.scope.get_or_create(dependency).map_err(|source| {
            ResolveError::Dependency {
              node_type: plan.node_type().to_string(),
              field: descriptor.name().to_string(),
              source,
            }
          })?),
          None => None,
        };

        let fetch = descriptor.field().call(&node, loader);
        let plan = &plan;
        fetches.push(async move {
          let context = |e: FieldError| ResolveError::from_field(plan.node_type(), descriptor.name(), e);
          let raw = fetch.await.map_err(context)?;
          let value = match descriptor.mapper() {
            Some(mapper) => mapper.map(raw).map_err(context)?,
            None => FieldValue::from(raw),
          };
          Ok::<_, ResolveError>((descriptor.index(), value))
        });
      }

      for (index, value) in try_join_all(fetches).await? {
        node.assign(index, value);
      }

      self.transition(&plan, "resolving_children");

      // Post slots are computed below, never recursed into
      let indexes: Vec<_> = (0..node.len())
        .filter(|index| {
          plan.kind(*index) != Some(FieldKind::Post)
            && node.slot(*index).is_some_and(FieldValue::has_nodes)
        })
        .collect();
      let children = indexes.into_iter().map(|index| {
        let value = node.take_slot(index).unwrap_or_default();
        async move {
          let value = self.resolve_value(value).await?;
          Ok::<_, ResolveError>((index, value))
        }
      });

      let resolved = try_join_all(children.collect::<Vec<_>>()).await?;
      for (index, value) in resolved {
        node.assign(index, value);
      }

      self.transition(&plan, "post_processing");

      for descriptor in plan.post_fields() {
        let value = descriptor
          .field()
          .compute(&node)
          .map_err(|source| ResolveError::Post {
            node_type: plan.node_type().to_string(),
            field: descriptor.name().to_string(),
            source,
          })?;
        node.assign(descriptor.index(), value);
      }

      self.transition(&plan, "done");
      Ok(node)
    }
    .boxed()
  }

  async fn resolve_value(&self, value: FieldValue) -> Result<FieldValue, ResolveError> {
    match value {
      FieldValue::Node(node) => self.resolve_node(*node).await.map(FieldValue::from),
      FieldValue::List(nodes) => self.resolve_many(nodes).await.map(FieldValue::List),
      leaf @ FieldValue::Value(_) => Ok(leaf),
    }
  }

  fn transition(&self, plan: &FieldPlan, state: &'static str) {
    trace!(
      scope_id = %self.id(),
      node_type = plan.node_type(),
      state,
      "node_state"
    );
  }
}
