//! Node type declarations.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::field::{PostField, ResolveField};
use crate::value::FieldValue;

static NEXT_TYPE_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a registered node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u64);

/// A declared field and the value it holds until something assigns it.
#[derive(Debug, Clone)]
pub struct FieldDecl {
  name: String,
  default: FieldValue,
}

impl FieldDecl {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn default_value(&self) -> &FieldValue {
    &self.default
  }
}

/// The shape of a node: its fields plus the resolve and post declarations
/// that populate them.
///
/// Types are immutable once built and identified by a [`TypeKey`], which is
/// what classification is cached under.
pub struct NodeType {
  key: TypeKey,
  name: String,
  fields: Vec<FieldDecl>,
  resolvers: Vec<ResolveField>,
  posts: Vec<PostField>,
}

impl NodeType {
  pub fn builder(name: impl Into<String>) -> NodeTypeBuilder {
    NodeTypeBuilder {
      name: name.into(),
      fields: Vec::new(),
      resolvers: Vec::new(),
      posts: Vec::new(),
    }
  }

  pub fn key(&self) -> TypeKey {
    self.key
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Declared fields, in declaration order.
  pub fn fields(&self) -> &[FieldDecl] {
    &self.fields
  }

  pub fn resolvers(&self) -> &[ResolveField] {
    &self.resolvers
  }

  pub fn posts(&self) -> &[PostField] {
    &self.posts
  }

  /// Position of a field in declaration order.
  pub fn field_index(&self, name: &str) -> Option<usize> {
    self.fields.iter().position(|field| field.name == name)
  }
}

impl fmt::Debug for NodeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NodeType")
      .field("key", &self.key)
      .field("name", &self.name)
      .field("fields", &self.fields)
      .field("resolvers", &self.resolvers)
      .field("posts", &self.posts)
      .finish()
  }
}

/// Builder for [`NodeType`].
///
/// ```ignore
/// let comment = NodeType::builder("Comment")
///   .field("id")
///   .field_with_default("feedbacks", json!([]))
///   .resolve(
///     ResolveField::with_loader::<FeedbackLoader, _, _>("feedbacks", |node, loader| {
///       let id = node.value("id").cloned().unwrap_or_default();
///       async move { Ok(loader.load(id).await?) }
///     })
///     .map(Mapper::to(feedback.clone())),
///   )
///   .build();
/// ```
pub struct NodeTypeBuilder {
  name: String,
  fields: Vec<FieldDecl>,
  resolvers: Vec<ResolveField>,
  posts: Vec<PostField>,
}

impl NodeTypeBuilder {
  /// Declare a field defaulting to null.
  pub fn field(self, name: impl Into<String>) -> Self {
    self.field_with_default(name, FieldValue::null())
  }

  pub fn field_with_default(mut self, name: impl Into<String>, default: impl Into<FieldValue>) -> Self {
    self.fields.push(FieldDecl {
      name: name.into(),
      default: default.into(),
    });
    self
  }

  pub fn resolve(mut self, field: ResolveField) -> Self {
    self.resolvers.push(field);
    self
  }

  pub fn post(mut self, field: PostField) -> Self {
    self.posts.push(field);
    self
  }

  /// Register the type. Targets are validated when the type is classified.
  pub fn build(self) -> Arc<NodeType> {
    Arc::new(NodeType {
      key: TypeKey(NEXT_TYPE_KEY.fetch_add(1, Ordering::Relaxed)),
      name: self.name,
      fields: self.fields,
      resolvers: self.resolvers,
      posts: self.posts,
    })
  }
}
