//! Field classification.
//!
//! Classifying a [`NodeType`] splits its fields into plain, resolve and post
//! fields and validates every declared target. The result is purely
//! structural, so it is computed once per type and shared for the life of the
//! process.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use arbor_loader::LoaderDependency;

use crate::error::SchemaError;
use crate::field::{PostField, ResolveField};
use crate::mapper::Mapper;
use crate::node_type::{NodeType, TypeKey};

static PLANS: LazyLock<RwLock<HashMap<TypeKey, Arc<FieldPlan>>>> =
  LazyLock::new(|| RwLock::new(HashMap::new()));

/// Role of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
  Plain,
  Resolve,
  Post,
}

impl fmt::Display for FieldKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Plain => "plain",
      Self::Resolve => "resolve",
      Self::Post => "post",
    })
  }
}

/// A validated resolve field, bound to its slot on the node.
#[derive(Debug, Clone)]
pub struct ResolveDescriptor {
  index: usize,
  field: ResolveField,
}

impl ResolveDescriptor {
  pub fn name(&self) -> &str {
    self.field.target()
  }

  /// Declaration index of the target field.
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn field(&self) -> &ResolveField {
    &self.field
  }

  pub fn mapper(&self) -> Option<&Mapper> {
    self.field.mapper()
  }

  pub fn dependency(&self) -> Option<&LoaderDependency> {
    self.field.dependency()
  }
}

/// A validated post field, bound to its slot on the node.
#[derive(Debug, Clone)]
pub struct PostDescriptor {
  index: usize,
  field: PostField,
}

impl PostDescriptor {
  pub fn name(&self) -> &str {
    self.field.target()
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn field(&self) -> &PostField {
    &self.field
  }
}

/// Classification result for one node type.
#[derive(Debug)]
pub struct FieldPlan {
  node_type: String,
  kinds: Vec<FieldKind>,
  resolve: Vec<ResolveDescriptor>,
  post: Vec<PostDescriptor>,
}

impl FieldPlan {
  pub fn node_type(&self) -> &str {
    &self.node_type
  }

  /// Resolve fields, in declaration order.
  pub fn resolve_fields(&self) -> &[ResolveDescriptor] {
    &self.resolve
  }

  /// Post fields, in declaration order.
  pub fn post_fields(&self) -> &[PostDescriptor] {
    &self.post
  }

  pub fn kind(&self, index: usize) -> Option<FieldKind> {
    self.kinds.get(index).copied()
  }

  /// Whether the type declares nothing for the engine to do.
  pub fn is_noop(&self) -> bool {
    self.resolve.is_empty() && self.post.is_empty()
  }
}

/// Classify a node type, returning the cached plan when one exists.
///
/// Failed classifications are not cached; the same error is reported again
/// on every call.
pub fn classify(node_type: &NodeType) -> Result<Arc<FieldPlan>, SchemaError> {
  if let Some(plan) = PLANS
    .read()
    .unwrap_or_else(PoisonError::into_inner)
    .get(&node_type.key())
  {
    return Ok(plan.clone());
  }

  let plan = Arc::new(build_plan(node_type)?);

  let mut plans = PLANS.write().unwrap_or_else(PoisonError::into_inner);
  Ok(plans.entry(node_type.key()).or_insert(plan).clone())
}

fn build_plan(node_type: &NodeType) -> Result<FieldPlan, SchemaError> {
  let mut names = HashSet::new();
  for field in node_type.fields() {
    if !names.insert(field.name()) {
      return Err(SchemaError::DuplicateField {
        node_type: node_type.name().to_string(),
        field: field.name().to_string(),
      });
    }
  }

  let mut kinds = vec![FieldKind::Plain; node_type.fields().len()];

  let mut resolve = Vec::with_capacity(node_type.resolvers().len());
  for field in node_type.resolvers() {
    let index = bind(node_type, &mut kinds, field.target(), FieldKind::Resolve)?;
    resolve.push(ResolveDescriptor {
      index,
      field: field.clone(),
    });
  }

  let mut post = Vec::with_capacity(node_type.posts().len());
  for field in node_type.posts() {
    let index = bind(node_type, &mut kinds, field.target(), FieldKind::Post)?;
    post.push(PostDescriptor {
      index,
      field: field.clone(),
    });
  }

  Ok(FieldPlan {
    node_type: node_type.name().to_string(),
    kinds,
    resolve,
    post,
  })
}

fn bind(
  node_type: &NodeType,
  kinds: &mut [FieldKind],
  target: &str,
  kind: FieldKind,
) -> Result<usize, SchemaError> {
  let index = node_type
    .field_index(target)
    .ok_or_else(|| SchemaError::UnknownTarget {
      node_type: node_type.name().to_string(),
      field: target.to_string(),
      kind,
    })?;

  if kinds[index] != FieldKind::Plain {
    return Err(SchemaError::DuplicateTarget {
      node_type: node_type.name().to_string(),
      field: target.to_string(),
    });
  }
  kinds[index] = kind;
  Ok(index)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::FieldError;
  use serde_json::json;

  fn article() -> Arc<NodeType> {
    NodeType::builder("Article")
      .field("id")
      .field("tags")
      .field("author")
      .field("tag_count")
      .resolve(ResolveField::from_value("author", |_| Ok(json!("ann"))))
      .resolve(ResolveField::from_value("tags", |_| Ok(json!(["a", "b"]))))
      .post(PostField::new("tag_count", |node| {
        Ok::<_, FieldError>(json!(node.value("tags").and_then(|t| t.as_array()).map_or(0, Vec::len)))
      }))
      .build()
  }

  #[test]
  fn test_classification_is_memoized() {
    let ty = article();

    let first = classify(&ty).unwrap();
    let second = classify(&ty).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
  }

  #[test]
  fn test_fields_keep_declaration_order() {
    let plan = classify(&article()).unwrap();

    let resolve: Vec<_> = plan.resolve_fields().iter().map(|d| d.name()).collect();
    assert_eq!(resolve, vec!["author", "tags"]);
    assert_eq!(plan.resolve_fields()[0].index(), 2);
    assert_eq!(plan.post_fields()[0].name(), "tag_count");

    assert_eq!(plan.kind(0), Some(FieldKind::Plain));
    assert_eq!(plan.kind(1), Some(FieldKind::Resolve));
    assert_eq!(plan.kind(3), Some(FieldKind::Post));
    assert!(!plan.is_noop());
  }

  #[test]
  fn test_plain_type_is_noop() {
    let ty = NodeType::builder("Tag").field("name").build();

    let plan = classify(&ty).unwrap();
    assert!(plan.is_noop());
    assert!(plan.resolve_fields().is_empty());
  }

  #[test]
  fn test_unknown_resolve_target() {
    let ty = NodeType::builder("Article")
      .field("id")
      .resolve(ResolveField::from_value("xyz", |_| Ok(json!(1))))
      .build();

    let err = classify(&ty).unwrap_err();
    assert_eq!(
      err,
      SchemaError::UnknownTarget {
        node_type: "Article".to_string(),
        field: "xyz".to_string(),
        kind: FieldKind::Resolve,
      }
    );
    assert!(err.to_string().contains("'xyz'"));

    // Errors are reported again rather than cached as plans.
    assert!(classify(&ty).is_err());
  }

  #[test]
  fn test_unknown_post_target() {
    let ty = NodeType::builder("Article")
      .field("id")
      .post(PostField::new("summary", |_| Ok::<_, FieldError>(json!(""))))
      .build();

    assert!(matches!(
      classify(&ty),
      Err(SchemaError::UnknownTarget {
        kind: FieldKind::Post,
        ..
      })
    ));
  }

  #[test]
  fn test_duplicate_target() {
    let ty = NodeType::builder("Article")
      .field("title")
      .resolve(ResolveField::from_value("title", |_| Ok(json!("a"))))
      .post(PostField::new("title", |_| Ok::<_, FieldError>(json!("b"))))
      .build();

    assert_eq!(
      classify(&ty).unwrap_err(),
      SchemaError::DuplicateTarget {
        node_type: "Article".to_string(),
        field: "title".to_string(),
      }
    );
  }

  #[test]
  fn test_duplicate_field() {
    let ty = NodeType::builder("Article").field("id").field("id").build();

    assert!(matches!(
      classify(&ty),
      Err(SchemaError::DuplicateField { .. })
    ));
  }
}
