//! Field values.

use std::slice;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::node::Node;

/// The value held by one field of a [`Node`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  /// Leaf data, opaque to the engine.
  Value(Value),
  /// A single child node.
  Node(Box<Node>),
  /// A collection of child nodes.
  List(Vec<Node>),
}

impl FieldValue {
  pub fn null() -> Self {
    Self::Value(Value::Null)
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Self::Value(Value::Null))
  }

  pub fn as_value(&self) -> Option<&Value> {
    match self {
      Self::Value(value) => Some(value),
      _ => None,
    }
  }

  /// Child nodes held by this value; empty for leaf data.
  pub fn as_nodes(&self) -> &[Node] {
    match self {
      Self::Node(node) => slice::from_ref(node.as_ref()),
      Self::List(nodes) => nodes,
      Self::Value(_) => &[],
    }
  }

  /// Whether the engine needs to recurse into this value.
  pub fn has_nodes(&self) -> bool {
    !self.as_nodes().is_empty()
  }
}

impl Default for FieldValue {
  fn default() -> Self {
    Self::null()
  }
}

impl From<Value> for FieldValue {
  fn from(value: Value) -> Self {
    Self::Value(value)
  }
}

impl From<Node> for FieldValue {
  fn from(node: Node) -> Self {
    Self::Node(Box::new(node))
  }
}

impl From<Vec<Node>> for FieldValue {
  fn from(nodes: Vec<Node>) -> Self {
    Self::List(nodes)
  }
}

impl Serialize for FieldValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Value(value) => value.serialize(serializer),
      Self::Node(node) => node.serialize(serializer),
      Self::List(nodes) => nodes.serialize(serializer),
    }
  }
}
