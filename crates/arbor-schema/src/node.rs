//! Node instances.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{FieldError, SchemaError};
use crate::node_type::NodeType;
use crate::value::FieldValue;

/// One record of a [`NodeType`], holding a value for every declared field.
///
/// A node owns its children; the engine moves nodes through resolution and
/// hands the finished tree back to the caller.
#[derive(Clone)]
pub struct Node {
  node_type: Arc<NodeType>,
  values: Vec<FieldValue>,
}

impl Node {
  /// A node with every field at its declared default.
  pub fn new(node_type: Arc<NodeType>) -> Self {
    let values = node_type
      .fields()
      .iter()
      .map(|field| field.default_value().clone())
      .collect();
    Self { node_type, values }
  }

  /// Build a node from a JSON object. Keys that are not declared fields are
  /// ignored; fields missing from the object keep their defaults.
  pub fn from_json(node_type: Arc<NodeType>, raw: Value) -> Result<Self, FieldError> {
    let mut object = match raw {
      Value::Object(object) => object,
      other => {
        return Err(FieldError::Mapping(format!(
          "expected an object for '{}', got {}",
          node_type.name(),
          other
        )));
      }
    };

    let mut node = Self::new(node_type);
    for (index, field) in node.node_type.fields().iter().enumerate() {
      if let Some(value) = object.remove(field.name()) {
        node.values[index] = FieldValue::Value(value);
      }
    }
    Ok(node)
  }

  /// Builder-style [`set`](Self::set).
  pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Result<Self, SchemaError> {
    self.set(field, value)?;
    Ok(self)
  }

  pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), SchemaError> {
    let index = self.index_of(field)?;
    self.values[index] = value.into();
    Ok(())
  }

  pub fn node_type(&self) -> &Arc<NodeType> {
    &self.node_type
  }

  pub fn type_name(&self) -> &str {
    self.node_type.name()
  }

  pub fn get(&self, field: &str) -> Option<&FieldValue> {
    self
      .node_type
      .field_index(field)
      .map(|index| &self.values[index])
  }

  /// Like [`get`](Self::get), but an undeclared field is an error.
  pub fn require(&self, field: &str) -> Result<&FieldValue, SchemaError> {
    self.index_of(field).map(|index| &self.values[index])
  }

  /// Leaf data of `field`, if it holds any.
  pub fn value(&self, field: &str) -> Option<&Value> {
    self.get(field).and_then(FieldValue::as_value)
  }

  /// Child nodes of `field`; empty when the field holds none.
  pub fn children(&self, field: &str) -> &[Node] {
    self.get(field).map(FieldValue::as_nodes).unwrap_or(&[])
  }

  /// Number of declared fields.
  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Value at a declaration index.
  pub fn slot(&self, index: usize) -> Option<&FieldValue> {
    self.values.get(index)
  }

  /// Move the value out of a declaration index, leaving null behind.
  pub fn take_slot(&mut self, index: usize) -> Option<FieldValue> {
    self.values.get_mut(index).map(std::mem::take)
  }

  /// Assign the value at a declaration index, returning the value it
  /// replaced. `None` means the index is out of range and nothing changed.
  pub fn assign(&mut self, index: usize, value: FieldValue) -> Option<FieldValue> {
    self
      .values
      .get_mut(index)
      .map(|slot| std::mem::replace(slot, value))
  }

  pub fn to_json(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }

  fn index_of(&self, field: &str) -> Result<usize, SchemaError> {
    self
      .node_type
      .field_index(field)
      .ok_or_else(|| SchemaError::UnknownField {
        node_type: self.type_name().to_string(),
        field: field.to_string(),
      })
  }
}

impl PartialEq for Node {
  fn eq(&self, other: &Self) -> bool {
    self.node_type.key() == other.node_type.key() && self.values == other.values
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut debug = f.debug_struct(self.type_name());
    for (field, value) in self.node_type.fields().iter().zip(&self.values) {
      debug.field(field.name(), value);
    }
    debug.finish()
  }
}

impl Serialize for Node {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.values.len()))?;
    for (field, value) in self.node_type.fields().iter().zip(&self.values) {
      map.serialize_entry(field.name(), value)?;
    }
    map.end()
  }
}
