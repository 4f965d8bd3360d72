//! Conversion of raw fetch results into child nodes.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::FieldError;
use crate::node::Node;
use crate::node_type::NodeType;
use crate::value::FieldValue;

type MapFn = Arc<dyn Fn(Value) -> Result<FieldValue, FieldError> + Send + Sync>;

/// Turns the raw result of a resolve function into zero, one or many nodes.
///
/// Mappers are pure and synchronous. A mapper that declares its target type
/// lets the resolver classify that type before any fetch runs.
#[derive(Clone)]
pub struct Mapper {
  target: Option<Arc<NodeType>>,
  map: MapFn,
}

impl Mapper {
  /// Map a JSON object into one node of `node_type`, an array into a list of
  /// them, and null into null.
  pub fn to(node_type: Arc<NodeType>) -> Self {
    let target = node_type.clone();
    Self {
      target: Some(node_type),
      map: Arc::new(move |raw: Value| into_nodes(&target, raw)),
    }
  }

  /// Map with a custom function whose output type is not declared.
  pub fn custom<F>(map: F) -> Self
  where
    F: Fn(Value) -> Result<FieldValue, FieldError> + Send + Sync + 'static,
  {
    Self {
      target: None,
      map: Arc::new(map),
    }
  }

  /// Map with a custom function producing nodes of `node_type`.
  pub fn custom_to<F>(node_type: Arc<NodeType>, map: F) -> Self
  where
    F: Fn(Value) -> Result<FieldValue, FieldError> + Send + Sync + 'static,
  {
    Self {
      target: Some(node_type),
      map: Arc::new(map),
    }
  }

  /// The node type this mapper produces, when declared.
  pub fn target(&self) -> Option<&Arc<NodeType>> {
    self.target.as_ref()
  }

  pub fn map(&self, raw: Value) -> Result<FieldValue, FieldError> {
    (self.map)(raw)
  }
}

impl fmt::Debug for Mapper {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Mapper")
      .field("target", &self.target.as_ref().map(|t| t.name()))
      .finish()
  }
}

fn into_nodes(node_type: &Arc<NodeType>, raw: Value) -> Result<FieldValue, FieldError> {
  match raw {
    Value::Null => Ok(FieldValue::null()),
    Value::Array(items) => items
      .into_iter()
      .map(|item| Node::from_json(node_type.clone(), item))
      .collect::<Result<Vec<_>, _>>()
      .map(FieldValue::List),
    object @ Value::Object(_) => Node::from_json(node_type.clone(), object).map(FieldValue::from),
    other => Err(FieldError::Mapping(format!(
      "cannot map {} into '{}'",
      other,
      node_type.name()
    ))),
  }
}
