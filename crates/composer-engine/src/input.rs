//! Input collection and schema preparation.
//!
//! # Flow
//! 1. Collection: manual inputs stored on the node, overridden by upstream
//!    outputs arriving over edges (keyed by target handle)
//! 2. Preparation (workflow nodes only): fill gaps from saved values and
//!    schema defaults, coerce array/scalar shape to the schema, check
//!    required keys

use std::collections::HashMap;

use composer_flow::{Edge, Node, NodeKind, WorkflowData};
use serde_json::{Map, Value};

/// Inputs collected for one node, in edge order.
pub type Inputs = Map<String, Value>;

/// Collect a node's inputs.
///
/// Manual inputs are the base layer. Every edge targeting the node whose
/// source has a recorded output places that output under the edge's target
/// handle, overriding a manual value. Sources without output contribute
/// nothing.
pub fn collect(node: &Node, edges: &[Edge], outputs: &HashMap<String, Value>) -> Inputs {
  let mut inputs = manual_inputs(node);

  for edge in edges.iter().filter(|e| e.target == node.id) {
    if let Some(value) = outputs.get(&edge.source) {
      inputs.insert(edge.slot().to_string(), value.clone());
    }
  }

  inputs
}

fn manual_inputs(node: &Node) -> Inputs {
  match &node.kind {
    NodeKind::Workflow(data) => data.inputs.clone(),
    _ => Map::new(),
  }
}

/// JSON Schema type of a model input.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
  String,
  Number,
  Integer,
  Boolean,
  Null,
  Array,
  Object,
}

impl SchemaType {
  fn parse(type_str: &str) -> Self {
    match type_str {
      "number" => SchemaType::Number,
      "integer" => SchemaType::Integer,
      "boolean" => SchemaType::Boolean,
      "null" => SchemaType::Null,
      "array" => SchemaType::Array,
      "object" => SchemaType::Object,
      _ => SchemaType::String,
    }
  }

  fn is_scalar(&self) -> bool {
    matches!(
      self,
      SchemaType::String | SchemaType::Number | SchemaType::Integer | SchemaType::Boolean
    )
  }
}

/// One declared property of a model input schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
  pub name: String,
  pub schema_type: Option<SchemaType>,
  pub default: Option<Value>,
}

/// The parts of an input schema preparation needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
  pub fields: Vec<SchemaField>,
  pub required: Vec<String>,
}

impl InputSchema {
  /// Read `properties` and `required` from a JSON Schema object.
  ///
  /// Only simple object schemas are understood; composite schemas (anyOf,
  /// oneOf, ...) yield fields without a type.
  pub fn from_json_schema(schema: &Value) -> Self {
    let fields = schema
      .get("properties")
      .and_then(|p| p.as_object())
      .map(|properties| {
        properties
          .iter()
          .map(|(name, prop)| SchemaField {
            name: name.clone(),
            schema_type: prop.get("type").and_then(|t| t.as_str()).map(SchemaType::parse),
            default: prop.get("default").cloned(),
          })
          .collect()
      })
      .unwrap_or_default();

    let required = schema
      .get("required")
      .and_then(|r| r.as_array())
      .map(|keys| {
        keys
          .iter()
          .filter_map(|k| k.as_str().map(String::from))
          .collect()
      })
      .unwrap_or_default();

    Self { fields, required }
  }

  fn field(&self, name: &str) -> Option<&SchemaField> {
    self.fields.iter().find(|f| f.name == name)
  }
}

/// Prepare collected inputs for a model call.
///
/// Returns the message of the soft failure when a required input is still
/// missing.
pub fn prepare_workflow_inputs(data: &WorkflowData, collected: Inputs) -> Result<Inputs, String> {
  let schema = InputSchema::from_json_schema(&data.workflow.input_schema);
  let mut inputs = collected;

  for (key, value) in &data.saved_values {
    if is_missing(&inputs, key) && !value.is_null() {
      inputs.insert(key.clone(), value.clone());
    }
  }

  for field in &schema.fields {
    if let Some(default) = &field.default {
      if is_missing(&inputs, &field.name) {
        inputs.insert(field.name.clone(), default.clone());
      }
    }
  }

  let mut prepared = Map::with_capacity(inputs.len());
  for (key, value) in inputs {
    let schema_type = schema.field(&key).and_then(|f| f.schema_type.as_ref());
    if let Some(value) = coerce_shape(value, schema_type) {
      prepared.insert(key, value);
    }
  }

  if let Some(key) = schema.required.iter().find(|k| is_missing(&prepared, k)) {
    return Err(format!("missing required input '{}'", key));
  }

  Ok(prepared)
}

fn is_missing(inputs: &Inputs, key: &str) -> bool {
  inputs.get(key).is_none_or(Value::is_null)
}

/// Wrap a scalar where an array is expected; unwrap the first element where a
/// scalar is expected. An empty array for a scalar yields nothing.
fn coerce_shape(value: Value, schema_type: Option<&SchemaType>) -> Option<Value> {
  match (schema_type, value) {
    (Some(SchemaType::Array), Value::Array(items)) => Some(Value::Array(items)),
    (Some(SchemaType::Array), Value::Null) => Some(Value::Null),
    (Some(SchemaType::Array), scalar) => Some(Value::Array(vec![scalar])),
    (Some(t), Value::Array(items)) if t.is_scalar() => items.into_iter().next(),
    (_, value) => Some(value),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use composer_flow::{ProviderKind, ResultData, WorkflowDescriptor};
  use serde_json::json;

  fn workflow_node(id: &str, inputs: Value) -> Node {
    let mut data = WorkflowData::new(WorkflowDescriptor::new("m", ProviderKind::Replicate));
    data.inputs = inputs.as_object().cloned().unwrap_or_default();
    Node::new(id, NodeKind::Workflow(data))
  }

  fn data_with(schema: Value, saved: Value) -> WorkflowData {
    let mut workflow = WorkflowDescriptor::new("m", ProviderKind::Replicate);
    workflow.input_schema = schema;
    let mut data = WorkflowData::new(workflow);
    data.saved_values = saved.as_object().cloned().unwrap_or_default();
    data
  }

  fn map(value: Value) -> Inputs {
    value.as_object().cloned().unwrap_or_default()
  }

  #[test]
  fn test_edges_override_manual_inputs() {
    let node = workflow_node("m", json!({ "prompt": "manual", "steps": 4 }));
    let edges = vec![
      Edge::new("e1", "p", "m").with_target_handle("prompt"),
      Edge::new("e2", "img", "m").with_target_handle("image"),
    ];
    let outputs = HashMap::from([("p".to_string(), json!("from edge"))]);

    let inputs = collect(&node, &edges, &outputs);

    assert_eq!(inputs["prompt"], "from edge");
    assert_eq!(inputs["steps"], 4);
    // No recorded output for "img": nothing collected.
    assert!(!inputs.contains_key("image"));
  }

  #[test]
  fn test_edge_without_handle_uses_input_slot() {
    let node = Node::new("r", NodeKind::Result(ResultData::default()));
    let edges = vec![Edge::new("e1", "a", "r"), Edge::new("e2", "a", "other")];
    let outputs = HashMap::from([("a".to_string(), json!("x"))]);

    let inputs = collect(&node, &edges, &outputs);
    assert_eq!(inputs, map(json!({ "input": "x" })));
  }

  #[test]
  fn test_saved_values_then_defaults_fill_gaps() {
    let data = data_with(
      json!({
        "properties": {
          "prompt": { "type": "string" },
          "steps": { "type": "integer", "default": 20 },
          "seed": { "type": "integer", "default": 1 }
        }
      }),
      json!({ "seed": 42 }),
    );

    let prepared = prepare_workflow_inputs(&data, map(json!({ "prompt": "cat" }))).unwrap();
    assert_eq!(prepared, map(json!({ "prompt": "cat", "seed": 42, "steps": 20 })));
  }

  #[test]
  fn test_shape_coercion() {
    let data = data_with(
      json!({
        "properties": {
          "images": { "type": "array" },
          "prompt": { "type": "string" },
          "mask": { "type": "string" }
        }
      }),
      json!({}),
    );

    let prepared = prepare_workflow_inputs(
      &data,
      map(json!({ "images": "a.png", "prompt": ["first", "second"], "mask": [] })),
    )
    .unwrap();

    assert_eq!(prepared["images"], json!(["a.png"]));
    assert_eq!(prepared["prompt"], "first");
    assert!(!prepared.contains_key("mask"));
  }

  #[test]
  fn test_missing_required_input() {
    let data = data_with(
      json!({ "properties": { "prompt": { "type": "string" } }, "required": ["prompt"] }),
      json!({}),
    );

    let err = prepare_workflow_inputs(&data, Map::new()).unwrap_err();
    assert_eq!(err, "missing required input 'prompt'");
    assert!(prepare_workflow_inputs(&data, map(json!({ "prompt": "x" }))).is_ok());
  }

  #[test]
  fn test_schema_without_properties() {
    let schema = InputSchema::from_json_schema(&Value::Null);
    assert!(schema.fields.is_empty());
    assert!(schema.required.is_empty());
  }
}
