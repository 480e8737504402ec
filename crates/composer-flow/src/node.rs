use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canvas position of a node. Execution never reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

/// A typed unit of work in a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  #[serde(flatten)]
  pub kind: NodeKind,
  #[serde(default)]
  pub position: Position,
  /// Transient execution state, written by the engine.
  #[serde(default, skip_serializing_if = "NodeStatus::is_idle")]
  pub status: NodeStatus,
}

impl Node {
  pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      kind,
      position: Position::default(),
      status: NodeStatus::default(),
    }
  }

  pub fn tag(&self) -> NodeKindTag {
    self.kind.tag()
  }

  /// Copy of this node with a different status. The payload is shared data
  /// and is never modified by execution.
  pub fn with_status(&self, status: NodeStatus) -> Self {
    Self {
      status,
      ..self.clone()
    }
  }
}

/// Transient flags and values the engine writes onto a node while a flow runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
  #[serde(default)]
  pub running: bool,
  #[serde(default)]
  pub error: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub src: Option<Value>,
}

impl NodeStatus {
  pub fn is_idle(&self) -> bool {
    !self.running && !self.error && self.value.is_none() && self.src.is_none()
  }
}

/// Node variants with their type-specific payloads.
///
/// Serialized adjacently tagged, matching the editor's `{ "type", "data" }`
/// layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NodeKind {
  /// A user-entered constant.
  Primitive(PrimitiveData),
  /// Concatenates every incoming value into one array.
  CombineImages(CombineData),
  /// Joins every incoming value into newline-separated text.
  CombineText(CombineData),
  /// Replaces the audio track of a video.
  ReplaceAudio(ReplaceAudioData),
  /// A call to an external generation model.
  Workflow(WorkflowData),
  /// A sink that displays (and forwards) its first input.
  Result(ResultData),
  /// Canvas annotation. Never executes.
  Comment(CommentData),
}

impl NodeKind {
  pub fn tag(&self) -> NodeKindTag {
    match self {
      NodeKind::Primitive(_) => NodeKindTag::Primitive,
      NodeKind::CombineImages(_) => NodeKindTag::CombineImages,
      NodeKind::CombineText(_) => NodeKindTag::CombineText,
      NodeKind::ReplaceAudio(_) => NodeKindTag::ReplaceAudio,
      NodeKind::Workflow(_) => NodeKindTag::Workflow,
      NodeKind::Result(_) => NodeKindTag::Result,
      NodeKind::Comment(_) => NodeKindTag::Comment,
    }
  }

  /// The kind of media this node produces, when it can be told from the
  /// node alone.
  pub fn media_kind(&self) -> Option<MediaKind> {
    match self {
      NodeKind::Workflow(data) => data.workflow.output_type,
      NodeKind::CombineImages(_) => Some(MediaKind::Image),
      NodeKind::ReplaceAudio(_) => Some(MediaKind::Video),
      NodeKind::Primitive(data) => data
        .field
        .as_ref()
        .and_then(|f| f.field_type.as_deref())
        .and_then(MediaKind::from_field_type),
      NodeKind::CombineText(_) | NodeKind::Result(_) | NodeKind::Comment(_) => None,
    }
  }
}

/// Fieldless discriminant of [`NodeKind`], used to key handler tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKindTag {
  Primitive,
  CombineImages,
  CombineText,
  ReplaceAudio,
  Workflow,
  Result,
  Comment,
}

impl NodeKindTag {
  pub const ALL: [NodeKindTag; 7] = [
    NodeKindTag::Primitive,
    NodeKindTag::CombineImages,
    NodeKindTag::CombineText,
    NodeKindTag::ReplaceAudio,
    NodeKindTag::Workflow,
    NodeKindTag::Result,
    NodeKindTag::Comment,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      NodeKindTag::Primitive => "primitive",
      NodeKindTag::CombineImages => "combine_images",
      NodeKindTag::CombineText => "combine_text",
      NodeKindTag::ReplaceAudio => "replace_audio",
      NodeKindTag::Workflow => "workflow",
      NodeKindTag::Result => "result",
      NodeKindTag::Comment => "comment",
    }
  }
}

impl fmt::Display for NodeKindTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Semantic type of a produced artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
  Image,
  Video,
  Audio,
}

impl MediaKind {
  pub fn from_field_type(field_type: &str) -> Option<Self> {
    match field_type {
      "image" => Some(MediaKind::Image),
      "video" => Some(MediaKind::Video),
      "audio" => Some(MediaKind::Audio),
      _ => None,
    }
  }

  /// Storage folder for artifacts of this kind.
  pub fn folder(&self) -> &'static str {
    match self {
      MediaKind::Image => "images",
      MediaKind::Video => "videos",
      MediaKind::Audio => "audio",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveData {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub field: Option<FieldSpec>,
}

/// Form field backing a primitive node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub field_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombineData {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaceAudioData {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentData {
  #[serde(default)]
  pub text: String,
}

/// Payload of a model-call node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowData {
  pub workflow: WorkflowDescriptor,
  /// Values entered in the node's form.
  #[serde(default)]
  pub inputs: Map<String, Value>,
  /// Values remembered from a previous edit session of this workflow.
  #[serde(default)]
  pub saved_values: Map<String, Value>,
}

impl WorkflowData {
  pub fn new(workflow: WorkflowDescriptor) -> Self {
    Self {
      workflow,
      inputs: Map::new(),
      saved_values: Map::new(),
    }
  }
}

/// The model a workflow node calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDescriptor {
  /// Durable numeric id of a saved workflow. Only saved workflows take part
  /// in run caching.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  /// Provider-specific model identifier, e.g. `black-forest-labs/flux-schnell`.
  pub identifier: String,
  pub provider: ProviderKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// JSON Schema of the model input object.
  #[serde(default, skip_serializing_if = "Value::is_null")]
  pub input_schema: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_type: Option<MediaKind>,
}

impl WorkflowDescriptor {
  pub fn new(identifier: impl Into<String>, provider: ProviderKind) -> Self {
    Self {
      id: None,
      identifier: identifier.into(),
      provider,
      name: None,
      input_schema: Value::Null,
      output_type: None,
    }
  }
}

/// External generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
  Replicate,
  Fal,
}

impl ProviderKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProviderKind::Replicate => "replicate",
      ProviderKind::Fal => "fal",
    }
  }
}

impl fmt::Display for ProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deserialize_editor_layout() {
    let node: Node = serde_json::from_value(json!({
      "id": "m1",
      "type": "workflow",
      "position": { "x": 10.0, "y": 20.0 },
      "data": {
        "workflow": {
          "id": 42,
          "identifier": "black-forest-labs/flux-schnell",
          "provider": "replicate",
          "outputType": "image"
        },
        "inputs": { "prompt": "a cat" }
      }
    }))
    .unwrap();

    assert_eq!(node.tag(), NodeKindTag::Workflow);
    assert!(node.status.is_idle());
    match &node.kind {
      NodeKind::Workflow(data) => {
        assert_eq!(data.workflow.id, Some(42));
        assert_eq!(data.workflow.provider, ProviderKind::Replicate);
        assert_eq!(data.inputs["prompt"], "a cat");
      }
      other => panic!("unexpected kind: {:?}", other),
    }
    assert_eq!(node.kind.media_kind(), Some(MediaKind::Image));
  }

  #[test]
  fn test_idle_status_is_not_serialized() {
    let node = Node::new("c", NodeKind::Comment(CommentData::default()));
    let value = serde_json::to_value(&node).unwrap();

    assert_eq!(value["type"], "comment");
    assert!(value.get("status").is_none());
  }

  #[test]
  fn test_with_status_keeps_payload() {
    let node = Node::new(
      "p",
      NodeKind::Primitive(PrimitiveData {
        value: Some(json!("hi")),
        ..Default::default()
      }),
    );
    let updated = node.with_status(NodeStatus {
      running: true,
      ..Default::default()
    });

    assert_eq!(updated.kind, node.kind);
    assert!(updated.status.running);
    assert!(!node.status.running);
  }

  #[test]
  fn test_primitive_media_kind_from_field() {
    let kind = NodeKind::Primitive(PrimitiveData {
      field: Some(FieldSpec {
        field_type: Some("video".to_string()),
        ..Default::default()
      }),
      ..Default::default()
    });
    assert_eq!(kind.media_kind(), Some(MediaKind::Video));
  }
}
