//! Composer Flow
//!
//! This crate provides the flow graph model for composer: the typed nodes and
//! named-handle edges a user wires together in the editor, the persisted flow
//! document, and the topological leveler the engine schedules from.
//!
//! A flow is plain data. Execution never adds or removes nodes or edges; it
//! only writes the transient [`NodeStatus`] of each node.
//!
//! ```ignore
//! use composer_flow::{Flow, levels};
//!
//! let flow = Flow::from_json(&json)?;
//! for (depth, level) in levels(&flow.nodes, &flow.edges).iter().enumerate() {
//!   println!("{depth}: {:?}", level.iter().map(|n| &n.id).collect::<Vec<_>>());
//! }
//! ```

mod edge;
mod error;
mod flow;
mod graph;
mod level;
mod node;

pub use edge::{DEFAULT_HANDLE, Edge};
pub use error::FlowError;
pub use flow::{Flow, Viewport};
pub use graph::Graph;
pub use level::levels;
pub use node::{
  CombineData, CommentData, FieldSpec, MediaKind, Node, NodeKind, NodeKindTag, NodeStatus,
  Position, PrimitiveData, ProviderKind, ReplaceAudioData, ResultData, WorkflowData,
  WorkflowDescriptor,
};
