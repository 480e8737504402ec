//! Composer Engine
//!
//! Executes a flow: a directed acyclic graph of generation nodes. The flow is
//! split into dependency levels; all nodes of a level run concurrently and
//! the next level starts only after every one of them settles.
//!
//! # Failure model
//!
//! - A node that fails (the provider reports `success: false`, a required
//!   input is missing) is marked with `error` and the run continues. Every
//!   node downstream of it is marked failed without being dispatched.
//! - An unexpected error (a provider transport failure, a run-store error)
//!   aborts the run: [`FlowExecutor::execute`] clears every running flag and
//!   returns the error.
//!
//! # State
//!
//! Each run works on a private [`WorkingCopy`] that always receives every
//! update. The UI-owned [`FlowState`] receives the same updates only while
//! the flow being run is the one open, so switching flows mid-run never
//! leaks one flow's progress into another.

mod capabilities;
mod dispatch;
mod enrich;
mod error;
mod events;
mod executor;
mod hooks;
mod input;
mod registry;
mod sinks;
mod state;
mod working;

pub use capabilities::Capabilities;
pub use dispatch::{
  CombineImagesHandler, CombineTextHandler, CommentHandler, DispatchContext, HandlerTable,
  NodeHandler, NodeOutcome, PrimitiveHandler, ReplaceAudioHandler, ResultHandler, WorkflowHandler,
};
pub use error::{DispatchDenied, ExecutionError, SinkError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use executor::{ExecutionOutcome, ExecutorConfig, FlowExecutor, RunReport};
pub use hooks::{AllowAll, AudioMuxer, DispatchGuard, InputNormalizer, Passthrough, normalize_inputs};
pub use input::{InputSchema, Inputs, SchemaField, SchemaType, collect, prepare_workflow_inputs};
pub use registry::{ExecutionRegistry, RunGuard};
pub use sinks::{DraftSink, ExampleOutput, ExampleSink, NoopSink};
pub use state::{FlowState, NodesUpdate, SharedFlowState};
pub use working::{FlowSnapshot, WorkingCopy};
