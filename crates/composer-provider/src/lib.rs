//! Composer Provider
//!
//! This crate defines the [`Provider`] capability the engine dispatches
//! model-call nodes through, and concrete clients for the two supported
//! backends:
//! - [`ReplicateProvider`] for `replicate` workflows
//! - [`FalProvider`] for `fal` workflows
//!
//! A provider always answers with a structured [`ProviderResult`]. A model
//! that ran and failed is `success: false`; only transport-level problems
//! surface as [`ProviderError`].

mod echo;
mod error;
mod fal;
mod replicate;
mod set;
mod types;

pub use echo::EchoProvider;
pub use error::ProviderError;
pub use fal::{FalConfig, FalProvider};
pub use replicate::{ReplicateConfig, ReplicateProvider};
pub use set::ProviderSet;
pub use types::{ProviderRequest, ProviderResult};

use async_trait::async_trait;
use composer_flow::ProviderKind;

/// A generation backend.
#[async_trait]
pub trait Provider: Send + Sync {
  /// Which backend this is.
  fn kind(&self) -> ProviderKind;

  /// Run a model to completion.
  async fn run(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError>;
}
