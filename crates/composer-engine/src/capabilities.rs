use std::sync::Arc;

use composer_artifact::{Fetcher, HttpFetcher, Uploader};
use composer_provider::ProviderSet;
use composer_store::RunStore;

use crate::hooks::{AllowAll, AudioMuxer, DispatchGuard, InputNormalizer, Passthrough};
use crate::sinks::{DraftSink, ExampleSink, NoopSink};

/// External services a flow run may call.
///
/// Only the providers and run store are required; everything else defaults
/// to a pass-through or no-op implementation.
#[derive(Clone)]
pub struct Capabilities {
  pub providers: ProviderSet,
  pub runs: Arc<dyn RunStore>,
  /// Target for the example artifact of successful runs. Without one the
  /// example step is skipped.
  pub uploader: Option<Arc<dyn Uploader>>,
  pub fetcher: Arc<dyn Fetcher>,
  pub drafts: Arc<dyn DraftSink>,
  pub examples: Arc<dyn ExampleSink>,
  pub normalizer: Arc<dyn InputNormalizer>,
  pub guard: Arc<dyn DispatchGuard>,
  pub muxer: Option<Arc<dyn AudioMuxer>>,
}

impl Capabilities {
  pub fn new(providers: ProviderSet, runs: Arc<dyn RunStore>) -> Self {
    Self {
      providers,
      runs,
      uploader: None,
      fetcher: Arc::new(HttpFetcher::new()),
      drafts: Arc::new(NoopSink),
      examples: Arc::new(NoopSink),
      normalizer: Arc::new(Passthrough),
      guard: Arc::new(AllowAll),
      muxer: None,
    }
  }

  pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
    self.uploader = Some(uploader);
    self
  }

  pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
    self.fetcher = fetcher;
    self
  }

  pub fn with_drafts(mut self, drafts: Arc<dyn DraftSink>) -> Self {
    self.drafts = drafts;
    self
  }

  pub fn with_examples(mut self, examples: Arc<dyn ExampleSink>) -> Self {
    self.examples = examples;
    self
  }

  pub fn with_normalizer(mut self, normalizer: Arc<dyn InputNormalizer>) -> Self {
    self.normalizer = normalizer;
    self
  }

  pub fn with_guard(mut self, guard: Arc<dyn DispatchGuard>) -> Self {
    self.guard = guard;
    self
  }

  pub fn with_muxer(mut self, muxer: Arc<dyn AudioMuxer>) -> Self {
    self.muxer = Some(muxer);
    self
  }
}

impl std::fmt::Debug for Capabilities {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Capabilities")
      .field("providers", &self.providers)
      .field("uploader", &self.uploader.is_some())
      .field("muxer", &self.muxer.is_some())
      .finish_non_exhaustive()
  }
}
