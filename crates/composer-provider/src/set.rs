use std::collections::HashMap;
use std::sync::Arc;

use composer_flow::ProviderKind;

use crate::Provider;
use crate::error::ProviderError;

/// The providers available to the engine, keyed by backend.
#[derive(Clone, Default)]
pub struct ProviderSet {
  providers: HashMap<ProviderKind, Arc<dyn Provider>>,
}

impl ProviderSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a provider under its own [`Provider::kind`].
  pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
    self.providers.insert(provider.kind(), provider);
    self
  }

  /// Register one provider for every backend. Used for dry runs and tests.
  pub fn uniform(provider: Arc<dyn Provider>) -> Self {
    let providers = [ProviderKind::Replicate, ProviderKind::Fal]
      .into_iter()
      .map(|kind| (kind, provider.clone()))
      .collect();
    Self { providers }
  }

  pub fn get(&self, kind: ProviderKind) -> Result<&Arc<dyn Provider>, ProviderError> {
    self
      .providers
      .get(&kind)
      .ok_or_else(|| ProviderError::NotConfigured(kind.to_string()))
  }
}

impl std::fmt::Debug for ProviderSet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProviderSet")
      .field("providers", &self.providers.keys().collect::<Vec<_>>())
      .finish()
  }
}
