//! Provider errors.

use thiserror::Error;

/// Transport-level failures talking to a provider.
///
/// A model that ran and reported failure is not an error; it comes back as a
/// [`crate::ProviderResult`] with `success: false`.
#[derive(Debug, Error)]
pub enum ProviderError {
  /// HTTP request failed.
  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The provider answered with something that is not a prediction.
  #[error("unexpected response from {provider}: {message}")]
  InvalidResponse { provider: String, message: String },

  /// No provider is registered for the requested backend.
  #[error("no provider configured for '{0}'")]
  NotConfigured(String),
}
