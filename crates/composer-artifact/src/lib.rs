//! Composer Artifact
//!
//! This crate provides the upload capability used to persist a flow's final
//! artifact. Artifacts arrive either as embedded base64 payloads (data URIs)
//! or as URLs hosted by a provider; the latter are downloaded with a
//! [`Fetcher`] and uploaded again so the flow owns its copy.
//!
//! The [`Uploader`] trait is the platform layer. [`FsUploader`] stores files
//! on local disk and serves them under a configurable public base URL.

mod data_uri;
mod fetch;
mod fs;

pub use data_uri::{DataUri, encode_data_uri, extension_for};
pub use fetch::HttpFetcher;
pub use fs::{FsUploader, FsUploaderConfig};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Error type for artifact operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
  /// The payload is not valid base64.
  #[error("invalid base64 payload: {0}")]
  Decode(#[from] base64::DecodeError),

  /// A remote artifact could not be downloaded.
  #[error("download failed: {0}")]
  Download(#[from] reqwest::Error),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// A base64 payload to store for a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
  /// Raw base64 or a full `data:` URI.
  pub base64: String,
  pub flow_id: String,
  /// Logical folder, e.g. `images`.
  pub folder: String,
}

/// Where an uploaded artifact can be reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedArtifact {
  pub url: String,
}

/// Artifact upload backend.
#[async_trait]
pub trait Uploader: Send + Sync {
  async fn upload(&self, request: UploadRequest) -> Result<UploadedArtifact, ArtifactError>;

  /// Whether a URL already points at this uploader's storage.
  fn is_hosted(&self, _url: &str) -> bool {
    false
  }
}

/// Downloads remote artifacts for re-hosting.
#[async_trait]
pub trait Fetcher: Send + Sync {
  /// Fetch the body and content type of a URL.
  async fn fetch(&self, url: &str) -> Result<(Bytes, Option<String>), ArtifactError>;
}
