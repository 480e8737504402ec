use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::{ArtifactError, Fetcher};

/// [`Fetcher`] over plain HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, url: &str) -> Result<(Bytes, Option<String>), ArtifactError> {
    let response = self.client.get(url).send().await?.error_for_status()?;
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string);
    Ok((response.bytes().await?, content_type))
  }
}
