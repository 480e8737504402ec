use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::data_uri::{DataUri, extension_for};
use crate::{ArtifactError, UploadRequest, UploadedArtifact, Uploader};

/// Configuration for the filesystem uploader.
#[derive(Debug, Clone)]
pub struct FsUploaderConfig {
  /// Directory artifacts are written under.
  pub root: PathBuf,
  /// URL prefix the root directory is served at.
  pub public_base: String,
}

/// Filesystem-based uploader.
///
/// Each artifact is stored at `{root}/{flow_id}/{folder}/{uuid}.{ext}` and
/// reported at the same relative path under `public_base`. Parent
/// directories are created automatically.
pub struct FsUploader {
  config: FsUploaderConfig,
}

impl FsUploader {
  pub fn new(config: FsUploaderConfig) -> Self {
    Self { config }
  }

  fn key_for(&self, request: &UploadRequest, extension: &str) -> String {
    format!(
      "{}/{}/{}.{}",
      sanitize(&request.flow_id),
      sanitize(&request.folder),
      uuid::Uuid::new_v4(),
      extension
    )
  }
}

/// Keep path segments inside the root.
fn sanitize(segment: &str) -> String {
  let cleaned: String = segment
    .chars()
    .map(|c| match c {
      'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
      _ => '_',
    })
    .collect();
  if cleaned.is_empty() {
    "_".to_string()
  } else {
    cleaned
  }
}

#[async_trait]
impl Uploader for FsUploader {
  async fn upload(&self, request: UploadRequest) -> Result<UploadedArtifact, ArtifactError> {
    let uri = DataUri::parse(&request.base64);
    let bytes = uri.decode()?;
    let key = self.key_for(&request, extension_for(uri.mime));
    let path = self.config.root.join(&key);

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(&path).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;

    Ok(UploadedArtifact {
      url: format!("{}/{}", self.config.public_base.trim_end_matches('/'), key),
    })
  }

  fn is_hosted(&self, url: &str) -> bool {
    url
      .strip_prefix(self.config.public_base.trim_end_matches('/'))
      .is_some_and(|rest| rest.starts_with('/'))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_upload_writes_file_under_flow() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = FsUploader::new(FsUploaderConfig {
      root: dir.path().to_path_buf(),
      public_base: "https://cdn.example.com/".to_string(),
    });

    let uploaded = uploader
      .upload(UploadRequest {
        base64: "data:image/png;base64,aGVsbG8=".to_string(),
        flow_id: "flow-1".to_string(),
        folder: "images".to_string(),
      })
      .await
      .unwrap();

    let key = uploaded
      .url
      .strip_prefix("https://cdn.example.com/")
      .unwrap();
    assert!(key.starts_with("flow-1/images/"));
    assert!(key.ends_with(".png"));
    assert_eq!(std::fs::read(dir.path().join(key)).unwrap(), b"hello");
    assert!(uploader.is_hosted(&uploaded.url));
    assert!(!uploader.is_hosted("https://replicate.delivery/x.png"));
  }

  #[tokio::test]
  async fn test_upload_rejects_bad_payload() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = FsUploader::new(FsUploaderConfig {
      root: dir.path().to_path_buf(),
      public_base: "file://x".to_string(),
    });

    let result = uploader
      .upload(UploadRequest {
        base64: "not base64!".to_string(),
        flow_id: "f".to_string(),
        folder: "images".to_string(),
      })
      .await;
    assert!(matches!(result, Err(ArtifactError::Decode(_))));
  }

  #[test]
  fn test_sanitize_blocks_traversal() {
    assert_eq!(sanitize("../etc"), "___etc");
    assert_eq!(sanitize(""), "_");
  }
}
