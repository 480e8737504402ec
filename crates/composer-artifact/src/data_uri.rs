//! `data:` URI handling.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::ArtifactError;

/// A parsed `data:<mime>;base64,<payload>` URI, or a bare base64 payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUri<'a> {
  pub mime: Option<&'a str>,
  pub payload: &'a str,
}

impl<'a> DataUri<'a> {
  /// Whether a string is an embedded `data:` payload.
  pub fn is_data_uri(value: &str) -> bool {
    value.starts_with("data:")
  }

  /// Split off the `data:` header when present.
  pub fn parse(value: &'a str) -> Self {
    value
      .strip_prefix("data:")
      .and_then(|rest| rest.split_once(','))
      .map(|(header, payload)| DataUri {
        mime: header
          .strip_suffix(";base64")
          .filter(|m| !m.is_empty()),
        payload,
      })
      .unwrap_or(DataUri {
        mime: None,
        payload: value,
      })
  }

  pub fn decode(&self) -> Result<Vec<u8>, ArtifactError> {
    Ok(STANDARD.decode(self.payload.trim())?)
  }
}

/// Encode bytes as a `data:` URI.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
  format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// File extension for a MIME type.
pub fn extension_for(mime: Option<&str>) -> &'static str {
  match mime.map(|m| m.split(';').next().unwrap_or(m).trim()) {
    Some("image/png") => "png",
    Some("image/jpeg") | Some("image/jpg") => "jpg",
    Some("image/webp") => "webp",
    Some("image/gif") => "gif",
    Some("video/mp4") => "mp4",
    Some("video/webm") => "webm",
    Some("audio/mpeg") => "mp3",
    Some("audio/wav") | Some("audio/x-wav") => "wav",
    Some("audio/ogg") => "ogg",
    _ => "bin",
  }
}
