//! Example output of a successful run.
//!
//! The last result node that produced something is the run's example. Its
//! media kind comes from the node feeding it. Embedded payloads are uploaded;
//! URLs hosted elsewhere are downloaded and uploaded again so the flow owns
//! its copy. Nothing here can fail the run.

use std::collections::HashMap;

use composer_artifact::{ArtifactError, DataUri, UploadRequest, Uploader, encode_data_uri};
use composer_flow::{Graph, MediaKind, NodeKindTag};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::capabilities::Capabilities;
use crate::sinks::ExampleOutput;
use crate::working::FlowSnapshot;

/// Find, host, and record the example output of a run.
pub(crate) async fn record_example(
  caps: &Capabilities,
  folder_override: Option<&str>,
  flow_id: &str,
  snapshot: &FlowSnapshot,
  graph: &Graph,
  outputs: &HashMap<String, Value>,
) -> Option<ExampleOutput> {
  let Some(uploader) = caps.uploader.as_deref() else {
    debug!(flow_id = %flow_id, "no uploader configured, skipping example");
    return None;
  };

  let (node_id, media_kind, value) = pick_example(snapshot, graph, outputs)?;
  let folder = folder_override.unwrap_or(media_kind.folder());

  let url = match host(caps, uploader, flow_id, folder, media_kind, value).await {
    Ok(url) => url,
    Err(e) => {
      warn!(flow_id = %flow_id, node_id = %node_id, error = %e, "failed to host example output");
      return None;
    }
  };

  let example = ExampleOutput {
    node_id,
    media_kind,
    url,
  };

  if let Err(e) = caps.examples.record_example(flow_id, &example).await {
    warn!(flow_id = %flow_id, error = %e, "failed to record example output");
    return None;
  }

  info!(flow_id = %flow_id, url = %example.url, "example_recorded");
  Some(example)
}

/// The last result node with a string output, and the media kind of its
/// source.
fn pick_example<'a>(
  snapshot: &FlowSnapshot,
  graph: &Graph,
  outputs: &'a HashMap<String, Value>,
) -> Option<(String, MediaKind, &'a str)> {
  let result = snapshot
    .nodes()
    .iter()
    .rev()
    .find(|n| n.tag() == NodeKindTag::Result && outputs.contains_key(&n.id))?;

  let source = graph
    .incoming(&result.id)
    .first()
    .and_then(|e| snapshot.node(&e.source))?;

  let Some(media_kind) = source.kind.media_kind() else {
    debug!(node_id = %result.id, source = %source.id, "result is not media");
    return None;
  };

  let value = match outputs.get(&result.id)? {
    Value::String(s) => s.as_str(),
    Value::Array(items) => items.first()?.as_str()?,
    _ => return None,
  };

  Some((result.id.clone(), media_kind, value))
}

async fn host(
  caps: &Capabilities,
  uploader: &dyn Uploader,
  flow_id: &str,
  folder: &str,
  media_kind: MediaKind,
  value: &str,
) -> Result<String, ArtifactError> {
  let base64 = if DataUri::is_data_uri(value) {
    value.to_string()
  } else if is_remote(value) && !uploader.is_hosted(value) {
    let (bytes, content_type) = caps.fetcher.fetch(value).await?;
    let mime = content_type.unwrap_or_else(|| default_mime(media_kind).to_string());
    encode_data_uri(&mime, &bytes)
  } else {
    return Ok(value.to_string());
  };

  let uploaded = uploader
    .upload(UploadRequest {
      base64,
      flow_id: flow_id.to_string(),
      folder: folder.to_string(),
    })
    .await?;
  Ok(uploaded.url)
}

fn is_remote(value: &str) -> bool {
  value.starts_with("https://") || value.starts_with("http://")
}

fn default_mime(media_kind: MediaKind) -> &'static str {
  match media_kind {
    MediaKind::Image => "image/png",
    MediaKind::Video => "video/mp4",
    MediaKind::Audio => "audio/mpeg",
  }
}
