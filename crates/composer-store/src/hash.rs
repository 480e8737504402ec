//! Deterministic hashing of run inputs.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Serialize a value with object keys sorted at every depth, so equal inputs
/// always produce the same text regardless of insertion order.
pub fn canonical_json(value: &Value) -> String {
  sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(&String, &Value)> = map.iter().collect();
      entries.sort_by(|a, b| a.0.cmp(b.0));
      Value::Object(
        entries
          .into_iter()
          .map(|(k, v)| (k.clone(), sorted(v)))
          .collect(),
      )
    }
    Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
    other => other.clone(),
  }
}

/// Cache key for a run: `sha256:` followed by the hex digest of the canonical
/// JSON of the inputs.
pub fn input_hash(inputs: &Map<String, Value>) -> String {
  let canonical = canonical_json(&Value::Object(inputs.clone()));
  let digest = Sha256::digest(canonical.as_bytes());
  format!("sha256:{:x}", digest)
}
