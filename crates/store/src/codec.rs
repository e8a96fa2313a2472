//! Multi-document YAML decoding into resources, and emission back to YAML.

use serde::Deserialize;
use serde_json::Value as Json;
use strata_core::{Error, Result};
use tracing::debug;

use crate::{resmap::ResMap, resource::Resource};

const DEFAULT_MAX_BYTES: usize = 1 << 20;
const DEFAULT_MAX_NODES: usize = 100_000;

/// Bounds on one input stream and on each document in it.
#[derive(Debug, Clone, Copy)]
struct Limits {
    max_bytes: usize,
    max_nodes: usize,
}

fn env_usize(var: &str, default: usize) -> usize {
    std::env::var(var).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Limits {
    /// `STRATA_MAX_YAML_BYTES` and `STRATA_MAX_YAML_NODES`.
    fn from_env() -> Self {
        Self {
            max_bytes: env_usize("STRATA_MAX_YAML_BYTES", DEFAULT_MAX_BYTES),
            max_nodes: env_usize("STRATA_MAX_YAML_NODES", DEFAULT_MAX_NODES),
        }
    }
}

/// Values in `doc`, counting every map, sequence and scalar. Stops at `cap`.
fn count_nodes(doc: &Json, cap: usize) -> usize {
    let mut count = 0;
    let mut pending = vec![doc];
    while let Some(v) = pending.pop() {
        count += 1;
        if count >= cap {
            break;
        }
        match v {
            Json::Object(map) => pending.extend(map.values()),
            Json::Array(items) => pending.extend(items),
            _ => {}
        }
    }
    count
}

/// Decode a `---`-separated YAML stream. Empty and comment-only documents
/// are dropped; `kind: List` documents are expanded into their `items`.
pub fn decode_documents(bytes: &[u8]) -> Result<Vec<Json>> {
    let limits = Limits::from_env();
    if bytes.len() > limits.max_bytes {
        return Err(Error::MalformedDocument(format!("input is {} bytes, limit is {}", bytes.len(), limits.max_bytes)));
    }
    let mut out = Vec::new();
    for (i, doc) in serde_yaml::Deserializer::from_slice(bytes).enumerate() {
        let val = serde_yaml::Value::deserialize(doc)
            .map_err(|e| Error::MalformedDocument(format!("document {i}: {e}")))?;
        if val.is_null() {
            debug!(document = i, "skipping empty document");
            continue;
        }
        let json = serde_json::to_value(val)
            .map_err(|e| Error::MalformedDocument(format!("document {i}: {e}")))?;
        if count_nodes(&json, limits.max_nodes) >= limits.max_nodes {
            return Err(Error::MalformedDocument(format!("document {i} reaches the limit of {} values", limits.max_nodes)));
        }
        push_expanding_lists(json, &mut out);
    }
    Ok(out)
}

fn push_expanding_lists(json: Json, out: &mut Vec<Json>) {
    let is_list = json.get("kind").and_then(Json::as_str) == Some("List");
    match json {
        Json::Object(mut map) if is_list => {
            if let Some(Json::Array(items)) = map.remove("items") {
                for item in items {
                    push_expanding_lists(item, out);
                }
            }
        }
        other => out.push(other),
    }
}

pub fn resources_from_bytes(bytes: &[u8]) -> Result<Vec<Resource>> {
    decode_documents(bytes)?.into_iter().map(Resource::from_value).collect()
}

impl ResMap {
    /// Decode a YAML stream and append its resources in document order.
    pub fn from_yaml_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_resources(resources_from_bytes(bytes)?)
    }

    /// Emit every resource as YAML, separated by `---`.
    pub fn to_yaml(&self) -> Result<String> {
        let docs = self
            .iter()
            .map(|r| serde_yaml::to_string(r.value()).map_err(|e| Error::MalformedDocument(e.to_string())))
            .collect::<Result<Vec<_>>>()?;
        Ok(docs.join("---\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comment_only_documents_are_dropped() {
        let docs = decode_documents(b"a: 1\n---\n# just a comment\n---\nb: 2\n").unwrap();
        assert_eq!(docs, vec![json!({ "a": 1 }), json!({ "b": 2 })]);
    }

    #[test]
    fn lists_are_expanded() {
        let y = "apiVersion: v1\nkind: List\nitems:\n- kind: ConfigMap\n  metadata:\n    name: a\n- kind: ConfigMap\n  metadata:\n    name: b\n";
        let docs = decode_documents(y.as_bytes()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["metadata"]["name"], json!("b"));
    }

    #[test]
    fn node_count_includes_containers_and_scalars() {
        let v = json!({ "a": [1, 2, 3], "b": { "c": true } });
        assert_eq!(count_nodes(&v, 100), 7);
        assert_eq!(count_nodes(&v, 5), 5);
        assert_eq!(count_nodes(&json!("x"), 100), 1);
    }

    #[test]
    fn non_map_document_is_malformed() {
        assert!(matches!(resources_from_bytes(b"- 1\n- 2\n"), Err(Error::MalformedDocument(_))));
        assert!(resources_from_bytes(b"a: [unclosed\n").is_err());
    }

    #[test]
    fn to_yaml_separates_documents() {
        let m = ResMap::from_yaml_bytes(b"kind: A\nmetadata:\n  name: a\n---\nkind: B\nmetadata:\n  name: b\n").unwrap();
        let out = m.to_yaml().unwrap();
        assert_eq!(out, "kind: A\nmetadata:\n  name: a\n---\nkind: B\nmetadata:\n  name: b\n");
    }
}
