use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use strata_core::Result;
use strata_store::{FieldPath, ResMap, Resource};
use tracing::debug;

use super::POD_SPEC_TRANSFORMER;
use crate::loader::Loader;
use crate::{parse_config, Configurable, Transformer};

const POD_TEMPLATE_KINDS: &[&str] = &["Deployment", "StatefulSet", "DaemonSet", "ReplicaSet", "Job"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpecArgs {
    /// Pod labels that must all be present with these values.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Fragment merged into the pod spec.
    #[serde(default)]
    pub spec: Map<String, Json>,
}

/// Merges a pod spec fragment into every Pod, and every workload's pod
/// template, whose pod labels match the selector. An empty selector matches
/// all pods.
#[derive(Debug, Default)]
pub struct PodSpecTransformer {
    args: PodSpecArgs,
}

/// Where a kind keeps its pod labels and pod spec.
fn pod_paths(kind: &str) -> Option<(FieldPath, FieldPath)> {
    if kind == "Pod" {
        return Some((FieldPath::keys(["metadata", "labels"]), FieldPath::keys(["spec"])));
    }
    POD_TEMPLATE_KINDS.contains(&kind).then(|| {
        (
            FieldPath::keys(["spec", "template", "metadata", "labels"]),
            FieldPath::keys(["spec", "template", "spec"]),
        )
    })
}

impl PodSpecTransformer {
    fn matches(&self, r: &Resource, labels: &FieldPath) -> bool {
        let have = labels.lookup(r.value()).and_then(Json::as_object);
        self.args.labels.iter().all(|(k, v)| {
            have.and_then(|l| l.get(k)).and_then(Json::as_str) == Some(v.as_str())
        })
    }
}

impl Configurable for PodSpecTransformer {
    fn configure(&mut self, _loader: Arc<dyn Loader>, config: &[u8]) -> Result<()> {
        self.args = parse_config(POD_SPEC_TRANSFORMER, config)?;
        Ok(())
    }
}

impl Transformer for PodSpecTransformer {
    fn transform(&mut self, resources: &mut ResMap) -> Result<()> {
        if self.args.spec.is_empty() {
            return Ok(());
        }
        let patch = Json::Object(self.args.spec.clone());
        for r in resources.iter_mut() {
            let Some((labels, spec)) = pod_paths(r.kind()) else { continue };
            if !self.matches(r, &labels) {
                continue;
            }
            r.merge_patch(&spec, &patch)?;
            debug!(id = %r.id(), "merged pod spec");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_args(labels: &[(&str, &str)], spec: Json) -> PodSpecTransformer {
        let labels = labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let spec = spec.as_object().cloned().unwrap_or_default();
        PodSpecTransformer { args: PodSpecArgs { labels, spec } }
    }

    #[test]
    fn merge_is_deep_rather_than_wholesale() {
        let mut m = ResMap::from_resources([Resource::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "p", "labels": { "env": "prod" } },
            "spec": { "nodeSelector": { "disk": "ssd" }, "containers": [{ "name": "c" }] }
        }))
        .unwrap()])
        .unwrap();
        with_args(&[("env", "prod")], json!({ "nodeSelector": { "zone": "a" } })).transform(&mut m).unwrap();
        let r = m.iter().next().unwrap();
        assert_eq!(r.get("spec.nodeSelector"), Some(&json!({ "disk": "ssd", "zone": "a" })));
        assert_eq!(r.get_str("spec.containers[0].name"), Some("c"));
    }

    #[test]
    fn empty_fragment_leaves_pods_untouched() {
        let before = json!({ "apiVersion": "v1", "kind": "Pod", "metadata": { "name": "p" } });
        let mut m = ResMap::from_resources([Resource::from_value(before.clone()).unwrap()]).unwrap();
        with_args(&[], json!({})).transform(&mut m).unwrap();
        assert_eq!(m.iter().next().unwrap().value(), &before);
    }

    #[test]
    fn other_kinds_are_ignored() {
        let before = json!({ "apiVersion": "v1", "kind": "Service", "metadata": { "name": "s" }, "spec": {} });
        let mut m = ResMap::from_resources([Resource::from_value(before.clone()).unwrap()]).unwrap();
        with_args(&[], json!({ "nodeSelector": { "zone": "a" } })).transform(&mut m).unwrap();
        assert_eq!(m.iter().next().unwrap().value(), &before);
    }
}
