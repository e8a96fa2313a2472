use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_core::{Error, Gvk, Result};
use strata_store::ResMap;
use tracing::debug;

use super::NAMESPACE_TRANSFORMER;
use crate::loader::Loader;
use crate::{parse_config, Configurable, Transformer};

const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "ClusterIssuer",
    "ClusterRole",
    "ClusterRoleBinding",
    "CSIDriver",
    "CSINode",
    "CustomResourceDefinition",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PriorityClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
    "VolumeAttachment",
];

/// Kinds that never carry `metadata.namespace`.
pub fn is_cluster_scoped(gvk: &Gvk) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&gvk.kind.as_str())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceArgs {
    #[serde(default)]
    pub namespace: String,
}

/// Moves every namespaced resource into one namespace.
#[derive(Debug, Default)]
pub struct NamespaceTransformer {
    args: NamespaceArgs,
}

impl NamespaceTransformer {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { args: NamespaceArgs { namespace: namespace.into() } }
    }
}

impl Configurable for NamespaceTransformer {
    fn configure(&mut self, _loader: Arc<dyn Loader>, config: &[u8]) -> Result<()> {
        let args: NamespaceArgs = parse_config(NAMESPACE_TRANSFORMER, config)?;
        if args.namespace.is_empty() {
            return Err(Error::malformed(NAMESPACE_TRANSFORMER, "namespace is required"));
        }
        self.args = args;
        Ok(())
    }
}

impl Transformer for NamespaceTransformer {
    fn transform(&mut self, resources: &mut ResMap) -> Result<()> {
        let ns = self.args.namespace.as_str();
        let targets = resources.get_matching_ids(|id| !is_cluster_scoped(id.gvk()) && id.namespace() != ns);
        for id in targets {
            let r = resources.get_by_id_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
            r.set_namespace(ns)?;
            debug!(id = %id, namespace = ns, "moved");
            resources.rekey(&id, id.with_namespace(ns))?;
        }
        Ok(())
    }
}
