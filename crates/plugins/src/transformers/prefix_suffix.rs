use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_core::{Error, Result};
use strata_store::ResMap;
use tracing::debug;

use super::PREFIX_SUFFIX_TRANSFORMER;
use crate::loader::Loader;
use crate::{parse_config, Configurable, Transformer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixSuffixArgs {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Kinds whose names are left alone.
    #[serde(default)]
    pub skip_kinds: Vec<String>,
}

/// Renames every resource to `prefix + name + suffix` and records the layer
/// on its id, so later lookups by base name still work.
#[derive(Debug, Default)]
pub struct PrefixSuffixTransformer {
    args: PrefixSuffixArgs,
}

impl PrefixSuffixTransformer {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self { args: PrefixSuffixArgs { prefix: prefix.into(), suffix: suffix.into(), skip_kinds: Vec::new() } }
    }
}

impl Configurable for PrefixSuffixTransformer {
    fn configure(&mut self, _loader: Arc<dyn Loader>, config: &[u8]) -> Result<()> {
        self.args = parse_config(PREFIX_SUFFIX_TRANSFORMER, config)?;
        Ok(())
    }
}

impl Transformer for PrefixSuffixTransformer {
    fn transform(&mut self, resources: &mut ResMap) -> Result<()> {
        let PrefixSuffixArgs { prefix, suffix, skip_kinds } = &self.args;
        if prefix.is_empty() && suffix.is_empty() {
            return Ok(());
        }
        let targets = resources.get_matching_ids(|id| !skip_kinds.iter().any(|k| k == &id.gvk().kind));
        for id in targets {
            let r = resources.get_by_id_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
            let mangled = format!("{prefix}{}{suffix}", r.name());
            r.set_name(&mangled)?;
            debug!(id = %id, name = %mangled, "renamed");
            resources.rekey(&id, id.with_added_prefix_suffix(prefix, suffix))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_store::Resource;

    #[test]
    fn layers_accumulate_on_the_id() {
        let mut m = ResMap::from_resources([
            Resource::from_value(json!({ "apiVersion": "v1", "kind": "Service", "metadata": { "name": "web" } })).unwrap(),
            Resource::from_value(json!({ "apiVersion": "v1", "kind": "Namespace", "metadata": { "name": "prod" } })).unwrap(),
        ])
        .unwrap();
        let mut inner = PrefixSuffixTransformer::new("a-", "");
        inner.args.skip_kinds = vec!["Namespace".into()];
        inner.transform(&mut m).unwrap();
        let mut outer = PrefixSuffixTransformer::new("b-", "-z");
        outer.args.skip_kinds = vec!["Namespace".into()];
        outer.transform(&mut m).unwrap();

        let svc = m.iter().next().unwrap();
        assert_eq!(svc.name(), "b-a-web-z");
        assert_eq!(svc.id().name(), "web");
        assert_eq!(svc.id().prefix(), "b-:a-");
        assert_eq!(svc.id().suffix(), "-z");
        assert!(!svc.is_id_stale());
        assert_eq!(m.iter().nth(1).unwrap().name(), "prod");
    }
}
