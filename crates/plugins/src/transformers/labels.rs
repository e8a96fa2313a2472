use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use strata_core::Result;
use strata_store::{FieldPath, ResMap};

use super::LABEL_TRANSFORMER;
use crate::loader::Loader;
use crate::{parse_config, Configurable, Transformer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelArgs {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Adds labels to every resource, overwriting existing values.
#[derive(Debug, Default)]
pub struct LabelTransformer {
    args: LabelArgs,
}

impl Configurable for LabelTransformer {
    fn configure(&mut self, _loader: Arc<dyn Loader>, config: &[u8]) -> Result<()> {
        self.args = parse_config(LABEL_TRANSFORMER, config)?;
        Ok(())
    }
}

impl Transformer for LabelTransformer {
    fn transform(&mut self, resources: &mut ResMap) -> Result<()> {
        if self.args.labels.is_empty() {
            return Ok(());
        }
        let path = FieldPath::keys(["metadata", "labels"]);
        for r in resources.iter_mut() {
            let labels = r.map_mut(&path)?;
            for (k, v) in &self.args.labels {
                labels.insert(k.clone(), Json::String(v.clone()));
            }
        }
        Ok(())
    }
}
