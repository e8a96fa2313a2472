//! Sequential generator/transformer pipeline.
//!
//! Every stage is resolved and configured before anything runs, so a bad
//! reference or bad arguments never leave a half-processed collection. Once
//! running, the first failing stage aborts the run; effects of the stages
//! before it are kept.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde_json::Value as Json;
use strata_core::{Error, ResId, Result};
use strata_store::{decode_documents, FieldPath, ResMap, Resource};
use tracing::{debug, info, warn};

use crate::loader::Loader;
use crate::registry::{Plugin, PluginRef, Registry};
use crate::{Behavior, Generator, Transformer};

/// Lifecycle of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Unconfigured,
    Configured,
    Applied,
    Failed,
}

struct Stage {
    plugin_ref: PluginRef,
    plugin: Plugin,
    state: StageState,
}

impl Stage {
    fn configure(&mut self, loader: &Arc<dyn Loader>, doc: &Json) -> Result<()> {
        let config = serde_yaml::to_string(doc).map_err(|e| Error::malformed(&self.plugin_ref.kind, e))?;
        match &mut self.plugin {
            Plugin::Generator(g) => g.configure(loader.clone(), config.as_bytes())?,
            Plugin::Transformer(t) => t.configure(loader.clone(), config.as_bytes())?,
        }
        self.state = StageState::Configured;
        Ok(())
    }
}

/// Ordered generators followed by ordered transformers.
#[derive(Default)]
pub struct Pipeline {
    generators: Vec<Stage>,
    transformers: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self { Self::default() }

    /// Add an already configured generator.
    pub fn push_generator(&mut self, plugin_ref: PluginRef, g: Box<dyn Generator>) -> &mut Self {
        self.generators.push(Stage { plugin_ref, plugin: Plugin::Generator(g), state: StageState::Configured });
        self
    }

    /// Add an already configured transformer.
    pub fn push_transformer(&mut self, plugin_ref: PluginRef, t: Box<dyn Transformer>) -> &mut Self {
        self.transformers.push(Stage { plugin_ref, plugin: Plugin::Transformer(t), state: StageState::Configured });
        self
    }

    /// Resolve every configuration document, then configure each plugin with
    /// its own document. Resolution of all stages happens before any
    /// configuration.
    pub fn from_documents(
        registry: &Registry,
        loader: Arc<dyn Loader>,
        generators: &[Json],
        transformers: &[Json],
    ) -> Result<Self> {
        let mut pipeline = Self::new();
        for (docs, want_generator) in [(generators, true), (transformers, false)] {
            for doc in docs {
                let plugin_ref = PluginRef::from_document(doc)?;
                let plugin = registry.resolve(&plugin_ref)?;
                if plugin.is_generator() != want_generator {
                    let expected = if want_generator { "generator" } else { "transformer" };
                    return Err(Error::malformed(&plugin_ref.kind, format!("{plugin_ref} is not a {expected}")));
                }
                let stage = Stage { plugin_ref, plugin, state: StageState::Unconfigured };
                if want_generator {
                    pipeline.generators.push(stage);
                } else {
                    pipeline.transformers.push(stage);
                }
            }
        }
        let stages = pipeline.generators.iter_mut().zip(generators).chain(pipeline.transformers.iter_mut().zip(transformers));
        for (stage, doc) in stages {
            stage.configure(&loader, doc)?;
            debug!(plugin = %stage.plugin_ref, "configured");
        }
        Ok(pipeline)
    }

    /// [`Pipeline::from_documents`] over two YAML streams.
    pub fn from_yaml(registry: &Registry, loader: Arc<dyn Loader>, generators: &[u8], transformers: &[u8]) -> Result<Self> {
        Self::from_documents(registry, loader, &decode_documents(generators)?, &decode_documents(transformers)?)
    }

    pub fn len(&self) -> usize { self.generators.len() + self.transformers.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Every stage in execution order with its current state.
    pub fn states(&self) -> Vec<(PluginRef, StageState)> {
        self.generators
            .iter()
            .chain(&self.transformers)
            .map(|s| (s.plugin_ref.clone(), s.state))
            .collect()
    }

    /// Run every generator, folding its output into `resources` according to
    /// its behavior, then every transformer, all in declared order.
    #[tracing::instrument(skip_all, fields(stages = self.len()))]
    pub fn run(&mut self, resources: &mut ResMap) -> Result<()> {
        if let Some(s) = self.generators.iter().chain(&self.transformers).find(|s| s.state != StageState::Configured) {
            return Err(Error::malformed(&s.plugin_ref.kind, format!("stage {} is {:?}, not configured", s.plugin_ref, s.state)));
        }
        let t0 = Instant::now();
        for stage in self.generators.iter_mut().chain(self.transformers.iter_mut()) {
            let res = run_stage(stage, resources);
            stage.state = if res.is_ok() { StageState::Applied } else { StageState::Failed };
            if let Err(e) = res {
                counter!("strata_stage_failures", 1u64);
                warn!(plugin = %stage.plugin_ref, error = %e, "stage failed; aborting pipeline");
                return Err(e);
            }
        }
        histogram!("strata_pipeline_ms", t0.elapsed().as_secs_f64() * 1000.0);
        info!(resources = resources.len(), "pipeline complete");
        Ok(())
    }
}

fn run_stage(stage: &mut Stage, resources: &mut ResMap) -> Result<()> {
    match &mut stage.plugin {
        Plugin::Generator(g) => {
            let generated = g.generate()?;
            counter!("strata_generated_resources", generated.len() as u64);
            debug!(plugin = %stage.plugin_ref, count = generated.len(), "generated");
            absorb(resources, generated, g.behavior())
        }
        Plugin::Transformer(t) => {
            t.transform(resources)?;
            counter!("strata_transformers_applied", 1u64);
            debug!(plugin = %stage.plugin_ref, "transformed");
            Ok(())
        }
    }
}

/// Fields a `merge` generator contributes to the resource it merges into.
const MERGED_FIELDS: &[&[&str]] = &[&["data"], &["binaryData"], &["metadata", "labels"], &["metadata", "annotations"]];

fn existing_match(resources: &ResMap, id: &ResId) -> Result<ResId> {
    resources
        .get_matching_ids(|have| have.namespace_qualified_equals(id))
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound(id.to_string()))
}

/// Fold generated resources into the collection.
pub fn absorb(resources: &mut ResMap, generated: ResMap, behavior: Behavior) -> Result<()> {
    match behavior {
        Behavior::Create => resources.append_all(generated),
        Behavior::Replace => {
            for r in generated {
                let existing = existing_match(resources, r.id())?;
                resources.replace(&existing, r)?;
            }
            Ok(())
        }
        Behavior::Merge => {
            for r in generated {
                let existing = existing_match(resources, r.id())?;
                let target = resources.get_by_id_mut(&existing).ok_or_else(|| Error::NotFound(existing.to_string()))?;
                merge_generated(target, &r)?;
            }
            Ok(())
        }
    }
}

fn merge_generated(target: &mut Resource, generated: &Resource) -> Result<()> {
    for keys in MERGED_FIELDS {
        let path = FieldPath::keys(keys.iter().copied());
        if let Some(patch) = path.lookup(generated.value()) {
            target.merge_patch(&path, patch)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cm(name: &str, data: Json) -> Resource {
        Resource::from_value(json!({ "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": name }, "data": data }))
            .unwrap()
    }

    #[test]
    fn merge_keeps_existing_keys() {
        let mut m = ResMap::from_resources([cm("a", json!({ "x": "1", "y": "2" }))]).unwrap();
        let gen = ResMap::from_resources([cm("a", json!({ "y": "3", "z": "4" }))]).unwrap();
        absorb(&mut m, gen, Behavior::Merge).unwrap();
        assert_eq!(m.iter().next().unwrap().get("data"), Some(&json!({ "x": "1", "y": "3", "z": "4" })));
    }

    #[test]
    fn replace_keeps_position() {
        let mut m = ResMap::from_resources([cm("a", json!({})), cm("b", json!({ "k": "old" }))]).unwrap();
        let gen = ResMap::from_resources([cm("a", json!({ "k": "new" }))]).unwrap();
        absorb(&mut m, gen, Behavior::Replace).unwrap();
        let names: Vec<_> = m.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(m.iter().next().unwrap().get_str("data.k"), Some("new"));
    }

    #[test]
    fn replace_and_merge_need_a_target() {
        for behavior in [Behavior::Replace, Behavior::Merge] {
            let mut m = ResMap::new();
            let gen = ResMap::from_resources([cm("a", json!({}))]).unwrap();
            assert!(matches!(absorb(&mut m, gen, behavior), Err(Error::NotFound(_))));
        }
    }

    #[test]
    fn create_collision_is_a_conflict() {
        let mut m = ResMap::from_resources([cm("a", json!({ "k": "1" }))]).unwrap();
        let gen = ResMap::from_resources([cm("a", json!({ "k": "2" }))]).unwrap();
        assert!(matches!(absorb(&mut m, gen, Behavior::Create), Err(Error::Conflict { .. })));
    }
}
