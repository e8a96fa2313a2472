//! Resolution of declarative plugin references to plugin instances.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use strata_core::{Error, Result};
use tracing::debug;

use crate::generators::{ConfigMapGenerator, SecretGenerator, CONFIG_MAP_GENERATOR, SECRET_GENERATOR};
use crate::transformers::{
    LabelTransformer, NamespaceTransformer, PodSpecTransformer, PrefixSuffixTransformer, LABEL_TRANSFORMER,
    NAMESPACE_TRANSFORMER, POD_SPEC_TRANSFORMER, PREFIX_SUFFIX_TRANSFORMER,
};
use crate::{Generator, Transformer};

/// `apiVersion` under which the built-in plugins are registered.
pub const BUILTIN_API_VERSION: &str = "builtin";

/// The `apiVersion`/`kind` pair naming a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRef {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

impl PluginRef {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { api_version: api_version.into(), kind: kind.into() }
    }

    /// Read the reference from a plugin configuration document.
    pub fn from_document(doc: &Json) -> Result<Self> {
        let field = |name: &str| doc.get(name).and_then(Json::as_str).unwrap_or_default().to_string();
        let r = Self { api_version: field("apiVersion"), kind: field("kind") };
        if r.kind.is_empty() {
            return Err(Error::malformed("<unknown>", format!("plugin configuration has no kind: {doc}")));
        }
        Ok(r)
    }
}

impl fmt::Display for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// An unconfigured plugin instance.
pub enum Plugin {
    Generator(Box<dyn Generator>),
    Transformer(Box<dyn Transformer>),
}

impl Plugin {
    pub fn is_generator(&self) -> bool { matches!(self, Plugin::Generator(_)) }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plugin::Generator(_) => f.write_str("Plugin::Generator"),
            Plugin::Transformer(_) => f.write_str("Plugin::Transformer"),
        }
    }
}

/// Fallback strategy for references the registry has no factory for, e.g.
/// plugins compiled into the embedding program.
pub trait Resolver: Send + Sync {
    fn resolve(&self, plugin: &PluginRef) -> Option<Plugin>;
}

type Factory = Box<dyn Fn() -> Plugin + Send + Sync>;

/// Maps `(apiVersion, kind)` to plugin factories, consulting the fallback
/// resolvers in order when no factory matches.
#[derive(Default)]
pub struct Registry {
    factories: FxHashMap<PluginRef, Factory>,
    resolvers: Vec<Box<dyn Resolver>>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    /// Registry holding every built-in plugin under [`BUILTIN_API_VERSION`].
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        reg.register_generator::<ConfigMapGenerator>(BUILTIN_API_VERSION, CONFIG_MAP_GENERATOR)
            .register_generator::<SecretGenerator>(BUILTIN_API_VERSION, SECRET_GENERATOR)
            .register_transformer::<PrefixSuffixTransformer>(BUILTIN_API_VERSION, PREFIX_SUFFIX_TRANSFORMER)
            .register_transformer::<NamespaceTransformer>(BUILTIN_API_VERSION, NAMESPACE_TRANSFORMER)
            .register_transformer::<LabelTransformer>(BUILTIN_API_VERSION, LABEL_TRANSFORMER)
            .register_transformer::<PodSpecTransformer>(BUILTIN_API_VERSION, POD_SPEC_TRANSFORMER);
        reg
    }

    pub fn register(
        &mut self,
        api_version: &str,
        kind: &str,
        factory: impl Fn() -> Plugin + Send + Sync + 'static,
    ) -> &mut Self {
        self.factories.insert(PluginRef::new(api_version, kind), Box::new(factory));
        self
    }

    pub fn register_generator<G>(&mut self, api_version: &str, kind: &str) -> &mut Self
    where
        G: Generator + Default + 'static,
    {
        self.register(api_version, kind, || Plugin::Generator(Box::<G>::default()))
    }

    pub fn register_transformer<T>(&mut self, api_version: &str, kind: &str) -> &mut Self
    where
        T: Transformer + Default + 'static,
    {
        self.register(api_version, kind, || Plugin::Transformer(Box::<T>::default()))
    }

    pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn contains(&self, plugin: &PluginRef) -> bool { self.factories.contains_key(plugin) }

    /// Fresh instance for `plugin`, or [`Error::ResolutionFailure`].
    pub fn resolve(&self, plugin: &PluginRef) -> Result<Plugin> {
        if let Some(factory) = self.factories.get(plugin) {
            return Ok(factory());
        }
        if let Some(p) = self.resolvers.iter().find_map(|r| r.resolve(plugin)) {
            debug!(plugin = %plugin, "resolved by fallback resolver");
            return Ok(p);
        }
        Err(Error::ResolutionFailure { api_version: plugin.api_version.clone(), kind: plugin.kind.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct OnlyPodSpec;

    impl Resolver for OnlyPodSpec {
        fn resolve(&self, plugin: &PluginRef) -> Option<Plugin> {
            (plugin.kind == POD_SPEC_TRANSFORMER).then(|| Plugin::Transformer(Box::<PodSpecTransformer>::default()))
        }
    }

    #[test]
    fn builtins_resolve_by_api_version_and_kind() {
        let reg = Registry::builtin();
        assert!(reg.resolve(&PluginRef::new("builtin", "SecretGenerator")).unwrap().is_generator());
        assert!(!reg.resolve(&PluginRef::new("builtin", "NamespaceTransformer")).unwrap().is_generator());
        let err = reg.resolve(&PluginRef::new("v1", "SecretGenerator")).unwrap_err();
        assert!(err.to_string().contains("'v1'") && err.to_string().contains("'SecretGenerator'"), "err={err}");
    }

    #[test]
    fn fallback_resolver_is_consulted_last() {
        let reg = Registry::new().with_resolver(OnlyPodSpec);
        assert!(reg.resolve(&PluginRef::new("someteam.example.com/v1", "PodSpecTransformer")).is_ok());
        assert!(reg.resolve(&PluginRef::new("someteam.example.com/v1", "Other")).is_err());
    }

    #[test]
    fn plugin_ref_reads_document_header() {
        let r = PluginRef::from_document(&json!({ "apiVersion": "builtin", "kind": "LabelTransformer" })).unwrap();
        assert_eq!(r.to_string(), "builtin/LabelTransformer");
        assert!(PluginRef::from_document(&json!({ "apiVersion": "builtin" })).is_err());
    }
}
