//! Strata plugins: the generator/transformer contracts, the built-in
//! implementations, and the dispatch that resolves declarative plugin
//! references into a sequential pipeline.

#![forbid(unsafe_code)]

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strata_core::{Error, Result};
use strata_store::ResMap;

pub mod generators;
pub mod kv;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod transformers;

pub use loader::{FsLoader, Loader, MemLoader};
pub use pipeline::{Pipeline, StageState};
pub use registry::{Plugin, PluginRef, Registry, Resolver, BUILTIN_API_VERSION};

/// Accepts a plugin's declarative configuration.
pub trait Configurable {
    /// `config` is the plugin's own YAML document; `loader` resolves any
    /// files it names.
    fn configure(&mut self, loader: Arc<dyn Loader>, config: &[u8]) -> Result<()>;
}

/// Produces new resources. Never touches existing ones.
pub trait Generator: Configurable {
    fn generate(&mut self) -> Result<ResMap>;

    /// How generated resources are folded into the collection.
    fn behavior(&self) -> Behavior { Behavior::Create }
}

/// Mutates a collection in place.
pub trait Transformer: Configurable {
    fn transform(&mut self, resources: &mut ResMap) -> Result<()>;
}

/// What to do when a generated resource meets the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Append; an existing resource with a different body is a conflict.
    #[default]
    Create,
    /// Swap out the existing resource of the same type/name/namespace.
    Replace,
    /// Merge data and labels/annotations into the existing resource.
    Merge,
}

/// Deserialize a plugin's configuration document, mapping failures to
/// [`Error::MalformedArguments`] for `kind`.
pub fn parse_config<T: DeserializeOwned>(kind: &str, config: &[u8]) -> Result<T> {
    serde_yaml::from_slice(config).map_err(|e| Error::malformed(kind, e))
}

/// `metadata` block shared by plugin configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}
