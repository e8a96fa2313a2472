//! Built-in ConfigMap and Secret generators.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use strata_core::{Error, Result};
use strata_store::{ResMap, Resource};
use tracing::debug;

use crate::kv::{load_pairs, DataSources, KvPair};
use crate::loader::Loader;
use crate::{parse_config, Behavior, Configurable, Generator, ObjectMeta};

pub const CONFIG_MAP_GENERATOR: &str = "ConfigMapGenerator";
pub const SECRET_GENERATOR: &str = "SecretGenerator";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptions {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Arguments shared by the key/value generators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorArgs {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(flatten)]
    pub sources: DataSources,
    #[serde(default)]
    pub options: GeneratorOptions,
}

impl GeneratorArgs {
    fn validate(&self, kind: &str) -> Result<()> {
        if self.metadata.name.is_empty() {
            return Err(Error::malformed(kind, "metadata.name is required"));
        }
        Ok(())
    }

    /// `apiVersion`/`kind`/`metadata` of the generated object.
    fn skeleton(&self, kind: &str) -> Map<String, Json> {
        let mut meta = Map::new();
        meta.insert("name".into(), json!(self.metadata.name));
        if !self.metadata.namespace.is_empty() {
            meta.insert("namespace".into(), json!(self.metadata.namespace));
        }
        if !self.options.labels.is_empty() {
            meta.insert("labels".into(), json!(self.options.labels));
        }
        if !self.options.annotations.is_empty() {
            meta.insert("annotations".into(), json!(self.options.annotations));
        }
        let mut obj = Map::new();
        obj.insert("apiVersion".into(), json!("v1"));
        obj.insert("kind".into(), json!(kind));
        obj.insert("metadata".into(), Json::Object(meta));
        obj
    }
}

fn configured_loader<'a>(loader: &'a Option<Arc<dyn Loader>>, kind: &str) -> Result<&'a dyn Loader> {
    loader.as_deref().ok_or_else(|| Error::malformed(kind, "generate called before configure"))
}

fn single(kind: &str, obj: Map<String, Json>) -> Result<ResMap> {
    let r = Resource::from_map(obj)?;
    debug!(kind, id = %r.id(), "generated resource");
    ResMap::from_resources([r])
}

/// Generates one ConfigMap. UTF-8 values go to `data`; anything else is
/// base64-encoded into `binaryData`.
#[derive(Default)]
pub struct ConfigMapGenerator {
    args: GeneratorArgs,
    loader: Option<Arc<dyn Loader>>,
}

impl Configurable for ConfigMapGenerator {
    fn configure(&mut self, loader: Arc<dyn Loader>, config: &[u8]) -> Result<()> {
        let args: GeneratorArgs = parse_config(CONFIG_MAP_GENERATOR, config)?;
        args.validate(CONFIG_MAP_GENERATOR)?;
        self.args = args;
        self.loader = Some(loader);
        Ok(())
    }
}

impl Generator for ConfigMapGenerator {
    fn generate(&mut self) -> Result<ResMap> {
        let loader = configured_loader(&self.loader, CONFIG_MAP_GENERATOR)?;
        let pairs = load_pairs(loader, CONFIG_MAP_GENERATOR, &self.args.sources)?;
        let mut data = Map::new();
        let mut binary = Map::new();
        for KvPair { key, value } in pairs {
            match String::from_utf8(value) {
                Ok(text) => {
                    data.insert(key, Json::String(text));
                }
                Err(e) => {
                    binary.insert(key, Json::String(STANDARD.encode(e.into_bytes())));
                }
            }
        }
        let mut obj = self.args.skeleton("ConfigMap");
        if !data.is_empty() {
            obj.insert("data".into(), Json::Object(data));
        }
        if !binary.is_empty() {
            obj.insert("binaryData".into(), Json::Object(binary));
        }
        single(CONFIG_MAP_GENERATOR, obj)
    }

    fn behavior(&self) -> Behavior { self.args.behavior }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretArgs {
    #[serde(flatten)]
    pub base: GeneratorArgs,
    #[serde(rename = "type", default)]
    pub secret_type: Option<String>,
}

/// Generates one Secret with every value base64-encoded into `data`.
#[derive(Default)]
pub struct SecretGenerator {
    args: SecretArgs,
    loader: Option<Arc<dyn Loader>>,
}

impl Configurable for SecretGenerator {
    fn configure(&mut self, loader: Arc<dyn Loader>, config: &[u8]) -> Result<()> {
        let args: SecretArgs = parse_config(SECRET_GENERATOR, config)?;
        args.base.validate(SECRET_GENERATOR)?;
        self.args = args;
        self.loader = Some(loader);
        Ok(())
    }
}

impl Generator for SecretGenerator {
    fn generate(&mut self) -> Result<ResMap> {
        let loader = configured_loader(&self.loader, SECRET_GENERATOR)?;
        let pairs = load_pairs(loader, SECRET_GENERATOR, &self.args.base.sources)?;
        let data: Map<String, Json> = pairs
            .into_iter()
            .map(|p| (p.key, Json::String(STANDARD.encode(p.value))))
            .collect();
        let mut obj = self.args.base.skeleton("Secret");
        obj.insert("type".into(), json!(self.args.secret_type.as_deref().unwrap_or("Opaque")));
        if !data.is_empty() {
            obj.insert("data".into(), Json::Object(data));
        }
        single(SECRET_GENERATOR, obj)
    }

    fn behavior(&self) -> Behavior { self.args.base.behavior }
}
