//! Key/value data sources for the ConfigMap and Secret generators.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strata_core::{Error, Result};
use tracing::debug;

use crate::loader::Loader;

static CONFIG_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-._a-zA-Z0-9]+$").expect("valid regex"));
static ENV_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-._a-zA-Z][-._a-zA-Z0-9]*$").expect("valid regex"));

const UTF8_BOM: &str = "\u{feff}";

/// Where a generator takes its keys and values from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSources {
    /// `key=value`; the value may be wrapped in matching quotes.
    #[serde(default)]
    pub literals: Vec<String>,
    /// `path` (key is the file name) or `key=path`.
    #[serde(default)]
    pub files: Vec<String>,
    /// Line-oriented `KEY=VALUE` files.
    #[serde(default, alias = "envFiles")]
    pub envs: Vec<String>,
}

impl DataSources {
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.files.is_empty() && self.envs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: Vec<u8>,
}

impl KvPair {
    fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Collect literals, then files, then env files into one ordered set. A later
/// occurrence of a key overwrites the earlier value in place.
pub fn load_pairs(loader: &dyn Loader, kind: &str, sources: &DataSources) -> Result<Vec<KvPair>> {
    let mut all = Vec::new();
    for lit in &sources.literals {
        all.push(parse_literal(kind, lit)?);
    }
    for src in &sources.files {
        let (key, path) = parse_file_source(kind, src)?;
        all.push(KvPair::new(key, loader.load(path)?));
    }
    for path in &sources.envs {
        let content = loader.load(path)?;
        let text = String::from_utf8(content)
            .map_err(|_| Error::malformed(kind, format!("env file '{path}' is not UTF-8")))?;
        all.extend(parse_env_lines(kind, path, &text)?);
    }

    let mut out: Vec<KvPair> = Vec::with_capacity(all.len());
    for pair in all {
        validate_key(kind, &pair.key)?;
        match out.iter_mut().find(|p| p.key == pair.key) {
            Some(existing) => {
                debug!(key = %pair.key, "later data source overrides key");
                existing.value = pair.value;
            }
            None => out.push(pair),
        }
    }
    Ok(out)
}

fn validate_key(kind: &str, key: &str) -> Result<()> {
    if CONFIG_KEY.is_match(key) {
        Ok(())
    } else {
        Err(Error::malformed(kind, format!("invalid key '{key}': must match {}", CONFIG_KEY.as_str())))
    }
}

fn strip_quotes(v: &str) -> &str {
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

pub fn parse_literal(kind: &str, source: &str) -> Result<KvPair> {
    match source.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok(KvPair::new(k, strip_quotes(v))),
        _ => Err(Error::malformed(kind, format!("invalid literal source '{source}', expected key=value"))),
    }
}

/// Split `key=path` or derive the key from the file name of `path`.
pub fn parse_file_source<'a>(kind: &str, source: &'a str) -> Result<(String, &'a str)> {
    let bad = || Error::malformed(kind, format!("invalid file source '{source}'"));
    match source.split_once('=') {
        Some((k, p)) if k.is_empty() || p.is_empty() => Err(bad()),
        Some((k, p)) => Ok((k.to_string(), p)),
        None => {
            let name = Path::new(source).file_name().and_then(|n| n.to_str()).ok_or_else(bad)?;
            Ok((name.to_string(), source))
        }
    }
}

/// Parse env-file text. Blank lines and `#` comments are skipped; a line with
/// only a key takes its value from the process environment.
pub fn parse_env_lines(kind: &str, path: &str, text: &str) -> Result<Vec<KvPair>> {
    let mut out = Vec::new();
    for (n, raw) in text.strip_prefix(UTF8_BOM).unwrap_or(text).lines().enumerate() {
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k, v.to_string()),
            None => (line, std::env::var(line).unwrap_or_default()),
        };
        if !ENV_KEY.is_match(key) {
            return Err(Error::malformed(
                kind,
                format!("{path}:{}: invalid variable name '{key}'", n + 1),
            ));
        }
        out.push(KvPair::new(key, value));
    }
    Ok(out)
}
