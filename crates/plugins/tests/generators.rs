#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::json;
use strata_plugins::generators::{ConfigMapGenerator, SecretGenerator};
use strata_plugins::{Configurable, Generator, MemLoader};

fn generate<G: Generator + Default>(loader: MemLoader, config: &str) -> serde_json::Value {
    let mut g = G::default();
    g.configure(Arc::new(loader), config.as_bytes()).unwrap();
    let m = g.generate().unwrap();
    assert_eq!(m.len(), 1);
    m.into_iter().next().unwrap().into_value()
}

#[test]
fn literal_config_map_keeps_quoted_values_as_strings() {
    let doc = generate::<ConfigMapGenerator>(
        MemLoader::new("/app"),
        r#"
apiVersion: builtin
kind: ConfigMapGenerator
metadata:
  name: literalConfigMap
literals:
- a=x
- b=y
- c="Good Morning"
- d="false"
"#,
    );
    assert_eq!(
        doc,
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "literalConfigMap" },
            "data": { "a": "x", "b": "y", "c": "Good Morning", "d": "false" }
        })
    );
}

#[test]
fn secret_values_are_base64() {
    let doc = generate::<SecretGenerator>(
        MemLoader::new("/app"),
        "metadata:\n  name: mySecret\nliterals:\n- DB_USERNAME=admin\n- DB_PASSWORD=somepw\n",
    );
    assert_eq!(doc["kind"], json!("Secret"));
    assert_eq!(doc["type"], json!("Opaque"));
    assert_eq!(doc["data"], json!({ "DB_USERNAME": "YWRtaW4=", "DB_PASSWORD": "c29tZXB3" }));
}

#[test]
fn env_and_file_sources_are_combined() {
    let mut l = MemLoader::new("/app");
    l.add_file("app.env", "# settings\nMODE=prod\n\nPORT=8080\n")
        .add_file("conf/nginx.conf", "worker_processes 1;\n");
    let doc = generate::<ConfigMapGenerator>(
        l,
        "metadata:\n  name: cfg\nfiles:\n- conf/nginx.conf\n- alias.conf=conf/nginx.conf\nenvs:\n- app.env\n",
    );
    let data = doc["data"].as_object().unwrap();
    let keys: Vec<_> = data.keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 4);
    assert_eq!(data["nginx.conf"], json!("worker_processes 1;\n"));
    assert_eq!(data["alias.conf"], json!("worker_processes 1;\n"));
    assert_eq!(data["MODE"], json!("prod"));
    assert_eq!(data["PORT"], json!("8080"));
}

#[test]
fn later_sources_win() {
    let mut l = MemLoader::new("/app");
    l.add_file("override.env", "a=from-env\n");
    let doc = generate::<ConfigMapGenerator>(l, "metadata:\n  name: cfg\nliterals: [a=literal, b=kept]\nenvFiles: [override.env]\n");
    assert_eq!(doc["data"], json!({ "a": "from-env", "b": "kept" }));
}

#[test]
fn bad_keys_and_missing_files_fail() {
    let mut g = ConfigMapGenerator::default();
    g.configure(Arc::new(MemLoader::new("/app")), b"metadata:\n  name: cfg\nliterals: ['bad key=x']\n").unwrap();
    assert!(g.generate().is_err());

    let mut g = ConfigMapGenerator::default();
    g.configure(Arc::new(MemLoader::new("/app")), b"metadata:\n  name: cfg\nfiles: [nope.txt]\n").unwrap();
    assert!(g.generate().is_err());
}
