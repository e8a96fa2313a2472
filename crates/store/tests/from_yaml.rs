#![forbid(unsafe_code)]

use std::collections::HashMap;

use serde_json::json;
use strata_core::{Gvk, ResId};
use strata_store::{ResMap, Resource};

fn deploy() -> Gvk { Gvk::new("apps", "v1", "Deployment") }

fn res(v: serde_json::Value) -> Resource { Resource::from_value(v).unwrap() }

#[test]
fn comment_only_document_yields_no_entry() {
    let input = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm1\n---\n# some comment\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm2\n";
    let m = ResMap::from_yaml_bytes(input.as_bytes()).unwrap();
    assert_eq!(m.len(), 2);
    let names: Vec<_> = m.iter().map(|r| r.name().to_string()).collect();
    assert_eq!(names, ["cm1", "cm2"]);
}

#[test]
fn namespaced_twin_is_a_separate_entry() {
    let input = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: dply1
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: dply2
---
# some comment
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: dply2
  namespace: test
---
"#;
    let m = ResMap::from_yaml_bytes(input.as_bytes()).unwrap();
    assert_eq!(m.len(), 3);

    let expected = ResMap::from_map(HashMap::from([
        (
            ResId::new(deploy(), "dply1"),
            res(json!({ "apiVersion": "apps/v1", "kind": "Deployment", "metadata": { "name": "dply1" } })),
        ),
        (
            ResId::new(deploy(), "dply2"),
            res(json!({ "apiVersion": "apps/v1", "kind": "Deployment", "metadata": { "name": "dply2" } })),
        ),
        (
            ResId::new(deploy(), "dply2").with_namespace("test"),
            res(json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": { "name": "dply2", "namespace": "test" }
            })),
        ),
    ]));
    expected.error_if_not_equal_sets(&m).unwrap();
}

#[test]
fn a_single_differing_field_breaks_set_equality() {
    let a = ResMap::from_yaml_bytes(b"kind: ConfigMap\nmetadata:\n  name: a\ndata:\n  k: v\n").unwrap();
    let b = ResMap::from_yaml_bytes(b"kind: ConfigMap\nmetadata:\n  name: a\ndata:\n  k: w\n").unwrap();
    let err = a.error_if_not_equal_sets(&b).unwrap_err().to_string();
    assert!(err.contains("\"k\":\"v\"") && err.contains("\"k\":\"w\""), "err={err}");
}

#[test]
fn duplicate_documents_in_one_stream() {
    let same = "kind: ConfigMap\nmetadata:\n  name: a\n---\nkind: ConfigMap\nmetadata:\n  name: a\n";
    assert_eq!(ResMap::from_yaml_bytes(same.as_bytes()).unwrap().len(), 1);

    let clash = "kind: ConfigMap\nmetadata:\n  name: a\ndata:\n  x: '1'\n---\nkind: ConfigMap\nmetadata:\n  name: a\n";
    let err = ResMap::from_yaml_bytes(clash.as_bytes()).unwrap_err();
    assert!(matches!(err, strata_core::Error::Conflict { .. }));
}
