use serde_json::{Map, Value as Json};
use strata_core::{Error, Gvk, ResId, Result};

use crate::path::FieldPath;

/// One parsed document together with its cached identity.
///
/// The document may be edited freely through [`Resource::value_mut`] or the
/// path helpers; the cached id is only replaced by the owning
/// [`crate::ResMap`], so after edits to `apiVersion`, `kind`,
/// `metadata.name` or `metadata.namespace` it is stale until
/// [`crate::ResMap::refresh_ids`] or an explicit replace.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    obj: Json,
    id: ResId,
}

/// Fields the id is derived from.
const IDENTITY_FIELDS: &[&[&str]] = &[&["apiVersion"], &["kind"], &["metadata", "name"], &["metadata", "namespace"]];

fn str_at<'a>(obj: &'a Json, keys: &[&str]) -> &'a str {
    let mut cur = obj;
    for k in keys {
        match cur.get(*k) {
            Some(v) => cur = v,
            None => return "",
        }
    }
    cur.as_str().unwrap_or("")
}

impl Resource {
    /// Wrap a document; it must be a map.
    pub fn from_value(obj: Json) -> Result<Self> {
        match obj {
            Json::Object(map) => Self::from_map(map),
            other => Err(Error::MalformedDocument(format!("expected a map, got {other}"))),
        }
    }

    pub fn from_map(map: Map<String, Json>) -> Result<Self> {
        let mut res = Self { obj: Json::Object(map), id: ResId::default() };
        res.check_identity_fields()?;
        res.id = ResId::new(res.gvk(), res.name()).with_namespace(res.namespace());
        Ok(res)
    }

    /// `apiVersion`, `kind`, `metadata.name` and `metadata.namespace` must be
    /// strings when present; null counts as absent.
    pub fn check_identity_fields(&self) -> Result<()> {
        for keys in IDENTITY_FIELDS {
            match FieldPath::keys(keys.iter().copied()).lookup(&self.obj) {
                None | Some(Json::Null) | Some(Json::String(_)) => {}
                Some(other) => {
                    return Err(Error::MalformedDocument(format!(
                        "{} must be a string, got {other}",
                        keys.join(".")
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &ResId { &self.id }

    pub(crate) fn set_id(&mut self, id: ResId) { self.id = id; }

    /// Identity as the document currently describes it, keeping the cached
    /// prefix/suffix chains. The chains' text is stripped off the document
    /// name to recover the base name when it is still present.
    pub fn derived_id(&self) -> ResId {
        let name = self.name();
        let prefix = self.id.prefix_concat();
        let suffix = self.id.suffix_concat();
        let base = name
            .strip_prefix(prefix.as_str())
            .and_then(|n| n.strip_suffix(suffix.as_str()))
            .unwrap_or(name);
        self.id.with_gvk(self.gvk()).with_name(base).with_namespace(self.namespace())
    }

    pub fn is_id_stale(&self) -> bool { self.derived_id() != self.id }

    pub fn gvk(&self) -> Gvk {
        Gvk::from_api_version_kind(str_at(&self.obj, &["apiVersion"]), str_at(&self.obj, &["kind"]))
    }

    pub fn kind(&self) -> &str { str_at(&self.obj, &["kind"]) }
    pub fn name(&self) -> &str { str_at(&self.obj, &["metadata", "name"]) }
    pub fn namespace(&self) -> &str { str_at(&self.obj, &["metadata", "namespace"]) }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.set_keys(&["metadata", "name"], Json::String(name.to_string()))
    }

    /// An empty namespace removes the field.
    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        if namespace.is_empty() {
            FieldPath::keys(["metadata", "namespace"]).remove(&mut self.obj)?;
            return Ok(());
        }
        self.set_keys(&["metadata", "namespace"], Json::String(namespace.to_string()))
    }

    pub fn labels(&self) -> Option<&Map<String, Json>> {
        FieldPath::keys(["metadata", "labels"]).lookup(&self.obj).and_then(Json::as_object)
    }

    pub fn value(&self) -> &Json { &self.obj }
    pub fn value_mut(&mut self) -> &mut Json { &mut self.obj }
    pub fn into_value(self) -> Json { self.obj }

    /// Value at a dotted path; `None` if absent, of the wrong shape, or the
    /// path itself is invalid.
    pub fn get(&self, path: &str) -> Option<&Json> {
        FieldPath::parse(path).ok()?.lookup(&self.obj)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Json::as_str)
    }

    pub fn set(&mut self, path: &str, value: Json) -> Result<()> {
        FieldPath::parse(path)?.set(&mut self.obj, value)
    }

    pub fn set_keys(&mut self, keys: &[&str], value: Json) -> Result<()> {
        FieldPath::keys(keys.iter().copied()).set(&mut self.obj, value)
    }

    pub fn remove(&mut self, path: &str) -> Result<Option<Json>> {
        FieldPath::parse(path)?.remove(&mut self.obj)
    }

    /// Map at `path`, created empty when missing.
    pub fn map_mut(&mut self, path: &FieldPath) -> Result<&mut Map<String, Json>> {
        let slot = path.ensure(&mut self.obj)?;
        if slot.is_null() {
            *slot = Json::Object(Map::new());
        }
        slot.as_object_mut().ok_or_else(|| Error::field_path(path.to_string(), "expected a map"))
    }

    /// Merge `patch` into the value at `path` key by key (see [`merge_values`]).
    pub fn merge_patch(&mut self, path: &FieldPath, patch: &Json) -> Result<()> {
        merge_values(path.ensure(&mut self.obj)?, patch);
        Ok(())
    }

    /// Structural equality of the documents, ignoring the cached ids.
    pub fn content_eq(&self, other: &Resource) -> bool { self.obj == other.obj }
}

/// Recursive merge of `patch` into `target`: maps merge key by key, a `null`
/// in the patch deletes the key, anything else overwrites.
pub fn merge_values(target: &mut Json, patch: &Json) {
    match patch {
        Json::Object(p) => {
            if !target.is_object() {
                *target = Json::Object(Map::new());
            }
            if let Json::Object(t) = target {
                for (k, v) in p {
                    if v.is_null() {
                        t.remove(k);
                    } else {
                        merge_values(t.entry(k.clone()).or_insert(Json::Null), v);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment(name: &str) -> Resource {
        Resource::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": name, "namespace": "prod" },
            "spec": { "replicas": 1 }
        }))
        .unwrap()
    }

    #[test]
    fn id_is_derived_from_type_name_namespace() {
        let r = deployment("web");
        assert_eq!(r.id(), &ResId::new(Gvk::new("apps", "v1", "Deployment"), "web").with_namespace("prod"));
        assert!(!r.is_id_stale());
    }

    #[test]
    fn non_string_identity_fields_are_rejected() {
        let err = Resource::from_value(json!({ "kind": "ConfigMap", "metadata": { "name": 123 } })).unwrap_err();
        assert!(err.to_string().contains("metadata.name"), "err={err}");
        assert!(matches!(Resource::from_value(json!({ "apiVersion": 1, "kind": "X" })), Err(Error::MalformedDocument(_))));
        let r = Resource::from_value(json!({ "kind": "ConfigMap", "metadata": { "name": "a", "namespace": null } })).unwrap();
        assert_eq!(r.id().namespace(), "");
    }

    #[test]
    fn non_map_documents_are_rejected() {
        assert!(matches!(Resource::from_value(json!([1, 2])), Err(Error::MalformedDocument(_))));
        let r = Resource::from_value(json!({})).unwrap();
        assert_eq!(r.id().to_string(), "~G/~V/~K|~X|~P|~N|~S");
    }

    #[test]
    fn edits_make_the_cached_id_stale() {
        let mut r = deployment("web");
        r.set_namespace("dev").unwrap();
        assert!(r.is_id_stale());
        assert_eq!(r.derived_id().namespace(), "dev");
        r.set_namespace("").unwrap();
        assert_eq!(r.namespace(), "");
        assert!(r.get("metadata.namespace").is_none());
    }

    #[test]
    fn derived_id_strips_recorded_mangling() {
        let mut r = deployment("web");
        r.set_id(r.id().with_added_prefix_suffix("p-", "-s"));
        r.set_name("p-web-s").unwrap();
        assert!(!r.is_id_stale());
        assert_eq!(r.derived_id().name(), "web");
        r.set_name("renamed").unwrap();
        assert_eq!(r.derived_id().name(), "renamed");
        assert_eq!(r.derived_id().prefix(), "p-");
    }

    #[test]
    fn merge_patch_is_deep() {
        let mut r = deployment("web");
        let path = FieldPath::parse("spec").unwrap();
        r.merge_patch(&path, &json!({ "template": { "spec": { "nodeSelector": { "a": "b" } } }, "paused": null }))
            .unwrap();
        assert_eq!(r.get("spec.replicas"), Some(&json!(1)));
        assert_eq!(r.get_str("spec.template.spec.nodeSelector.a"), Some("b"));
        r.merge_patch(&path, &json!({ "replicas": null })).unwrap();
        assert!(r.get("spec.replicas").is_none());
    }

    #[test]
    fn map_mut_creates_missing_maps() {
        let mut r = deployment("web");
        r.map_mut(&FieldPath::keys(["metadata", "labels"])).unwrap().insert("app".into(), json!("web"));
        assert_eq!(r.labels().and_then(|l| l.get("app")), Some(&json!("web")));
        assert!(r.map_mut(&FieldPath::keys(["spec", "replicas"])).is_err());
    }
}
