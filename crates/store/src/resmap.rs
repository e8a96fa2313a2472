use std::collections::HashMap;

use rustc_hash::FxHashMap;
use strata_core::{Error, ResId, Result};
use tracing::{debug, trace};

use crate::resource::Resource;

/// Ordered collection of resources keyed by [`ResId`].
///
/// Insertion order is kept and is the emission order. No two entries may be
/// namespace-qualified-equal (same GVK, name and namespace); membership
/// operations report a [`Error::Conflict`] instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResMap {
    entries: Vec<Resource>,
    /// Exact id -> position in `entries`.
    index: FxHashMap<ResId, usize>,
}

fn conflict(existing: &Resource, incoming: &Resource) -> Error {
    Error::Conflict {
        id: incoming.id().to_string(),
        existing: format!("{} {}", existing.id(), existing.value()),
        incoming: format!("{} {}", incoming.id(), incoming.value()),
    }
}

impl ResMap {
    pub fn new() -> Self { Self::default() }

    /// Append every resource in order; fails on the first conflict.
    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Result<Self> {
        let mut m = Self::new();
        for r in resources {
            m.append(r)?;
        }
        Ok(m)
    }

    /// Build from an id-keyed map. Each resource takes its key as id; entries
    /// are ordered by canonical id string so the result is deterministic.
    pub fn from_map(map: HashMap<ResId, Resource>) -> Self {
        let mut pairs: Vec<(ResId, Resource)> = map.into_iter().collect();
        pairs.sort_by_cached_key(|(id, _)| id.to_string());
        let mut m = Self::new();
        for (id, mut r) in pairs {
            r.set_id(id);
            m.push(r);
        }
        m
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Snapshot of the resources in insertion order.
    pub fn resources(&self) -> Vec<&Resource> { self.entries.iter().collect() }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> { self.entries.iter() }

    /// Mutable access to every document in order. Edits to identity fields
    /// leave the cached ids stale; see [`ResMap::refresh_ids`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Resource> { self.entries.iter_mut() }

    pub fn ids(&self) -> Vec<ResId> { self.entries.iter().map(|r| r.id().clone()).collect() }

    pub fn contains(&self, id: &ResId) -> bool { self.index.contains_key(id) }

    /// Exact lookup, prefix and suffix chains included.
    pub fn get_by_id(&self, id: &ResId) -> Option<&Resource> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn get_by_id_mut(&mut self, id: &ResId) -> Option<&mut Resource> {
        let i = *self.index.get(id)?;
        self.entries.get_mut(i)
    }

    /// Ids satisfying `pred`, in insertion order.
    pub fn get_matching_ids(&self, pred: impl Fn(&ResId) -> bool) -> Vec<ResId> {
        self.entries.iter().map(Resource::id).filter(|id| pred(*id)).cloned().collect()
    }

    fn position_of_qualified(&self, id: &ResId, skip: Option<usize>) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .find(|(i, r)| Some(*i) != skip && r.id().namespace_qualified_equals(id))
            .map(|(i, _)| i)
    }

    fn push(&mut self, r: Resource) {
        self.index.insert(r.id().clone(), self.entries.len());
        self.entries.push(r);
    }

    fn reindex_from(&mut self, start: usize) {
        for (i, r) in self.entries.iter().enumerate().skip(start) {
            self.index.insert(r.id().clone(), i);
        }
    }

    /// Insert at the end.
    ///
    /// Re-adding a resource with the same exact id and equal content is a
    /// no-op; any other namespace-qualified collision is a conflict and the
    /// existing entry is left untouched.
    pub fn append(&mut self, r: Resource) -> Result<()> {
        if let Some(pos) = self.position_of_qualified(r.id(), None) {
            let existing = &self.entries[pos];
            if existing.id() == r.id() && existing.content_eq(&r) {
                debug!(id = %r.id(), "identical resource appended twice; merged");
                return Ok(());
            }
            return Err(conflict(existing, &r));
        }
        trace!(id = %r.id(), "append");
        self.push(r);
        Ok(())
    }

    /// Append all of `other` in its order. Not atomic: on a conflict the
    /// resources appended before it stay in place.
    pub fn append_all(&mut self, other: ResMap) -> Result<()> {
        for r in other.entries {
            self.append(r)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &ResId) -> Result<Resource> {
        let pos = self.index.remove(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        let removed = self.entries.remove(pos);
        self.reindex_from(pos);
        debug!(id = %id, "removed resource");
        Ok(removed)
    }

    /// Swap the entry at `id` for `r` in the same position, returning the old
    /// resource. `r` may carry a different id as long as it does not collide
    /// with any other entry.
    pub fn replace(&mut self, id: &ResId, r: Resource) -> Result<Resource> {
        let pos = *self.index.get(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        if let Some(other) = self.position_of_qualified(r.id(), Some(pos)) {
            return Err(conflict(&self.entries[other], &r));
        }
        self.index.remove(id);
        self.index.insert(r.id().clone(), pos);
        debug!(from = %id, to = %r.id(), "replaced resource");
        Ok(std::mem::replace(&mut self.entries[pos], r))
    }

    /// Give the entry at `id` a new identity without moving it. Used after a
    /// transformer rewrote the document fields the id is derived from.
    pub fn rekey(&mut self, id: &ResId, new_id: ResId) -> Result<()> {
        let pos = *self.index.get(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        if let Some(other) = self.position_of_qualified(&new_id, Some(pos)) {
            let mut incoming = self.entries[pos].clone();
            incoming.set_id(new_id);
            return Err(conflict(&self.entries[other], &incoming));
        }
        self.index.remove(id);
        self.index.insert(new_id.clone(), pos);
        self.entries[pos].set_id(new_id);
        Ok(())
    }

    /// Re-derive each cached id from its document, keeping positions. The
    /// new ids are checked against each other as a whole, so renames that
    /// swap identities succeed; on a collision nothing is changed.
    pub fn refresh_ids(&mut self) -> Result<()> {
        let derived = self
            .entries
            .iter()
            .map(|r| r.check_identity_fields().map(|()| r.derived_id()))
            .collect::<Result<Vec<ResId>>>()?;
        for (i, id) in derived.iter().enumerate() {
            if let Some(j) = derived[..i].iter().position(|other| other.namespace_qualified_equals(id)) {
                let mut existing = self.entries[j].clone();
                existing.set_id(derived[j].clone());
                let mut incoming = self.entries[i].clone();
                incoming.set_id(id.clone());
                return Err(conflict(&existing, &incoming));
            }
        }
        for (r, id) in self.entries.iter_mut().zip(derived) {
            if r.id() != &id {
                debug!(from = %r.id(), to = %id, "re-keyed resource");
                r.set_id(id);
            }
        }
        self.index.clear();
        self.reindex_from(0);
        Ok(())
    }

    /// Order-insensitive comparison: every id must be present on both sides
    /// with structurally equal documents. The error lists every missing,
    /// extra and differing id.
    pub fn error_if_not_equal_sets(&self, other: &ResMap) -> Result<()> {
        let mut problems = Vec::new();
        for r in &self.entries {
            match other.get_by_id(r.id()) {
                None => problems.push(format!("  missing from other: {}", r.id())),
                Some(o) if !o.content_eq(r) => problems.push(format!(
                    "  differs: {}\n    this:  {}\n    other: {}",
                    r.id(),
                    r.value(),
                    o.value()
                )),
                Some(_) => {}
            }
        }
        for r in &other.entries {
            if !self.contains(r.id()) {
                problems.push(format!("  extra in other: {}", r.id()));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::SetMismatch(problems.join("\n")))
        }
    }
}

impl IntoIterator for ResMap {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter { self.entries.into_iter() }
}
