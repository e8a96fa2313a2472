use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value as Json};
use smallvec::SmallVec;
use strata_core::{Error, Result};

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Path into a document: dot-separated keys, each optionally followed by a
/// single `[index]`, e.g. `spec.template.spec` or `spec.containers[0].image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: SmallVec<[Segment; 4]>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self> {
        let s = path.strip_prefix('.').unwrap_or(path);
        if s.is_empty() {
            return Err(Error::field_path(path, "empty path"));
        }
        let mut segments = SmallVec::new();
        for seg in s.split('.') {
            let (key, index) = match seg.find('[') {
                Some(open) => {
                    let inner = seg[open + 1..]
                        .strip_suffix(']')
                        .ok_or_else(|| Error::field_path(path, "index must close the segment"))?;
                    let index: usize = inner
                        .parse()
                        .map_err(|_| Error::field_path(path, format!("bad index '{inner}'")))?;
                    (&seg[..open], Some(index))
                }
                None => (seg, None),
            };
            if key.is_empty() || key.contains(']') {
                return Err(Error::field_path(path, format!("bad segment '{seg}'")));
            }
            segments.push(Segment::Key(key.to_string()));
            if let Some(i) = index {
                segments.push(Segment::Index(i));
            }
        }
        Ok(Self { segments })
    }

    /// Path made of plain map keys; keys may contain dots or slashes.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: keys.into_iter().map(|k| Segment::Key(k.into())).collect() }
    }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    fn prefix_string(&self, depth: usize) -> String {
        Self { segments: self.segments[..=depth].iter().cloned().collect() }.to_string()
    }

    fn mismatch(&self, depth: usize, expected: &str) -> Error {
        Error::field_path(self.prefix_string(depth), format!("expected a {expected}"))
    }

    /// Value at this path; `None` when a step is missing or has the wrong type.
    pub fn lookup<'a>(&self, root: &'a Json) -> Option<&'a Json> {
        let mut cur = root;
        for seg in &self.segments {
            cur = match (seg, cur) {
                (Segment::Key(k), Json::Object(map)) => map.get(k)?,
                (Segment::Index(i), Json::Array(arr)) => arr.get(*i)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Mutable value at this path. Missing steps yield `Ok(None)`; a step
    /// holding the wrong type is an error.
    pub fn lookup_mut<'a>(&self, root: &'a mut Json) -> Result<Option<&'a mut Json>> {
        self.walk_mut(root, false)
    }

    /// Mutable value at this path, creating intermediate maps (and a null
    /// leaf) where keys are missing.
    pub fn ensure<'a>(&self, root: &'a mut Json) -> Result<&'a mut Json> {
        self.walk_mut(root, true)?
            .ok_or_else(|| Error::field_path(self.to_string(), "could not be created"))
    }

    fn walk_mut<'a>(&self, root: &'a mut Json, create: bool) -> Result<Option<&'a mut Json>> {
        let mut cur = root;
        for (depth, seg) in self.segments.iter().enumerate() {
            cur = match seg {
                Segment::Key(k) => {
                    if create && cur.is_null() {
                        *cur = Json::Object(Map::new());
                    }
                    let Json::Object(map) = cur else {
                        return Err(self.mismatch(depth, "map"));
                    };
                    if create {
                        map.entry(k.clone()).or_insert(Json::Null)
                    } else {
                        match map.get_mut(k) {
                            Some(v) => v,
                            None => return Ok(None),
                        }
                    }
                }
                Segment::Index(i) => {
                    let Json::Array(arr) = cur else {
                        return Err(self.mismatch(depth, "sequence"));
                    };
                    match arr.get_mut(*i) {
                        Some(v) => v,
                        None if create => {
                            return Err(Error::field_path(self.prefix_string(depth), "index out of range"))
                        }
                        None => return Ok(None),
                    }
                }
            };
        }
        Ok(Some(cur))
    }

    pub fn set(&self, root: &mut Json, value: Json) -> Result<()> {
        *self.ensure(root)? = value;
        Ok(())
    }

    /// Remove the value at this path, returning it if it was present.
    pub fn remove(&self, root: &mut Json) -> Result<Option<Json>> {
        let Some((last, parent)) = self.segments.split_last() else {
            return Ok(None);
        };
        let parent = Self { segments: parent.iter().cloned().collect() };
        let holder = if parent.segments.is_empty() { Some(root) } else { parent.lookup_mut(root)? };
        Ok(match (last, holder) {
            (Segment::Key(k), Some(Json::Object(map))) => map.remove(k),
            (Segment::Index(i), Some(Json::Array(arr))) if *i < arr.len() => Some(arr.remove(*i)),
            _ => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Key(k) if i == 0 => write!(f, "{k}")?,
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
