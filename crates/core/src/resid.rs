use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Error, Result};

const NO_GROUP: &str = "~G";
const NO_VERSION: &str = "~V";
const NO_KIND: &str = "~K";
const NO_NAMESPACE: &str = "~X";
const NO_PREFIX: &str = "~P";
const NO_NAME: &str = "~N";
const NO_SUFFIX: &str = "~S";
const SEPARATOR: char = '|';
const CHAIN_SEPARATOR: char = ':';
const GVK_SEPARATOR: char = '/';
const ESCAPE: char = '\\';

/// Ordered record of name-mangling strings, one element per overlay layer.
type Chain = SmallVec<[String; 2]>;

fn chain_from(s: &str) -> Chain {
    if s.is_empty() {
        Chain::new()
    } else {
        s.split(CHAIN_SEPARATOR).map(str::to_string).collect()
    }
}

/// One value of the canonical string. Separators and the escape char are
/// backslash-escaped, as is a leading `~` so no value reads as a sentinel.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.char_indices() {
            if matches!(c, ESCAPE | SEPARATOR | CHAIN_SEPARATOR | GVK_SEPARATOR) || (i == 0 && c == '~') {
                f.write_char(ESCAPE)?;
            }
            f.write_char(c)?;
        }
        Ok(())
    }
}

/// A value, or `sentinel` when it is empty.
struct Field<'a>(&'a str, &'static str);

impl fmt::Display for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() { f.write_str(self.1) } else { write!(f, "{}", Escaped(self.0)) }
    }
}

/// A chain joined with `:`, or `sentinel` when it has no elements.
struct ChainField<'a>(&'a [String], &'static str);

impl fmt::Display for ChainField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(self.1);
        }
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_char(CHAIN_SEPARATOR)?;
            }
            write!(f, "{}", Escaped(part))?;
        }
        Ok(())
    }
}

/// Split on `sep` where it is not escaped; pieces keep their escapes.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// `None` on a dangling escape.
fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        out.push(if c == ESCAPE { chars.next()? } else { c });
    }
    Some(out)
}

fn field_from(raw: &str, sentinel: &str) -> Option<String> {
    if raw == sentinel { Some(String::new()) } else { unescape(raw) }
}

fn chain_field_from(raw: &str, sentinel: &str) -> Option<Chain> {
    if raw == sentinel {
        return Some(Chain::new());
    }
    split_unescaped(raw, CHAIN_SEPARATOR).into_iter().map(unescape).collect()
}

/// Group/Version/Kind of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvk {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }

    pub fn from_kind(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), ..Self::default() }
    }

    /// Split an `apiVersion` such as `apps/v1` (or `v1` for the core group).
    pub fn from_api_version_kind(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        Self::new(group, version, kind)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match split_unescaped(s, GVK_SEPARATOR).as_slice() {
            [group, version, kind] => Some(Self::new(
                field_from(group, NO_GROUP)?,
                field_from(version, NO_VERSION)?,
                field_from(kind, NO_KIND)?,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            Field(&self.group, NO_GROUP),
            Field(&self.version, NO_VERSION),
            Field(&self.kind, NO_KIND),
            sep = GVK_SEPARATOR,
        )
    }
}

/// Type, name and namespace of a resource without any provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId {
    pub gvk: Gvk,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Immutable identifier of a resource.
///
/// Composes an [`ItemId`] with the prefix and suffix chains applied by
/// successive overlay layers. The chains take part in exact equality (and
/// hashing) but not in [`ResId::gvkn_equals`] or
/// [`ResId::namespace_qualified_equals`].
///
/// The canonical string form is `group/version/kind|namespace|prefix|name|suffix`,
/// with sentinel tokens standing in for empty fields and `\` escaping
/// separators inside values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResId {
    item: ItemId,
    prefix: Chain,
    suffix: Chain,
}

impl ResId {
    pub fn new(gvk: Gvk, name: impl Into<String>) -> Self {
        Self {
            item: ItemId { gvk, name: name.into(), namespace: String::new() },
            prefix: Chain::new(),
            suffix: Chain::new(),
        }
    }

    pub fn from_kind(kind: &str, name: impl Into<String>) -> Self {
        Self::new(Gvk::from_kind(kind), name)
    }

    /// Build an id with every field given; `prefix` and `suffix` are
    /// colon-joined chains, outermost prefix first and outermost suffix last.
    pub fn from_parts(gvk: Gvk, name: &str, namespace: &str, prefix: &str, suffix: &str) -> Self {
        Self {
            item: ItemId { gvk, name: name.to_string(), namespace: namespace.to_string() },
            prefix: chain_from(prefix),
            suffix: chain_from(suffix),
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidResId { input: input.to_string(), reason: reason.to_string() };
        let fields = split_unescaped(input, SEPARATOR);
        let [gvk, namespace, prefix, name, suffix] = fields.as_slice() else {
            return Err(invalid("expected five '|'-separated fields"));
        };
        let gvk = Gvk::parse(gvk).ok_or_else(|| invalid("type must be group/version/kind"))?;
        let dangling = || invalid("dangling escape");
        Ok(Self {
            item: ItemId {
                gvk,
                name: field_from(name, NO_NAME).ok_or_else(dangling)?,
                namespace: field_from(namespace, NO_NAMESPACE).ok_or_else(dangling)?,
            },
            prefix: chain_field_from(prefix, NO_PREFIX).ok_or_else(dangling)?,
            suffix: chain_field_from(suffix, NO_SUFFIX).ok_or_else(dangling)?,
        })
    }

    pub fn item(&self) -> &ItemId { &self.item }
    pub fn gvk(&self) -> &Gvk { &self.item.gvk }
    pub fn name(&self) -> &str { &self.item.name }
    pub fn namespace(&self) -> &str { &self.item.namespace }

    /// Colon-joined prefix chain.
    pub fn prefix(&self) -> String { self.prefix.join(":") }
    /// Colon-joined suffix chain.
    pub fn suffix(&self) -> String { self.suffix.join(":") }
    pub fn prefix_chain(&self) -> &[String] { &self.prefix }
    pub fn suffix_chain(&self) -> &[String] { &self.suffix }

    /// Short `type|name` form for human-facing messages.
    pub fn gvkn_string(&self) -> String {
        format!("{}{}{}", self.item.gvk, SEPARATOR, Field(&self.item.name, NO_NAME))
    }

    pub fn gvkn_equals(&self, other: &ResId) -> bool {
        self.item.name == other.item.name && self.item.gvk == other.item.gvk
    }

    pub fn namespace_qualified_equals(&self, other: &ResId) -> bool {
        self.item.namespace == other.item.namespace && self.gvkn_equals(other)
    }

    /// Record one more overlay layer: `prefix` becomes the new head of the
    /// prefix chain and `suffix` the new tail of the suffix chain. Empty
    /// arguments leave the corresponding chain untouched.
    pub fn with_added_prefix_suffix(&self, prefix: &str, suffix: &str) -> Self {
        let mut next = self.clone();
        if !prefix.is_empty() {
            next.prefix.insert(0, prefix.to_string());
        }
        if !suffix.is_empty() {
            next.suffix.push(suffix.to_string());
        }
        next
    }

    pub fn with_namespace(&self, namespace: &str) -> Self {
        let mut next = self.clone();
        next.item.namespace = namespace.to_string();
        next
    }

    /// Same id with a different (base) name; the chains are kept.
    pub fn with_name(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.item.name = name.to_string();
        next
    }

    pub fn with_gvk(&self, gvk: Gvk) -> Self {
        let mut next = self.clone();
        next.item.gvk = gvk;
        next
    }

    /// An empty chain compares as a single empty element.
    pub fn has_same_leftmost_prefix(&self, other: &ResId) -> bool {
        self.leftmost_prefix() == other.leftmost_prefix()
    }

    pub fn has_same_rightmost_suffix(&self, other: &ResId) -> bool {
        self.rightmost_suffix() == other.rightmost_suffix()
    }

    fn leftmost_prefix(&self) -> &str {
        self.prefix.first().map_or("", String::as_str)
    }

    fn rightmost_suffix(&self) -> &str {
        self.suffix.last().map_or("", String::as_str)
    }

    /// The text the prefix chain contributes to a mangled name.
    pub fn prefix_concat(&self) -> String { self.prefix.concat() }
    /// The text the suffix chain contributes to a mangled name.
    pub fn suffix_concat(&self) -> String { self.suffix.concat() }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{gvk}{sep}{ns}{sep}{prefix}{sep}{name}{sep}{suffix}",
            gvk = self.item.gvk,
            ns = Field(&self.item.namespace, NO_NAMESPACE),
            prefix = ChainField(&self.prefix, NO_PREFIX),
            name = Field(&self.item.name, NO_NAME),
            suffix = ChainField(&self.suffix, NO_SUFFIX),
            sep = SEPARATOR,
        )
    }
}

impl FromStr for ResId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ResId> for String {
    fn from(id: ResId) -> Self {
        id.to_string()
    }
}
