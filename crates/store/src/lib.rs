//! Strata store: structured resources, field paths, and the ordered resource collection.

#![forbid(unsafe_code)]

mod codec;
mod path;
mod resmap;
mod resource;

pub use codec::{decode_documents, resources_from_bytes};
pub use path::{FieldPath, Segment};
pub use resmap::ResMap;
pub use resource::{merge_values, Resource};
