//! Strata core types: resource identity (GVK, ResId) and the shared error type.

#![forbid(unsafe_code)]

mod error;
mod resid;

pub use error::{Error, Result};
pub use resid::{Gvk, ItemId, ResId};
