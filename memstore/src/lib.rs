//! An in-memory [`Collection`](docscope_core::Collection) over BSON documents.
//!
//! Supports the selectors and options produced by `docscope_core`: equality
//! and comparator conditions (with dotted paths and array membership), sort,
//! skip, limit and field projection.

mod collection;
mod compare;
pub mod error;
mod matcher;

pub use collection::*;
pub use compare::{compare, sort_order};
pub use error::Error;
pub use matcher::matches;
