//! Chainable, lazily evaluated queries over document stores.
//!
//! The query machinery lives in [`docscope_core`] and is re-exported here.
//! [`MemoryCollection`] is an in-memory store that understands the compiled
//! selectors and options.

pub use docscope_core::*;
pub use memstore::{self, MemoryCollection};
