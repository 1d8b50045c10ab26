use std::fmt;

use bson::Document;

/// Raw documents produced by a find, in result order.
pub type DocumentCursor<'a> = Box<dyn Iterator<Item = anyhow::Result<Document>> + 'a>;

/// The storage collaborator a scope executes against.
///
/// Both calls receive a compiled query: a selector, and an options document
/// whose keys are a subset of `skip`, `limit`, `fields` and `sort`. Failures
/// are opaque to scopes and are handed back to the caller unchanged.
pub trait Collection: fmt::Debug + Send + Sync {
    /// Identity of the collection; two scopes on collections with the same name
    /// read from the same source.
    fn name(&self) -> &str;

    fn find(&self, selector: &Document, options: &Document) -> anyhow::Result<DocumentCursor<'_>>;

    fn count(&self, selector: &Document, options: &Document) -> anyhow::Result<u64>;
}
