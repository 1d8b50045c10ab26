use std::sync::Arc;

use bson::Document;

use crate::collection::Collection;
use crate::properties::Properties;

/// The schema collaborator a scope is bound to.
pub trait Model: Send + Sync {
    /// The typed object built from each stored document.
    type Record;

    /// Name of the model. Scope equality compares it together with
    /// [`Model::properties`].
    fn name(&self) -> &str;

    /// Declared properties, used for field alias resolution and value conversion.
    fn properties(&self) -> &Properties;

    /// Collection queried when a scope has no `from` override.
    fn collection(&self) -> Arc<dyn Collection>;

    /// Whether [`Model::ensure_indexes`] can be skipped. Scopes call
    /// `ensure_indexes` before every execution while this returns false, so a
    /// model that creates indexes should flip it once they exist.
    fn indexes_initialized(&self) -> bool {
        false
    }

    /// Create the model's indexes. Called before a scope executes while
    /// [`Model::indexes_initialized`] is false.
    fn ensure_indexes(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn from_store(&self, document: Document) -> anyhow::Result<Self::Record>;
}
