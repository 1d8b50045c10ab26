//! Chainable, lazily executed queries.
//!
//! A [`Scope`] accumulates clauses. Chaining never touches the receiver: each
//! call returns a new, unloaded scope carrying a copy of the clauses. Nothing
//! is compiled or executed until a terminal call such as [`Scope::to_list`] or
//! [`Scope::count`], so invalid clauses only fail at that point.
//!
//! Once loaded, a scope keeps its records until [`Scope::reset`] or
//! [`Scope::reload`]. Loading goes through a `OnceCell`, so a built scope can
//! be shared read-only across threads; concurrent loads of the same scope run
//! the query at most once.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::collection::Collection;
use crate::conditions::Conditions;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::options::{CompiledQuery, FinderOptions};
use crate::order::{OrderSpec, OrderTerm};
use crate::properties::ID_PROPERTY;
use crate::value::Value;

/// The clauses a scope accumulates, for [`Scope::except`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Select,
    Order,
    Where,
    Limit,
    Offset,
    From,
}

pub struct Scope<M: Model> {
    model: Arc<M>,
    // Multi-value clauses, appended to by chaining.
    select_values: Vec<String>,
    order_values: Vec<OrderTerm>,
    where_values: Vec<Conditions>,
    // Single-value clauses, last write wins.
    limit_value: Option<u64>,
    offset_value: Option<u64>,
    from_value: Option<Arc<dyn Collection>>,
    documents: OnceCell<Vec<M::Record>>,
}

impl<M: Model> Clone for Scope<M> {
    /// Copies the clauses. The copy starts unloaded.
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            select_values: self.select_values.clone(),
            order_values: self.order_values.clone(),
            where_values: self.where_values.clone(),
            limit_value: self.limit_value,
            offset_value: self.offset_value,
            from_value: self.from_value.clone(),
            documents: OnceCell::new(),
        }
    }
}

impl<M: Model> fmt::Debug for Scope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let collection = self.collection();
        f.debug_struct("Scope")
            .field("model", &self.model.name())
            .field("collection", &collection.name())
            .field("options", &self.finder_options())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<M: Model> Scope<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            select_values: Vec::new(),
            order_values: Vec::new(),
            where_values: Vec::new(),
            limit_value: None,
            offset_value: None,
            from_value: None,
            documents: OnceCell::new(),
        }
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    fn spawn(&self, update: impl FnOnce(&mut Self)) -> Self {
        let mut scope = self.clone();
        update(&mut scope);
        scope
    }

    /// Add conditions. Fragments are merged left to right at compile time.
    pub fn where_(&self, conditions: impl Into<Conditions>) -> Self {
        let conditions = conditions.into();
        self.spawn(|scope| scope.where_values.push(conditions))
    }

    pub fn order(&self, order: impl Into<OrderSpec>) -> Self {
        let terms = order.into().into_terms();
        self.spawn(|scope| scope.order_values.extend(terms))
    }

    pub fn select<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.spawn(|scope| scope.select_values.extend(fields))
    }

    pub fn limit(&self, limit: u64) -> Self {
        self.spawn(|scope| scope.limit_value = Some(limit))
    }

    pub fn offset(&self, offset: u64) -> Self {
        self.spawn(|scope| scope.offset_value = Some(offset))
    }

    /// Read from `collection` instead of the model's default collection.
    pub fn from(&self, collection: Arc<dyn Collection>) -> Self {
        self.spawn(|scope| scope.from_value = Some(collection))
    }

    /// Append the other scope's clauses. Its single-value clauses win when set.
    pub fn merge(&self, other: &Scope<M>) -> Self {
        self.spawn(|scope| {
            scope.select_values.extend(other.select_values.iter().cloned());
            scope.order_values.extend(other.order_values.iter().cloned());
            scope.where_values.extend(other.where_values.iter().cloned());
            scope.limit_value = other.limit_value.or(scope.limit_value);
            scope.offset_value = other.offset_value.or(scope.offset_value);
            if let Some(from) = &other.from_value {
                scope.from_value = Some(from.clone());
            }
        })
    }

    /// A copy of this scope with one clause cleared.
    pub fn except(&self, clause: Clause) -> Self {
        self.spawn(|scope| match clause {
            Clause::Select => scope.select_values.clear(),
            Clause::Order => scope.order_values.clear(),
            Clause::Where => scope.where_values.clear(),
            Clause::Limit => scope.limit_value = None,
            Clause::Offset => scope.offset_value = None,
            Clause::From => scope.from_value = None,
        })
    }

    pub fn collection(&self) -> Arc<dyn Collection> {
        self.from_value
            .clone()
            .unwrap_or_else(|| self.model.collection())
    }

    /// The finder options accumulated so far.
    pub fn finder_options(&self) -> FinderOptions {
        let conditions = (!self.where_values.is_empty()).then(|| {
            self.where_values
                .iter()
                .fold(Conditions::new(), |mut merged, conditions| {
                    merged.merge(conditions);
                    merged
                })
        });
        FinderOptions {
            conditions,
            select: self.select_values.clone(),
            order: self.order_values.clone(),
            limit: self.limit_value,
            offset: self.offset_value,
        }
    }

    pub fn compile(&self) -> Result<CompiledQuery> {
        CompiledQuery::compile(self.model.properties(), &self.finder_options())
    }

    pub fn is_loaded(&self) -> bool {
        self.documents.get().is_some()
    }

    /// Execute the query once and return the cached records from then on.
    pub fn to_list(&self) -> Result<&[M::Record]> {
        if let Some(records) = self.documents.get() {
            trace!("scope on {} already loaded", self.model.name());
            return Ok(records);
        }
        self.documents
            .get_or_try_init(|| self.find_and_instantiate())
            .map(Vec::as_slice)
    }

    /// Count matching documents on the store. Never reads or fills the cache.
    pub fn count(&self) -> Result<u64> {
        let (collection, query) = self.prepare()?;
        debug!(
            "count on {}: selector {:?}, options {:?}",
            collection.name(),
            query.selector,
            query.options
        );
        collection
            .count(&query.selector, &query.options)
            .map_err(Error::Storage)
    }

    /// Number of records: the cached length when loaded, a store count otherwise.
    pub fn size(&self) -> Result<u64> {
        match self.documents.get() {
            Some(records) => Ok(records.len() as u64),
            None => self.count(),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.size()? == 0)
    }

    pub fn any(&self) -> Result<bool> {
        Ok(!self.is_empty()?)
    }

    /// Load the records and test `predicate` against them.
    pub fn any_by<F>(&self, predicate: F) -> Result<bool>
    where
        F: FnMut(&M::Record) -> bool,
    {
        Ok(self.to_list()?.iter().any(predicate))
    }

    /// Drop cached records and load them again.
    pub fn reload(&mut self) -> Result<&mut Self> {
        self.reset();
        self.to_list()?;
        Ok(self)
    }

    /// Drop cached records without executing.
    pub fn reset(&mut self) -> &mut Self {
        self.documents.take();
        self
    }

    /// The first record. An unloaded scope fetches a single record
    /// through a limited copy and stays unloaded.
    pub fn first(&self) -> Result<Option<M::Record>>
    where
        M::Record: Clone,
    {
        if let Some(records) = self.documents.get() {
            return Ok(records.first().cloned());
        }
        Ok(self.limit(1).into_records()?.into_iter().next())
    }

    /// The record with the given identity, if any.
    pub fn find(&self, id: impl Into<Value>) -> Result<Option<M::Record>>
    where
        M::Record: Clone,
    {
        self.where_((ID_PROPERTY, id.into())).first()
    }

    /// The first record whose `field` equals `value`.
    pub fn find_by(&self, field: &str, value: impl Into<Value>) -> Result<Option<M::Record>>
    where
        M::Record: Clone,
    {
        self.find_all_by(field, value).first()
    }

    /// A scope narrowed to records whose `field` equals `value`.
    pub fn find_all_by(&self, field: &str, value: impl Into<Value>) -> Self {
        self.where_((field, value.into()))
    }

    /// Whether any document matches. A loaded scope answers from its records;
    /// otherwise a single document is fetched and discarded, without counting
    /// or instantiating records.
    pub fn exists(&self) -> Result<bool> {
        if let Some(records) = self.documents.get() {
            return Ok(!records.is_empty());
        }
        let (collection, query) = self.limit(1).prepare()?;
        debug!(
            "exists on {}: selector {:?}, options {:?}",
            collection.name(),
            query.selector,
            query.options
        );
        let mut cursor = collection
            .find(&query.selector, &query.options)
            .map_err(Error::Storage)?;
        let first = cursor.next().transpose().map_err(Error::Storage)?;
        Ok(first.is_some())
    }

    pub fn last(&self) -> Result<Option<&M::Record>> {
        Ok(self.to_list()?.last())
    }

    pub fn get(&self, index: usize) -> Result<Option<&M::Record>> {
        Ok(self.to_list()?.get(index))
    }

    pub fn iter(&self) -> Result<std::slice::Iter<'_, M::Record>> {
        Ok(self.to_list()?.iter())
    }

    pub fn into_records(mut self) -> Result<Vec<M::Record>> {
        match self.documents.take() {
            Some(records) => Ok(records),
            None => self.find_and_instantiate(),
        }
    }

    fn prepare(&self) -> Result<(Arc<dyn Collection>, CompiledQuery)> {
        let query = self.compile()?;
        if !self.model.indexes_initialized() {
            debug!("initializing indexes for {}", self.model.name());
            self.model.ensure_indexes().map_err(Error::Model)?;
        }
        Ok((self.collection(), query))
    }

    fn find_and_instantiate(&self) -> Result<Vec<M::Record>> {
        let (collection, query) = self.prepare()?;
        debug!(
            "find on {}: selector {:?}, options {:?}",
            collection.name(),
            query.selector,
            query.options
        );
        let records = collection
            .find(&query.selector, &query.options)
            .map_err(Error::Storage)?
            .map(|document| {
                let document = document.map_err(Error::Storage)?;
                self.model.from_store(document).map_err(Error::Model)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("loaded {} records from {}", records.len(), collection.name());
        Ok(records)
    }
}

impl<M: Model> PartialEq for Scope<M> {
    /// Scopes are equal when they would run the same query, loaded or not.
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name()
            && self.model.properties() == other.model.properties()
            && self.collection().name() == other.collection().name()
            && self.finder_options() == other.finder_options()
    }
}

impl<M: Model> PartialEq<Vec<M::Record>> for Scope<M>
where
    M::Record: PartialEq,
{
    /// Loads the scope and compares its records. A failed load compares unequal.
    fn eq(&self, other: &Vec<M::Record>) -> bool {
        matches!(self.to_list(), Ok(records) if records == other.as_slice())
    }
}
