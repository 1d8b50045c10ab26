use bson::{Bson, Document};
use tracing::{debug, trace};

use crate::conditions::{ConditionKey, Conditions};
use crate::error::Result;
use crate::operator::Operator;
use crate::order::{normalize, OrderSpec, OrderTerm};
use crate::properties::Properties;
use crate::types::TypeRegistry;
use crate::value::Value;

pub const SKIP: &str = "skip";
pub const LIMIT: &str = "limit";
pub const FIELDS: &str = "fields";
pub const SORT: &str = "sort";

/// Declarative finder options. Every part is optional; empty parts are left
/// out of the compiled query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinderOptions {
    pub conditions: Option<Conditions>,
    pub select: Vec<String>,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl FinderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conditions(mut self, conditions: impl Into<Conditions>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub fn with_select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_order(mut self, order: impl Into<OrderSpec>) -> Self {
        self.order = order.into().into_terms();
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A selector plus execution options, ready for the storage collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    pub selector: Document,
    pub options: Document,
}

impl CompiledQuery {
    /// Compile finder options against a model's properties using the global registry.
    pub fn compile(properties: &Properties, options: &FinderOptions) -> Result<Self> {
        Self::compile_with(TypeRegistry::global(), properties, options)
    }

    pub fn compile_with(
        registry: &TypeRegistry,
        properties: &Properties,
        options: &FinderOptions,
    ) -> Result<Self> {
        let selector = match &options.conditions {
            Some(conditions) => build_selector(registry, properties, conditions)?,
            None => Document::new(),
        };

        let mut compiled = Document::new();
        if let Some(offset) = options.offset {
            compiled.insert(SKIP, to_count(SKIP, offset));
        }
        if let Some(limit) = options.limit {
            compiled.insert(LIMIT, to_count(LIMIT, limit));
        }
        if !options.select.is_empty() {
            compiled.insert(FIELDS, options.select.clone());
        }
        let sort = build_sort(properties, &options.order)?;
        if !sort.is_empty() {
            compiled.insert(SORT, sort);
        }

        trace!("compiled selector: {selector:?}, options: {compiled:?}");
        Ok(Self {
            selector,
            options: compiled,
        })
    }

    pub fn into_parts(self) -> (Document, Document) {
        (self.selector, self.options)
    }
}

// The store takes signed counts; larger values are capped.
fn to_count(key: &str, n: u64) -> Bson {
    Bson::Int64(i64::try_from(n).unwrap_or_else(|_| {
        debug!("{key} {n} exceeds the store's range, capped at {}", i64::MAX);
        i64::MAX
    }))
}

fn build_selector(
    registry: &TypeRegistry,
    properties: &Properties,
    conditions: &Conditions,
) -> Result<Document> {
    let mut selector = Document::new();
    for (key, value) in conditions.iter() {
        let field = properties.resolve(key.field()).to_string();
        let value = match key {
            ConditionKey::Field(name) => serialize(registry, properties, name, value),
            ConditionKey::Operator(op) => {
                let operand = serialize_operand(registry, properties, op, value);
                Bson::Document(op.to_selector_fragment(operand)?)
            }
        };
        selector.insert(field, value);
    }
    Ok(selector)
}

fn serialize(
    registry: &TypeRegistry,
    properties: &Properties,
    field: &str,
    value: &Value,
) -> Bson {
    match properties.property_type(field) {
        Some(ty) => registry.converter_for(ty).to_store(value),
        None => value.to_bson(),
    }
}

fn serialize_operand(
    registry: &TypeRegistry,
    properties: &Properties,
    op: &Operator,
    value: &Value,
) -> Bson {
    let comparator = op.comparator();
    if comparator.takes_literal() {
        return value.to_bson();
    }
    match value {
        Value::Array(items) if comparator.takes_list() => Bson::Array(
            items
                .iter()
                .map(|item| serialize(registry, properties, op.field(), item))
                .collect(),
        ),
        other => serialize(registry, properties, op.field(), other),
    }
}

fn build_sort(properties: &Properties, order: &[OrderTerm]) -> Result<Vec<Bson>> {
    Ok(normalize(order)?
        .into_iter()
        .map(|sort| {
            Bson::Array(vec![
                Bson::String(properties.resolve(&sort.field).to_string()),
                Bson::String(sort.direction.as_str().to_string()),
            ])
        })
        .collect())
}
