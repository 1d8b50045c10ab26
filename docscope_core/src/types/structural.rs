use std::sync::Arc;

use bson::{Bson, Document};

use super::Converter;
use crate::value::Value;

/// Applies an inner converter to every element of an array.
#[derive(Debug, Clone)]
pub struct ArrayConverter {
    inner: Arc<dyn Converter>,
}

impl ArrayConverter {
    pub fn new(inner: Arc<dyn Converter>) -> Self {
        Self { inner }
    }
}

impl Converter for ArrayConverter {
    fn to_store(&self, value: &Value) -> Bson {
        match value {
            Value::Array(items) => {
                Bson::Array(items.iter().map(|item| self.inner.to_store(item)).collect())
            }
            other => other.to_bson(),
        }
    }

    fn from_store(&self, value: &Bson) -> Value {
        match value {
            Bson::Array(items) => {
                Value::Array(items.iter().map(|item| self.inner.from_store(item)).collect())
            }
            other => Value::from_bson(other),
        }
    }
}

/// Applies an inner converter to every value of a string-keyed map.
#[derive(Debug, Clone)]
pub struct MapConverter {
    inner: Arc<dyn Converter>,
}

impl MapConverter {
    pub fn new(inner: Arc<dyn Converter>) -> Self {
        Self { inner }
    }
}

impl Converter for MapConverter {
    fn to_store(&self, value: &Value) -> Bson {
        match value {
            Value::Map(map) => Bson::Document(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.inner.to_store(v)))
                    .collect::<Document>(),
            ),
            other => other.to_bson(),
        }
    }

    fn from_store(&self, value: &Bson) -> Value {
        match value {
            Bson::Document(doc) => Value::Map(
                doc.iter()
                    .map(|(k, v)| (k.clone(), self.inner.from_store(v)))
                    .collect(),
            ),
            other => Value::from_bson(other),
        }
    }
}
