use bson::Bson;

use super::Converter;
use crate::value::Value;

/// Stores untyped values as they are.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectConverter;

impl Converter for ObjectConverter {
    fn to_store(&self, value: &Value) -> Bson {
        value.to_bson()
    }

    fn from_store(&self, value: &Bson) -> Value {
        Value::from_bson(value)
    }
}

/// Fallback for a named type that has no dedicated converter.
/// Values pass through the generic conversion unchanged.
#[derive(Debug, Clone)]
pub struct CustomConverter {
    type_name: String,
}

impl CustomConverter {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl Converter for CustomConverter {
    fn to_store(&self, value: &Value) -> Bson {
        value.to_bson()
    }

    fn from_store(&self, value: &Bson) -> Value {
        Value::from_bson(value)
    }
}
