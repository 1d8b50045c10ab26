use std::collections::BTreeMap;

use bson::{Bson, Document};
use chrono::{DateTime, NaiveDate, Utc};

/// Format used for dates stored as strings.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Named native values of a record, keyed by property name.
pub type Attributes = BTreeMap<String, Value>;

/// A native value as seen by models, before it is serialized for the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Symbol(String),
    Date(NaiveDate),
    Time(DateTime<Utc>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A store value without a native counterpart.
    Raw(Bson),
}

impl Value {
    /// Generic conversion into the store representation.
    pub fn to_bson(&self) -> Bson {
        match self {
            Value::Null => Bson::Null,
            Value::String(s) | Value::Symbol(s) => Bson::String(s.clone()),
            Value::Integer(i) => Bson::Int64(*i),
            Value::Float(f) => Bson::Double(*f),
            Value::Boolean(b) => Bson::Boolean(*b),
            Value::Date(d) => Bson::String(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) => Bson::DateTime(bson::DateTime::from_chrono(*t)),
            Value::Array(items) => Bson::Array(items.iter().map(Value::to_bson).collect()),
            Value::Map(map) => Bson::Document(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_bson()))
                    .collect::<Document>(),
            ),
            Value::Raw(raw) => raw.clone(),
        }
    }

    /// Generic conversion from the store representation.
    pub fn from_bson(value: &Bson) -> Value {
        match value {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::String(s) => Value::String(s.clone()),
            Bson::Symbol(s) => Value::Symbol(s.clone()),
            Bson::Int32(i) => Value::Integer(i64::from(*i)),
            Bson::Int64(i) => Value::Integer(*i),
            Bson::Double(f) => Value::Float(*f),
            Bson::Boolean(b) => Value::Boolean(*b),
            Bson::DateTime(dt) => Value::Time(dt.to_chrono()),
            Bson::Array(items) => Value::Array(items.iter().map(Value::from_bson).collect()),
            Bson::Document(doc) => Value::Map(
                doc.iter()
                    .map(|(k, v)| (k.clone(), Value::from_bson(v)))
                    .collect(),
            ),
            other => Value::Raw(other.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
