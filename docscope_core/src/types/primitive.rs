use bson::Bson;
use chrono::{DateTime, NaiveDate, Utc};

use super::Converter;
use crate::value::{Value, DATE_FORMAT};

#[derive(Debug, Default, Clone, Copy)]
pub struct StringConverter;

impl Converter for StringConverter {
    fn to_store(&self, value: &Value) -> Bson {
        match value {
            Value::Null => Bson::Null,
            Value::String(s) | Value::Symbol(s) => Bson::String(s.clone()),
            Value::Integer(i) => Bson::String(i.to_string()),
            Value::Float(f) => Bson::String(f.to_string()),
            Value::Boolean(b) => Bson::String(b.to_string()),
            Value::Date(d) => Bson::String(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) => Bson::String(t.to_rfc3339()),
            other => other.to_bson(),
        }
    }

    fn from_store(&self, value: &Bson) -> Value {
        match value {
            Bson::String(s) | Bson::Symbol(s) => Value::String(s.clone()),
            Bson::Int32(i) => Value::String(i.to_string()),
            Bson::Int64(i) => Value::String(i.to_string()),
            Bson::Double(f) => Value::String(f.to_string()),
            Bson::Boolean(b) => Value::String(b.to_string()),
            other => Value::from_bson(other),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerConverter;

impl IntegerConverter {
    fn parse(s: &str) -> Option<i64> {
        let s = s.trim();
        s.parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
    }
}

impl Converter for IntegerConverter {
    fn to_store(&self, value: &Value) -> Bson {
        match value {
            Value::Integer(i) => Bson::Int64(*i),
            Value::Float(f) => Bson::Int64(*f as i64),
            Value::String(s) => Self::parse(s).map_or(Bson::Null, Bson::Int64),
            Value::Null => Bson::Null,
            other => other.to_bson(),
        }
    }

    fn from_store(&self, value: &Bson) -> Value {
        match value {
            Bson::Int32(i) => Value::Integer(i64::from(*i)),
            Bson::Int64(i) => Value::Integer(*i),
            Bson::Double(f) => Value::Integer(*f as i64),
            other => Value::from_bson(other),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FloatConverter;

impl Converter for FloatConverter {
    fn to_store(&self, value: &Value) -> Bson {
        match value {
            Value::Float(f) => Bson::Double(*f),
            Value::Integer(i) => Bson::Double(*i as f64),
            Value::String(s) => s.trim().parse::<f64>().map_or(Bson::Null, Bson::Double),
            Value::Null => Bson::Null,
            other => other.to_bson(),
        }
    }

    fn from_store(&self, value: &Bson) -> Value {
        match value {
            Bson::Double(f) => Value::Float(*f),
            Bson::Int32(i) => Value::Float(f64::from(*i)),
            Bson::Int64(i) => Value::Float(*i as f64),
            other => Value::from_bson(other),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanConverter;

impl BooleanConverter {
    fn coerce(value: &Value) -> Option<bool> {
        match value {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
                "false" | "f" | "0" | "no" | "n" | "off" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Converter for BooleanConverter {
    fn to_store(&self, value: &Value) -> Bson {
        Self::coerce(value).map_or(Bson::Null, Bson::Boolean)
    }

    fn from_store(&self, value: &Bson) -> Value {
        let value = Value::from_bson(value);
        Self::coerce(&value).map_or(value, Value::Boolean)
    }
}

/// Symbols are stored as plain strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolConverter;

impl Converter for SymbolConverter {
    fn to_store(&self, value: &Value) -> Bson {
        match value {
            Value::Symbol(s) | Value::String(s) => Bson::String(s.clone()),
            other => other.to_bson(),
        }
    }

    fn from_store(&self, value: &Bson) -> Value {
        match value {
            Bson::String(s) | Bson::Symbol(s) => Value::Symbol(s.clone()),
            other => Value::from_bson(other),
        }
    }
}

/// Dates are stored as `YYYY-MM-DD` strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateConverter;

impl Converter for DateConverter {
    fn to_store(&self, value: &Value) -> Bson {
        match value {
            Value::Date(d) => Bson::String(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) => Bson::String(t.date_naive().format(DATE_FORMAT).to_string()),
            Value::String(s) => match NaiveDate::parse_from_str(s.trim(), DATE_FORMAT) {
                Ok(d) => Bson::String(d.format(DATE_FORMAT).to_string()),
                Err(_) => Bson::String(s.clone()),
            },
            other => other.to_bson(),
        }
    }

    fn from_store(&self, value: &Bson) -> Value {
        match value {
            Bson::String(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map_or_else(|_| Value::String(s.clone()), Value::Date),
            Bson::DateTime(dt) => Value::Date(dt.to_chrono().date_naive()),
            other => Value::from_bson(other),
        }
    }
}

/// Times are stored as UTC datetimes with millisecond precision.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeConverter;

impl Converter for TimeConverter {
    fn to_store(&self, value: &Value) -> Bson {
        match value {
            Value::Time(t) => Bson::DateTime(bson::DateTime::from_chrono(*t)),
            Value::Date(d) => match d.and_hms_opt(0, 0, 0) {
                Some(midnight) => {
                    Bson::DateTime(bson::DateTime::from_chrono(midnight.and_utc()))
                }
                None => Bson::Null,
            },
            Value::String(s) => match DateTime::parse_from_rfc3339(s.trim()) {
                Ok(t) => Bson::DateTime(bson::DateTime::from_chrono(t.with_timezone(&Utc))),
                Err(_) => Bson::String(s.clone()),
            },
            other => other.to_bson(),
        }
    }

    fn from_store(&self, value: &Bson) -> Value {
        match value {
            Bson::DateTime(dt) => Value::Time(dt.to_chrono()),
            Bson::String(s) => DateTime::parse_from_rfc3339(s).map_or_else(
                |_| Value::String(s.clone()),
                |t| Value::Time(t.with_timezone(&Utc)),
            ),
            other => Value::from_bson(other),
        }
    }
}
