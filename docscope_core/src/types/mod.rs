//! Converters between native [`Value`]s and the store's [`Bson`] representation.
//!
//! A [`TypeRegistry`] maps a declared [`PropertyType`] to its [`Converter`].
//! Scalar types, untyped arrays/maps and `Any` are registered up front. Every
//! other type (typed collections, custom types) gets a converter synthesized on
//! the first lookup, which is then cached under that type.
//!
//! The cache only ever grows. Insertion is not atomic with the lookup: two
//! threads missing on the same type at once may both build a converter, and
//! the later insert wins. Both converters behave the same, so callers never
//! observe the difference.

mod custom;
mod primitive;
mod structural;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use bson::Bson;
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::value::Value;

pub use custom::{CustomConverter, ObjectConverter};
pub use primitive::{
    BooleanConverter, DateConverter, FloatConverter, IntegerConverter, StringConverter,
    SymbolConverter, TimeConverter,
};
pub use structural::{ArrayConverter, MapConverter};

/// The declared type of a model property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Boolean,
    Symbol,
    Date,
    Time,
    Array(Box<PropertyType>),
    Map(Box<PropertyType>),
    /// Untyped value, stored as is.
    Any,
    /// A named type without a dedicated converter.
    Custom(String),
}

impl PropertyType {
    pub fn array_of(inner: PropertyType) -> Self {
        PropertyType::Array(Box::new(inner))
    }

    pub fn map_of(inner: PropertyType) -> Self {
        PropertyType::Map(Box::new(inner))
    }

    pub fn custom(name: impl Into<String>) -> Self {
        PropertyType::Custom(name.into())
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::String => write!(f, "String"),
            PropertyType::Integer => write!(f, "Integer"),
            PropertyType::Float => write!(f, "Float"),
            PropertyType::Boolean => write!(f, "Boolean"),
            PropertyType::Symbol => write!(f, "Symbol"),
            PropertyType::Date => write!(f, "Date"),
            PropertyType::Time => write!(f, "Time"),
            PropertyType::Array(inner) => write!(f, "Array<{inner}>"),
            PropertyType::Map(inner) => write!(f, "Map<{inner}>"),
            PropertyType::Any => write!(f, "Any"),
            PropertyType::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Serializes native values for the store and reads them back.
///
/// Converters never fail. A value of an unexpected shape is a caller bug; it is
/// converted on a best-effort basis rather than reported.
pub trait Converter: fmt::Debug + Send + Sync {
    fn to_store(&self, value: &Value) -> Bson;

    fn from_store(&self, value: &Bson) -> Value;
}

static GLOBAL: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

/// Registry of converters keyed by property type.
#[derive(Debug)]
pub struct TypeRegistry {
    converters: RwLock<HashMap<PropertyType, Arc<dyn Converter>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry holding only the built-in converters.
    pub fn new() -> Self {
        let mut converters: HashMap<PropertyType, Arc<dyn Converter>> = HashMap::new();
        converters.insert(PropertyType::String, Arc::new(StringConverter));
        converters.insert(PropertyType::Integer, Arc::new(IntegerConverter));
        converters.insert(PropertyType::Float, Arc::new(FloatConverter));
        converters.insert(PropertyType::Boolean, Arc::new(BooleanConverter));
        converters.insert(PropertyType::Symbol, Arc::new(SymbolConverter));
        converters.insert(PropertyType::Date, Arc::new(DateConverter));
        converters.insert(PropertyType::Time, Arc::new(TimeConverter));
        converters.insert(PropertyType::Any, Arc::new(ObjectConverter));

        let object: Arc<dyn Converter> = Arc::new(ObjectConverter);
        converters.insert(
            PropertyType::array_of(PropertyType::Any),
            Arc::new(ArrayConverter::new(object.clone())),
        );
        converters.insert(
            PropertyType::map_of(PropertyType::Any),
            Arc::new(MapConverter::new(object)),
        );

        Self {
            converters: RwLock::new(converters),
        }
    }

    /// The process-wide registry, built on first use and never dropped.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL
    }

    /// Return the converter for `ty`, synthesizing and caching one on a miss.
    pub fn converter_for(&self, ty: &PropertyType) -> Arc<dyn Converter> {
        if let Some(converter) = self
            .converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty)
        {
            trace!("converter cache hit for {ty}");
            return converter.clone();
        }

        // The lock is released here: structural types resolve their inner
        // converter through this registry.
        let converter = self.synthesize(ty);
        debug!("synthesized converter for {ty}: {converter:?}");
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ty.clone(), converter.clone());
        converter
    }

    /// Number of cached converters, built-ins included.
    pub fn len(&self) -> usize {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, ty: &PropertyType) -> bool {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(ty)
    }

    fn synthesize(&self, ty: &PropertyType) -> Arc<dyn Converter> {
        match ty {
            PropertyType::Array(inner) => Arc::new(ArrayConverter::new(self.converter_for(inner))),
            PropertyType::Map(inner) => Arc::new(MapConverter::new(self.converter_for(inner))),
            other => Arc::new(CustomConverter::new(other.to_string())),
        }
    }
}
