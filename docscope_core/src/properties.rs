use bson::Document;

use crate::types::{PropertyType, TypeRegistry};
use crate::value::{Attributes, Value};

/// Logical name of the identity property.
pub const ID_PROPERTY: &str = "id";
/// Name the identity property is stored under.
pub const ID_FIELD: &str = "_id";

/// A declared model property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    /// Field name in the stored document.
    pub stored_as: String,
    pub ty: PropertyType,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        let name = name.into();
        Self {
            stored_as: name.clone(),
            name,
            ty,
        }
    }

    pub fn stored_as(mut self, field: impl Into<String>) -> Self {
        self.stored_as = field.into();
        self
    }
}

/// The declared properties of a model, in declaration order.
/// Always contains the identity property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Properties {
    properties: Vec<Property>,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            properties: vec![Property::new(ID_PROPERTY, PropertyType::Any).stored_as(ID_FIELD)],
        }
    }
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a property, replacing an earlier one with the same name.
    pub fn with(mut self, property: Property) -> Self {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
        self
    }

    /// Shorthand for declaring a property stored under its own name.
    pub fn property(self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.with(Property::new(name, ty))
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Physical field name for a logical one. Unknown names pass through.
    pub fn resolve<'a>(&'a self, field: &'a str) -> &'a str {
        self.get(field).map_or(field, |p| p.stored_as.as_str())
    }

    pub fn property_type(&self, field: &str) -> Option<&PropertyType> {
        self.get(field).map(|p| &p.ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Read a stored document into attributes using the global registry.
    pub fn load(&self, document: &Document) -> Attributes {
        self.load_with(TypeRegistry::global(), document)
    }

    /// Read a stored document into attributes.
    /// Undeclared fields are kept under their stored name with generic conversion.
    pub fn load_with(&self, registry: &TypeRegistry, document: &Document) -> Attributes {
        document
            .iter()
            .map(|(field, value)| {
                match self.properties.iter().find(|p| p.stored_as == *field) {
                    Some(property) => (
                        property.name.clone(),
                        registry.converter_for(&property.ty).from_store(value),
                    ),
                    None => (field.clone(), Value::from_bson(value)),
                }
            })
            .collect()
    }

    /// Serialize attributes into a document using the global registry.
    pub fn dump(&self, attributes: &Attributes) -> Document {
        self.dump_with(TypeRegistry::global(), attributes)
    }

    /// Serialize attributes into a document.
    /// Declared properties come first, in declaration order; the rest follow.
    pub fn dump_with(&self, registry: &TypeRegistry, attributes: &Attributes) -> Document {
        let mut document = Document::new();
        for property in &self.properties {
            if let Some(value) = attributes.get(&property.name) {
                document.insert(
                    property.stored_as.clone(),
                    registry.converter_for(&property.ty).to_store(value),
                );
            }
        }
        for (name, value) in attributes {
            if self.get(name).is_none() {
                document.insert(name.clone(), value.to_bson());
            }
        }
        document
    }
}
