use crate::operator::Operator;
use crate::value::Value;

/// The left-hand side of a condition: a plain field (equality) or an operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConditionKey {
    Field(String),
    Operator(Operator),
}

impl ConditionKey {
    /// The logical field the condition applies to.
    pub fn field(&self) -> &str {
        match self {
            ConditionKey::Field(field) => field,
            ConditionKey::Operator(op) => op.field(),
        }
    }
}

impl From<&str> for ConditionKey {
    fn from(field: &str) -> Self {
        ConditionKey::Field(field.to_string())
    }
}

impl From<String> for ConditionKey {
    fn from(field: String) -> Self {
        ConditionKey::Field(field)
    }
}

impl From<Operator> for ConditionKey {
    fn from(op: Operator) -> Self {
        ConditionKey::Operator(op)
    }
}

/// An insertion-ordered set of conditions, implicitly AND-combined.
///
/// Re-inserting an existing key replaces its value in place, so merging
/// condition sets left to right keeps the first position and the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<(ConditionKey, Value)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Conditions::insert`].
    pub fn with(mut self, key: impl Into<ConditionKey>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<ConditionKey>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &ConditionKey) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Merge `other` into self; its entries win on equal keys.
    pub fn merge(&mut self, other: &Conditions) {
        for (key, value) in &other.entries {
            self.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ConditionKey, Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<ConditionKey>, V: Into<Value>> From<(K, V)> for Conditions {
    fn from((key, value): (K, V)) -> Self {
        Conditions::new().with(key, value)
    }
}

impl<K: Into<ConditionKey>, V: Into<Value>> FromIterator<(K, V)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut conditions = Conditions::new();
        for (key, value) in iter {
            conditions.insert(key, value);
        }
        conditions
    }
}
