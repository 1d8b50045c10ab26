use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use bson::{oid::ObjectId, Bson, Document};
use docscope_core::{Collection, Direction, DocumentCursor, ID_FIELD};
use tracing::{debug, trace};

use crate::compare::{as_i64, sort_order};
use crate::error::{Error, Result};
use crate::matcher::{lookup, matches};

/// Find options decoded from an options document.
#[derive(Debug, Clone, Default, PartialEq)]
struct FindOptions {
    skip: usize,
    /// Zero means no limit.
    limit: usize,
    fields: Vec<String>,
    sort: Vec<(String, Direction)>,
}

impl FindOptions {
    fn parse(options: &Document) -> Result<Self> {
        let mut parsed = FindOptions::default();
        for (key, value) in options {
            match key.as_str() {
                "skip" => parsed.skip = count(key, value)?,
                "limit" => parsed.limit = count(key, value)?,
                "fields" => {
                    parsed.fields = match value {
                        Bson::Array(fields) => fields
                            .iter()
                            .map(|f| match f {
                                Bson::String(s) => Ok(s.clone()),
                                other => Err(Error::InvalidOptions(format!(
                                    "field name must be a string, got {other}"
                                ))),
                            })
                            .collect::<Result<_>>()?,
                        other => {
                            return Err(Error::InvalidOptions(format!(
                                "fields must be an array, got {other}"
                            )))
                        }
                    }
                }
                "sort" => parsed.sort = sort_fields(value)?,
                unknown => {
                    return Err(Error::InvalidOptions(format!("unknown option {unknown}")))
                }
            }
        }
        Ok(parsed)
    }
}

fn count(key: &str, value: &Bson) -> Result<usize> {
    as_i64(value)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            Error::InvalidOptions(format!("{key} must be a non-negative integer, got {value}"))
        })
}

fn sort_fields(value: &Bson) -> Result<Vec<(String, Direction)>> {
    let invalid = || Error::InvalidOptions(format!("malformed sort {value}"));
    let Bson::Array(pairs) = value else {
        return Err(invalid());
    };
    pairs
        .iter()
        .map(|pair| match pair {
            Bson::Array(pair) => match pair.as_slice() {
                [Bson::String(field), Bson::String(direction)] => Direction::parse(direction)
                    .map(|d| (field.clone(), d))
                    .ok_or_else(invalid),
                [Bson::String(field), direction] => match as_i64(direction) {
                    Some(1) => Ok((field.clone(), Direction::Ascending)),
                    Some(-1) => Ok((field.clone(), Direction::Descending)),
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        })
        .collect()
}

fn project(document: Document, fields: &[String]) -> Document {
    if fields.is_empty() {
        return document;
    }
    let mut projected = Document::new();
    if let Some(id) = document.get(ID_FIELD) {
        projected.insert(ID_FIELD, id.clone());
    }
    for field in fields {
        if let Some(value) = document.get(field) {
            projected.insert(field.clone(), value.clone());
        }
    }
    projected
}

/// A named, thread-safe collection of documents held in memory.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
    finds: AtomicUsize,
    counts: AtomicUsize,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
            finds: AtomicUsize::new(0),
            counts: AtomicUsize::new(0),
        }
    }

    /// Store a document, assigning an `_id` when it has none. Returns the id.
    pub fn insert(&self, mut document: Document) -> Bson {
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            }
        };
        trace!("insert into {}: {document:?}", self.name);
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(document);
        id
    }

    pub fn insert_many(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Bson> {
        documents.into_iter().map(|d| self.insert(d)).collect()
    }

    /// Remove every document matching `selector`. Returns how many were removed.
    pub fn remove(&self, selector: &Document) -> Result<usize> {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = documents.len();
        let mut failure = None;
        documents.retain(|d| match matches(d, selector) {
            Ok(matched) => !matched,
            Err(e) => {
                failure.get_or_insert(e);
                true
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(before - documents.len()),
        }
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `find` round-trips served so far.
    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    /// Number of `count` round-trips served so far.
    pub fn count_calls(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }

    fn matching(&self, selector: &Document) -> Result<Vec<Document>> {
        let documents = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut matched = Vec::new();
        for document in documents.iter() {
            if matches(document, selector)? {
                matched.push(document.clone());
            }
        }
        Ok(matched)
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, selector: &Document, options: &Document) -> anyhow::Result<DocumentCursor<'_>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        let options = FindOptions::parse(options)?;
        let mut matched = self.matching(selector)?;

        if !options.sort.is_empty() {
            matched.sort_by(|a, b| {
                options
                    .sort
                    .iter()
                    .map(|(field, direction)| {
                        let ordering = sort_order(lookup(a, field), lookup(b, field));
                        match direction {
                            Direction::Ascending => ordering,
                            Direction::Descending => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        debug!(
            "find on {}: {} matched, skip {}, limit {}",
            self.name,
            matched.len(),
            options.skip,
            options.limit
        );

        let limit = if options.limit == 0 {
            usize::MAX
        } else {
            options.limit
        };
        let fields = options.fields;
        Ok(Box::new(
            matched
                .into_iter()
                .skip(options.skip)
                .take(limit)
                .map(move |document| Ok::<_, anyhow::Error>(project(document, &fields))),
        ))
    }

    /// Counts every match; skip and limit are ignored.
    fn count(&self, selector: &Document, options: &Document) -> anyhow::Result<u64> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        FindOptions::parse(options)?;
        let count = self.matching(selector)?.len() as u64;
        debug!("count on {}: {count}", self.name);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    fn cities() -> MemoryCollection {
        let collection = MemoryCollection::new("cities");
        collection.insert_many([
            doc! { "_id": 1, "name": "Delft", "population": 104_000, "country": "NL" },
            doc! { "_id": 2, "name": "Utrecht", "population": 361_000, "country": "NL" },
            doc! { "_id": 3, "name": "Leuven", "population": 102_000, "country": "BE" },
            doc! { "_id": 4, "name": "Ghent", "population": 265_000, "country": "BE" },
        ]);
        collection
    }

    fn names(cursor: DocumentCursor<'_>) -> anyhow::Result<Vec<String>> {
        cursor
            .map(|d| Ok::<_, anyhow::Error>(d?.get_str("name")?.to_string()))
            .collect()
    }

    #[test]
    fn test_find_sorts_skips_and_limits() -> anyhow::Result<()> {
        let collection = cities();
        let cursor = collection.find(
            &doc! { "population": { "$gt": 103_000 } },
            &doc! { "sort": [["population", "descending"]], "skip": 1_i64, "limit": 1_i64 },
        )?;
        assert_eq!(names(cursor)?, vec!["Ghent"]);
        Ok(())
    }

    #[test]
    fn test_sort_on_several_fields() -> anyhow::Result<()> {
        let collection = cities();
        let cursor = collection.find(
            &doc! {},
            &doc! { "sort": [["country", "ascending"], ["name", "descending"]] },
        )?;
        assert_eq!(names(cursor)?, vec!["Leuven", "Ghent", "Utrecht", "Delft"]);
        Ok(())
    }

    #[test]
    fn test_fields_projection_keeps_id() -> anyhow::Result<()> {
        let collection = cities();
        let mut cursor = collection.find(&doc! { "_id": 3 }, &doc! { "fields": ["name"] })?;
        assert_eq!(cursor.next().transpose()?, Some(doc! { "_id": 3, "name": "Leuven" }));
        assert!(cursor.next().is_none());
        Ok(())
    }

    #[test]
    fn test_count_ignores_skip_and_limit() -> anyhow::Result<()> {
        let collection = cities();
        let count = collection.count(
            &doc! { "country": "NL" },
            &doc! { "skip": 1_i64, "limit": 1_i64 },
        )?;
        assert_eq!(count, 2);
        assert_eq!(collection.count_calls(), 1);
        assert_eq!(collection.find_calls(), 0);
        Ok(())
    }

    #[test]
    fn test_insert_assigns_ids_and_remove() -> Result<()> {
        let collection = MemoryCollection::new("things");
        let id = collection.insert(doc! { "kind": "a" });
        assert!(matches!(id, Bson::ObjectId(_)));
        collection.insert(doc! { "kind": "b" });
        assert_eq!(collection.remove(&doc! { "kind": "a" })?, 1);
        assert_eq!(collection.len(), 1);
        Ok(())
    }

    #[test]
    fn test_mod_with_negative_divisor_on_min_value() -> anyhow::Result<()> {
        let collection = MemoryCollection::new("numbers");
        collection.insert(doc! { "_id": 1, "n": i64::MIN });
        let count = collection.count(&doc! { "n": { "$mod": [-1_i64, 0_i64] } }, &doc! {})?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[test]
    fn test_rejects_malformed_options() {
        let collection = cities();
        assert!(collection.find(&doc! {}, &doc! { "sort": [["name", "sideways"]] }).is_err());
        assert!(collection.find(&doc! {}, &doc! { "limit": -1 }).is_err());
        assert!(collection.find(&doc! {}, &doc! { "hint": "name" }).is_err());
        assert!(collection.count(&doc! { "name": { "$bogus": 1 } }, &doc! {}).is_err());
    }
}
