use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use bson::{doc, Document};
use docscope_core::{
    Clause, Collection, DocumentCursor, Error, FinderOptions, Model, Operator, OrderTerm, Properties,
    PropertyType, Scope,
};
use pretty_assertions::assert_eq;
use serde::Deserialize;

#[derive(Debug, Default)]
struct RecordingCollection {
    name: String,
    documents: Vec<Document>,
    finds: Mutex<Vec<(Document, Document)>>,
    counts: AtomicUsize,
    unreachable: bool,
}

impl RecordingCollection {
    fn new(name: &str, documents: Vec<Document>) -> Self {
        Self {
            name: name.to_string(),
            documents,
            ..Default::default()
        }
    }

    fn find_calls(&self) -> usize {
        self.finds.lock().unwrap().len()
    }

    fn last_find(&self) -> (Document, Document) {
        self.finds.lock().unwrap().last().cloned().unwrap()
    }

    fn count_calls(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }
}

impl Collection for RecordingCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, selector: &Document, options: &Document) -> Result<DocumentCursor<'_>> {
        if self.unreachable {
            anyhow::bail!("connection refused");
        }
        self.finds
            .lock()
            .unwrap()
            .push((selector.clone(), options.clone()));
        let limit = options.get_i64("limit").map_or(usize::MAX, |l| l as usize);
        Ok(Box::new(
            self.documents
                .iter()
                .take(limit)
                .cloned()
                .map(Ok::<_, anyhow::Error>),
        ))
    }

    fn count(&self, _selector: &Document, _options: &Document) -> Result<u64> {
        if self.unreachable {
            anyhow::bail!("connection refused");
        }
        self.counts.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Person {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    age: i64,
}

struct People {
    collection: Arc<RecordingCollection>,
    properties: Properties,
    indexed: AtomicBool,
    index_calls: AtomicUsize,
}

impl Model for People {
    type Record = Person;

    fn name(&self) -> &str {
        "Person"
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn collection(&self) -> Arc<dyn Collection> {
        self.collection.clone()
    }

    fn indexes_initialized(&self) -> bool {
        self.indexed.load(Ordering::SeqCst)
    }

    fn ensure_indexes(&self) -> Result<()> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.indexed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn from_store(&self, document: Document) -> Result<Person> {
        Ok(bson::from_document(document)?)
    }
}

fn people_in(collection: RecordingCollection) -> (Arc<People>, Arc<RecordingCollection>) {
    let collection = Arc::new(collection);
    let model = Arc::new(People {
        collection: collection.clone(),
        properties: Properties::new()
            .property("name", PropertyType::String)
            .property("age", PropertyType::Integer),
        indexed: AtomicBool::new(false),
        index_calls: AtomicUsize::new(0),
    });
    (model, collection)
}

fn people() -> (Arc<People>, Arc<RecordingCollection>) {
    people_in(RecordingCollection::new(
        "people",
        vec![
            doc! { "_id": "1", "name": "Ada", "age": 36_i64 },
            doc! { "_id": "2", "name": "Grace", "age": 85_i64 },
            doc! { "_id": "3", "name": "Edsger", "age": 72_i64 },
        ],
    ))
}

#[test]
fn test_to_list_executes_once() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model);

    let first = scope.to_list()?.to_vec();
    let second = scope.to_list()?.to_vec();

    assert_eq!(collection.find_calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!(scope.is_loaded());
    Ok(())
}

#[test]
fn test_chaining_leaves_receiver_untouched() -> Result<()> {
    let (model, collection) = people();
    let base = Scope::new(model);
    base.to_list()?;

    let derived = base
        .where_(("age", 36))
        .order("name DESC")
        .select(["name"])
        .limit(2)
        .offset(1);

    assert!(base.is_loaded());
    assert!(!derived.is_loaded());
    assert_eq!(base.finder_options(), FinderOptions::default());
    assert_eq!(base.to_list()?.len(), 3);
    assert_eq!(collection.find_calls(), 1);

    derived.to_list()?;
    assert_eq!(collection.find_calls(), 2);
    assert_eq!(
        collection.last_find(),
        (
            doc! { "age": 36_i64 },
            doc! {
                "skip": 1_i64,
                "limit": 2_i64,
                "fields": ["name"],
                "sort": [["name", "descending"]],
            }
        )
    );
    Ok(())
}

#[test]
fn test_where_fragments_merge_left_to_right() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model)
        .where_(("age", 18))
        .where_((Operator::gt("id"), "0"))
        .where_(("age", 21))
        .order(OrderTerm::desc("id"))
        .limit(5);

    scope.to_list()?;
    assert_eq!(
        collection.last_find(),
        (
            doc! { "age": 21_i64, "_id": { "$gt": "0" } },
            doc! { "limit": 5_i64, "sort": [["_id", "descending"]] }
        )
    );
    Ok(())
}

#[test]
fn test_single_value_clauses_last_write_wins() {
    let (model, _) = people();
    let scope = Scope::new(model).limit(5).offset(2).limit(7);
    let options = scope.finder_options();
    assert_eq!(options.limit, Some(7));
    assert_eq!(options.offset, Some(2));
}

#[test]
fn test_count_bypasses_cache() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model);

    assert_eq!(scope.count()?, 3);
    assert!(!scope.is_loaded());
    assert_eq!(collection.find_calls(), 0);

    scope.to_list()?;
    assert_eq!(scope.count()?, 3);
    assert_eq!(collection.count_calls(), 2);
    assert!(scope.is_loaded());
    Ok(())
}

#[test]
fn test_size_uses_cache_once_loaded() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model);

    assert_eq!(scope.size()?, 3);
    assert_eq!(collection.count_calls(), 1);
    assert!(!scope.is_loaded());

    scope.to_list()?;
    assert_eq!(scope.size()?, 3);
    assert!(!scope.is_empty()?);
    assert!(scope.any()?);
    assert_eq!(collection.count_calls(), 1);
    Ok(())
}

#[test]
fn test_any_with_predicate_loads() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model);

    assert!(scope.any_by(|p| p.age > 80)?);
    assert!(!scope.any_by(|p| p.name == "Alan")?);
    assert!(scope.is_loaded());
    assert_eq!(collection.find_calls(), 1);
    assert_eq!(collection.count_calls(), 0);
    Ok(())
}

#[test]
fn test_empty_collection() -> Result<()> {
    let (model, _) = people_in(RecordingCollection::new("nobody", vec![]));
    let scope = Scope::new(model);
    assert!(scope.is_empty()?);
    assert!(!scope.any()?);
    assert_eq!(scope.first()?, None);
    Ok(())
}

#[test]
fn test_reset_and_reload() -> Result<()> {
    let (model, collection) = people();
    let mut scope = Scope::new(model).limit(2);
    scope.to_list()?;

    scope.reset();
    assert!(!scope.is_loaded());
    assert_eq!(collection.find_calls(), 1);
    assert_eq!(scope.finder_options().limit, Some(2));

    let reloaded = scope.reload()?;
    assert!(reloaded.is_loaded());
    assert_eq!(reloaded.to_list()?.len(), 2);
    assert_eq!(collection.find_calls(), 2);
    Ok(())
}

#[test]
fn test_compile_errors_surface_on_execution() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model.clone()).order("name SIDEWAYS");

    let err = scope.to_list().unwrap_err();
    assert!(matches!(err, Error::InvalidOrderSpec(ref v) if v == "name SIDEWAYS"));
    let err = scope.count().unwrap_err();
    assert!(err.is_compile_error());

    let scope = Scope::new(model.clone()).where_((Operator::parse("age", "near"), 3));
    assert!(matches!(scope.to_list(), Err(Error::InvalidOperator(_))));

    assert_eq!(collection.find_calls(), 0);
    assert_eq!(collection.count_calls(), 0);
    // Indexes are only initialized for queries that compile.
    assert_eq!(model.index_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_indexes_initialized_once() -> Result<()> {
    let (model, _) = people();
    let scope = Scope::new(model.clone());
    scope.count()?;
    scope.to_list()?;
    scope.where_(("age", 1)).to_list()?;
    assert_eq!(model.index_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_storage_errors_pass_through() {
    let (model, _) = people_in(RecordingCollection {
        name: "down".to_string(),
        unreachable: true,
        ..Default::default()
    });
    let scope = Scope::new(model);

    let err = scope.to_list().unwrap_err();
    assert!(err.is_storage_error());
    assert_eq!(err.to_string(), "connection refused");
    assert!(!scope.is_loaded());
    assert!(scope.count().unwrap_err().is_storage_error());
}

#[test]
fn test_equality_compares_queries() -> Result<()> {
    let (model, _) = people();
    let left = Scope::new(model.clone()).where_(("age", 36)).limit(1);
    let right = Scope::new(model.clone()).where_(("age", 36)).limit(1);
    left.to_list()?;

    assert_eq!(left, right);
    assert_ne!(left, right.limit(2));

    let elsewhere = Arc::new(RecordingCollection::new("archive", vec![]));
    assert_ne!(left, right.from(elsewhere));
    Ok(())
}

#[test]
fn test_equality_with_records() -> Result<()> {
    let (model, _) = people();
    let scope = Scope::new(model).limit(1);
    let expected = vec![Person {
        id: "1".to_string(),
        name: "Ada".to_string(),
        age: 36,
    }];
    assert!(scope == expected);
    assert!(scope.is_loaded());
    Ok(())
}

#[test]
fn test_from_overrides_collection() -> Result<()> {
    let (model, default) = people();
    let archive = Arc::new(RecordingCollection::new(
        "archive",
        vec![doc! { "_id": "9", "name": "Alan", "age": 41_i64 }],
    ));
    let scope = Scope::new(model).from(archive.clone());

    assert_eq!(scope.collection().name(), "archive");
    assert_eq!(scope.to_list()?[0].name, "Alan");
    assert_eq!(archive.find_calls(), 1);
    assert_eq!(default.find_calls(), 0);
    Ok(())
}

#[test]
fn test_first_without_loading() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model).order("age");

    let first = scope.first()?.map(|p| p.name);
    assert_eq!(first, Some("Ada".to_string()));
    assert!(!scope.is_loaded());
    assert_eq!(collection.last_find().1.get_i64("limit")?, 1);

    scope.to_list()?;
    assert_eq!(scope.first()?.map(|p| p.id), Some("1".to_string()));
    assert_eq!(collection.find_calls(), 2);
    Ok(())
}

#[test]
fn test_find_by_identity() -> Result<()> {
    let (model, collection) = people();
    Scope::new(model).find("2")?;
    assert_eq!(collection.last_find().0, doc! { "_id": "2" });
    Ok(())
}

#[test]
fn test_sequence_access_loads() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model);

    assert_eq!(scope.get(1)?.map(|p| p.name.as_str()), Some("Grace"));
    assert_eq!(scope.last()?.map(|p| p.age), Some(72));
    let names: Vec<&str> = scope.iter()?.map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Ada", "Grace", "Edsger"]);
    assert_eq!(collection.find_calls(), 1);

    assert_eq!(scope.clone().into_records()?.len(), 3);
    assert_eq!(collection.find_calls(), 2);
    Ok(())
}

#[test]
fn test_clone_starts_unloaded() -> Result<()> {
    let (model, _) = people();
    let scope = Scope::new(model).limit(2);
    scope.to_list()?;
    let copy = scope.clone();
    assert!(!copy.is_loaded());
    assert_eq!(copy, scope);
    Ok(())
}

#[test]
fn test_merge_and_except() {
    let (model, _) = people();
    let base = Scope::new(model.clone()).where_(("age", 1)).order("name").limit(3);
    let other = Scope::new(model).where_(("name", "Ada")).offset(4);

    let merged = base.merge(&other);
    let options = merged.finder_options();
    assert_eq!(options.conditions.map(|c| c.len()), Some(2));
    assert_eq!(options.order, vec![OrderTerm::expr("name")]);
    assert_eq!(options.limit, Some(3));
    assert_eq!(options.offset, Some(4));

    let trimmed = merged.except(Clause::Where).except(Clause::Limit);
    let options = trimmed.finder_options();
    assert_eq!(options.conditions, None);
    assert_eq!(options.limit, None);
    assert_eq!(options.offset, Some(4));
}

#[test]
fn test_shared_scope_loads_once_across_threads() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| assert_eq!(scope.to_list().map(|r| r.len()).ok(), Some(3)));
        }
    });
    assert_eq!(collection.find_calls(), 1);
    Ok(())
}

#[test]
fn test_find_by_field() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model);

    let found = scope.find_by("name", "Grace")?;
    assert!(found.is_some());
    assert_eq!(
        collection.last_find(),
        (doc! { "name": "Grace" }, doc! { "limit": 1_i64 })
    );

    let everyone = scope.find_all_by("age", 36);
    assert!(!everyone.is_loaded());
    assert_eq!(everyone, scope.where_(("age", 36)));
    everyone.to_list()?;
    assert_eq!(collection.last_find().0, doc! { "age": 36_i64 });
    Ok(())
}

#[test]
fn test_exists_fetches_one_document() -> Result<()> {
    let (model, collection) = people();
    let scope = Scope::new(model).where_(("age", 36));

    assert!(scope.exists()?);
    assert!(!scope.is_loaded());
    assert_eq!(collection.count_calls(), 0);
    assert_eq!(collection.last_find().1, doc! { "limit": 1_i64 });

    scope.to_list()?;
    assert!(scope.exists()?);
    assert_eq!(collection.find_calls(), 2);

    let (model, _) = people_in(RecordingCollection::new("nobody", vec![]));
    assert!(!Scope::new(model).exists()?);
    Ok(())
}

struct Indexed {
    collection: Arc<RecordingCollection>,
    properties: Properties,
    index_calls: AtomicUsize,
}

impl Model for Indexed {
    type Record = Document;

    fn name(&self) -> &str {
        "Indexed"
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn collection(&self) -> Arc<dyn Collection> {
        self.collection.clone()
    }

    fn ensure_indexes(&self) -> Result<()> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn from_store(&self, document: Document) -> Result<Document> {
        Ok(document)
    }
}

#[test]
fn test_ensure_indexes_runs_without_initialized_flag() -> Result<()> {
    let model = Arc::new(Indexed {
        collection: Arc::new(RecordingCollection::new("indexed", vec![doc! { "_id": "1" }])),
        properties: Properties::new(),
        index_calls: AtomicUsize::new(0),
    });
    let scope = Scope::new(model.clone());
    scope.to_list()?;
    scope.count()?;
    assert_eq!(model.index_calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_equality_compares_model_properties() {
    let (model, collection) = people();
    let renamed = Arc::new(People {
        collection,
        properties: Properties::new().property("name", PropertyType::Symbol),
        indexed: AtomicBool::new(true),
        index_calls: AtomicUsize::new(0),
    });
    assert_ne!(Scope::new(model), Scope::new(renamed));
}
