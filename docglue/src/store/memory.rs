//! In-process [`DocumentStore`] for tests
//!
//! Understands the subset of the query language the crate's own tests and
//! typical service tests use: equality, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`,
//! `$lte`, `$in`, `$nin`, `$exists`, `$and`, `$or` in filters; `$set`, `$unset`
//! and `$inc` in updates; `$match`, `$sort`, `$skip` and `$limit` stages in
//! pipelines. Anything else is reported as [`BackendError::Unsupported`].
//!
//! Faults can be injected to exercise failure paths without a server.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use dashmap::DashMap;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions};

use super::backend::{DocumentStore, Namespace, WriteCounts};
use super::error::{BackendError, BackendResult};

#[derive(Debug, Default)]
struct Inner {
    collections: DashMap<Namespace, Vec<Document>>,
    failures: DashMap<String, String>,
    refuse_inserts: AtomicBool,
    ack_limit: AtomicUsize,
}

/// Shared in-memory store; clones see the same data.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store with no faults armed
    pub fn new() -> Self {
        let inner = Inner {
            ack_limit: AtomicUsize::new(usize::MAX),
            ..Inner::default()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Make the next call to `operation` (a [`DocumentStore`] method name such
    /// as `"insert_one"`) fail with [`BackendError::Unavailable`].
    pub fn fail_next(&self, operation: &str, message: impl Into<String>) {
        self.inner
            .failures
            .insert(operation.to_string(), message.into());
    }

    /// Report single inserts as unacknowledged without storing them
    pub fn refuse_inserts(&self, refuse: bool) {
        self.inner.refuse_inserts.store(refuse, AtomicOrdering::SeqCst);
    }

    /// Store and acknowledge at most `limit` documents per bulk insert
    pub fn acknowledge_at_most(&self, limit: usize) {
        self.inner.ack_limit.store(limit, AtomicOrdering::SeqCst);
    }

    /// Store a document as-is, bypassing typed encoding
    pub fn insert_raw(&self, ns: &Namespace, mut document: Document) {
        ensure_id(&mut document);
        self.inner
            .collections
            .entry(ns.clone())
            .or_default()
            .push(document);
    }

    /// Snapshot of a collection in insertion order
    pub fn documents(&self, ns: &Namespace) -> Vec<Document> {
        self.inner
            .collections
            .get(ns)
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    fn check_fault(&self, operation: &str) -> BackendResult<()> {
        match self.inner.failures.remove(operation) {
            Some((_, message)) => Err(BackendError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn matching(&self, ns: &Namespace, filter: &Document) -> BackendResult<Vec<Document>> {
        let Some(docs) = self.inner.collections.get(ns) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for doc in docs.iter() {
            if filter_matches(doc, filter)? {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, ns: &Namespace, document: Document) -> BackendResult<bool> {
        self.check_fault("insert_one")?;
        if self.inner.refuse_inserts.load(AtomicOrdering::SeqCst) {
            return Ok(false);
        }
        self.insert_raw(ns, document);
        Ok(true)
    }

    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> BackendResult<usize> {
        self.check_fault("insert_many")?;
        let limit = self.inner.ack_limit.load(AtomicOrdering::SeqCst);
        let mut acknowledged = 0;
        for document in documents.into_iter().take(limit) {
            self.insert_raw(ns, document);
            acknowledged += 1;
        }
        Ok(acknowledged)
    }

    async fn replace_one(
        &self,
        ns: &Namespace,
        filter: Document,
        mut replacement: Document,
        upsert: bool,
    ) -> BackendResult<WriteCounts> {
        self.check_fault("replace_one")?;
        let mut docs = self.inner.collections.entry(ns.clone()).or_default();

        for doc in docs.iter_mut() {
            if filter_matches(doc, &filter)? {
                if let Some(id) = doc.get("_id").cloned() {
                    replacement.insert("_id", id);
                }
                let modified = *doc != replacement;
                *doc = replacement;
                return Ok(WriteCounts {
                    matched: 1,
                    modified: u64::from(modified),
                    upserted: false,
                });
            }
        }

        if !upsert {
            return Ok(WriteCounts::default());
        }
        if !replacement.contains_key("_id") {
            if let Some(id) = filter.get("_id").filter(|v| !is_operator_doc(v)) {
                replacement.insert("_id", id.clone());
            }
        }
        ensure_id(&mut replacement);
        docs.push(replacement);
        Ok(WriteCounts {
            matched: 0,
            modified: 0,
            upserted: true,
        })
    }

    async fn find_one(&self, ns: &Namespace, filter: Document) -> BackendResult<Option<Document>> {
        self.check_fault("find_one")?;
        Ok(self.matching(ns, &filter)?.into_iter().next())
    }

    async fn find(
        &self,
        ns: &Namespace,
        filter: Document,
        sort: Option<Document>,
    ) -> BackendResult<Vec<Document>> {
        self.check_fault("find")?;
        let mut found = self.matching(ns, &filter)?;
        if let Some(sort) = sort {
            sort_documents(&mut found, &sort)?;
        }
        Ok(found)
    }

    async fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: Vec<Document>,
    ) -> BackendResult<Vec<Document>> {
        self.check_fault("aggregate")?;
        let mut docs = self.documents(ns);

        for stage in pipeline {
            let Some((name, spec)) = stage.iter().next() else {
                return Err(BackendError::Unsupported("empty pipeline stage".to_string()));
            };
            docs = match (name.as_str(), spec) {
                ("$match", Bson::Document(filter)) => {
                    let mut kept = Vec::with_capacity(docs.len());
                    for doc in docs {
                        if filter_matches(&doc, filter)? {
                            kept.push(doc);
                        }
                    }
                    kept
                }
                ("$sort", Bson::Document(sort)) => {
                    sort_documents(&mut docs, sort)?;
                    docs
                }
                ("$skip", n) => docs.into_iter().skip(as_count(name, n)?).collect(),
                ("$limit", n) => docs.into_iter().take(as_count(name, n)?).collect(),
                (other, _) => {
                    return Err(BackendError::Unsupported(format!("pipeline stage {other}")));
                }
            };
        }
        Ok(docs)
    }

    async fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> BackendResult<Option<Document>> {
        self.check_fault("find_one_and_update")?;
        let return_after = matches!(options.return_document, Some(ReturnDocument::After));
        let mut docs = self.inner.collections.entry(ns.clone()).or_default();

        for doc in docs.iter_mut() {
            if filter_matches(doc, &filter)? {
                let before = doc.clone();
                apply_update(doc, &update)?;
                return Ok(Some(if return_after { doc.clone() } else { before }));
            }
        }

        if options.upsert != Some(true) {
            return Ok(None);
        }
        let mut created = seed_from_filter(&filter);
        apply_update(&mut created, &update)?;
        ensure_id(&mut created);
        docs.push(created.clone());
        Ok(return_after.then_some(created))
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> BackendResult<WriteCounts> {
        self.check_fault("update_many")?;
        let mut docs = self.inner.collections.entry(ns.clone()).or_default();
        let mut counts = WriteCounts::default();

        for doc in docs.iter_mut() {
            if filter_matches(doc, &filter)? {
                counts.matched += 1;
                let before = doc.clone();
                apply_update(doc, &update)?;
                if *doc != before {
                    counts.modified += 1;
                }
            }
        }

        if counts.matched == 0 && options.upsert == Some(true) {
            let mut created = seed_from_filter(&filter);
            apply_update(&mut created, &update)?;
            ensure_id(&mut created);
            docs.push(created);
            counts.upserted = true;
        }
        Ok(counts)
    }

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> BackendResult<u64> {
        self.check_fault("delete_many")?;
        let Some(mut docs) = self.inner.collections.get_mut(ns) else {
            return Ok(0);
        };

        let mut deleted = 0;
        let mut kept = Vec::with_capacity(docs.len());
        for doc in docs.iter() {
            if filter_matches(doc, &filter)? {
                deleted += 1;
            } else {
                kept.push(doc.clone());
            }
        }
        *docs = kept;
        Ok(deleted)
    }
}

fn ensure_id(document: &mut Document) {
    if !document.contains_key("_id") {
        document.insert("_id", ObjectId::new());
    }
}

fn operators_only(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|k| k.starts_with('$'))
}

fn is_operator_doc(value: &Bson) -> bool {
    matches!(value, Bson::Document(doc) if operators_only(doc))
}

/// Resolve a dotted path such as `address.city`
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn equals(field: Option<&Bson>, expected: &Bson) -> bool {
    match field {
        Some(value) => {
            compare(value, expected) == Some(Ordering::Equal)
                || matches!(value, Bson::Array(items) if items.iter().any(|item| compare(item, expected) == Some(Ordering::Equal)))
        }
        None => matches!(expected, Bson::Null),
    }
}

fn as_documents<'a>(operator: &str, value: &'a Bson) -> BackendResult<Vec<&'a Document>> {
    let Bson::Array(items) = value else {
        return Err(BackendError::Unsupported(format!("{operator} expects an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(BackendError::Unsupported(format!(
                "{operator} expects an array of documents"
            ))),
        })
        .collect()
}

fn filter_matches(document: &Document, filter: &Document) -> BackendResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in as_documents(key, condition)? {
                    all &= filter_matches(document, sub)?;
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in as_documents(key, condition)? {
                    any |= filter_matches(document, sub)?;
                }
                any
            }
            op if op.starts_with('$') => {
                return Err(BackendError::Unsupported(format!("query operator {op}")));
            }
            path => {
                let field = lookup(document, path);
                match condition {
                    Bson::Document(ops) if is_operator_doc(condition) => {
                        matches_operators(field, ops)?
                    }
                    expected => equals(field, expected),
                }
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_operators(field: Option<&Bson>, operators: &Document) -> BackendResult<bool> {
    for (op, operand) in operators {
        let ordered = |accept: fn(Ordering) -> bool| {
            field
                .and_then(|value| compare(value, operand))
                .is_some_and(accept)
        };
        let matched = match op.as_str() {
            "$eq" => equals(field, operand),
            "$ne" => !equals(field, operand),
            "$gt" => ordered(Ordering::is_gt),
            "$gte" => ordered(Ordering::is_ge),
            "$lt" => ordered(Ordering::is_lt),
            "$lte" => ordered(Ordering::is_le),
            "$in" | "$nin" => {
                let Bson::Array(candidates) = operand else {
                    return Err(BackendError::Unsupported(format!("{op} expects an array")));
                };
                let found = candidates.iter().any(|candidate| equals(field, candidate));
                if op == "$in" {
                    found
                } else {
                    !found
                }
            }
            "$exists" => field.is_some() == matches!(operand, Bson::Boolean(true)),
            other => {
                return Err(BackendError::Unsupported(format!("query operator {other}")));
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality fields of a filter, used as the base of an upserted document
fn seed_from_filter(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(key, value)| !key.starts_with('$') && !key.contains('.') && !is_operator_doc(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn apply_update(document: &mut Document, update: &Document) -> BackendResult<()> {
    if !operators_only(update) {
        return Err(BackendError::Unsupported(
            "update documents must only contain operators".to_string(),
        ));
    }

    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(BackendError::Unsupported(format!("{op} expects a document")));
        };
        for (field, value) in fields {
            match op.as_str() {
                "$set" => {
                    document.insert(field.clone(), value.clone());
                }
                "$unset" => {
                    document.remove(field);
                }
                "$inc" => {
                    let current = document.get(field).cloned().unwrap_or(Bson::Int32(0));
                    document.insert(field.clone(), increment(&current, value)?);
                }
                other => {
                    return Err(BackendError::Unsupported(format!("update operator {other}")));
                }
            }
        }
    }
    Ok(())
}

fn increment(current: &Bson, by: &Bson) -> BackendResult<Bson> {
    let overflow = || BackendError::Unsupported("$inc overflows the stored integer".to_string());
    let sum = match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => Bson::Int32(a.checked_add(*b).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (Bson::Int32(a), Bson::Int64(b)) => {
            Bson::Int64(i64::from(*a).checked_add(*b).ok_or_else(overflow)?)
        }
        (Bson::Int64(a), Bson::Int32(b)) => {
            Bson::Int64(a.checked_add(i64::from(*b)).ok_or_else(overflow)?)
        }
        (a, b) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => Bson::Double(x + y),
            _ => {
                return Err(BackendError::Unsupported(
                    "$inc on a non-numeric value".to_string(),
                ))
            }
        },
    };
    Ok(sum)
}

fn sort_documents(documents: &mut [Document], sort: &Document) -> BackendResult<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort {
        let descending = match as_f64(direction) {
            Some(d) if d == 1.0 => false,
            Some(d) if d == -1.0 => true,
            _ => {
                return Err(BackendError::Unsupported(format!(
                    "sort direction for {field}"
                )))
            }
        };
        keys.push((field.as_str(), descending));
    }

    documents.sort_by(|a, b| {
        for (field, descending) in &keys {
            // Missing fields sort before present ones
            let ordering = match (lookup(a, field), lookup(b, field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
            };
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn as_count(stage: &str, value: &Bson) -> BackendResult<usize> {
    match as_f64(value) {
        Some(n) if n >= 0.0 => Ok(n as usize),
        _ => Err(BackendError::Unsupported(format!(
            "{stage} expects a non-negative number"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn ns() -> Namespace {
        Namespace::new("test", "items")
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let store = MemoryStore::new();
        assert!(store.insert_one(&ns(), doc! { "a": 1 }).await.unwrap());

        let docs = store.documents(&ns());
        assert_eq!(docs.len(), 1);
        assert!(matches!(docs[0].get("_id"), Some(Bson::ObjectId(_))));
    }

    #[tokio::test]
    async fn test_filter_operators() {
        let store = MemoryStore::new();
        for n in 1..=5 {
            let tag = if n % 2 == 0 { "even" } else { "odd" };
            store.insert_raw(&ns(), doc! { "n": n, "tag": tag });
        }

        let count = |filter: Document| {
            let store = store.clone();
            async move { store.find(&ns(), filter, None).await.unwrap().len() }
        };

        assert_eq!(count(doc! { "tag": "even" }).await, 2);
        assert_eq!(count(doc! { "n": { "$gt": 2, "$lte": 4 } }).await, 2);
        assert_eq!(count(doc! { "n": { "$in": [1, 5] } }).await, 2);
        assert_eq!(count(doc! { "n": { "$nin": [1, 5] } }).await, 3);
        assert_eq!(count(doc! { "tag": { "$ne": "odd" } }).await, 2);
        assert_eq!(count(doc! { "missing": { "$exists": false } }).await, 5);
        assert_eq!(count(doc! { "$or": [{ "n": 1 }, { "n": 2 }] }).await, 2);
        assert_eq!(count(doc! { "n": 3_i64 }).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_operator_is_unsupported() {
        let store = MemoryStore::new();
        store.insert_raw(&ns(), doc! { "a": 1 });
        let err = store
            .find(&ns(), doc! { "a": { "$regex": "x" } }, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_fail_next_fires_once() {
        let store = MemoryStore::new();
        store.fail_next("find_one", "boom");

        let err = store.find_one(&ns(), doc! {}).await.unwrap_err();
        assert_eq!(err.to_string(), "store unavailable: boom");
        assert!(store.find_one(&ns(), doc! {}).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_seeds_from_filter() {
        let store = MemoryStore::new();
        let options = UpdateOptions::builder().upsert(true).build();

        let counts = store
            .update_many(&ns(), doc! { "sku": "a1" }, doc! { "$inc": { "qty": 2 } }, options)
            .await
            .unwrap();

        assert!(counts.upserted);
        let stored = store.documents(&ns());
        assert_eq!(stored[0].get_str("sku").unwrap(), "a1");
        assert_eq!(stored[0].get_i32("qty").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_inc_overflow_is_rejected() {
        let store = MemoryStore::new();
        store.insert_raw(&ns(), doc! { "n": i32::MAX });

        let err = store
            .update_many(&ns(), doc! {}, doc! { "$inc": { "n": 1 } }, UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Unsupported(_)));
        assert_eq!(store.documents(&ns())[0].get_i32("n").unwrap(), i32::MAX);
    }

    #[tokio::test]
    async fn test_replacement_update_is_rejected() {
        let store = MemoryStore::new();
        store.insert_raw(&ns(), doc! { "a": 1 });
        let err = store
            .update_many(&ns(), doc! {}, doc! { "a": 2 }, UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_replace_keeps_id() {
        let store = MemoryStore::new();
        store.insert_raw(&ns(), doc! { "_id": 7, "a": 1 });

        let counts = store
            .replace_one(&ns(), doc! { "a": 1 }, doc! { "a": 2 }, false)
            .await
            .unwrap();

        assert_eq!(counts.matched, 1);
        assert_eq!(store.documents(&ns()), vec![doc! { "a": 2, "_id": 7 }]);
    }

    #[tokio::test]
    async fn test_pipeline_stages() {
        let store = MemoryStore::new();
        for n in [3, 1, 2, 5, 4] {
            store.insert_raw(&ns(), doc! { "n": n });
        }

        let out = store
            .aggregate(
                &ns(),
                vec![
                    doc! { "$match": { "n": { "$gte": 2 } } },
                    doc! { "$sort": { "n": 1 } },
                    doc! { "$skip": 1 },
                    doc! { "$limit": 2 },
                ],
            )
            .await
            .unwrap();
        let values: Vec<_> = out.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(values, vec![3, 4]);

        let err = store
            .aggregate(&ns(), vec![doc! { "$group": { "_id": "$n" } }])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_delete_many_counts() {
        let store = MemoryStore::new();
        assert_eq!(store.delete_many(&ns(), doc! {}).await.unwrap(), 0);

        store.insert_raw(&ns(), doc! { "a": 1 });
        store.insert_raw(&ns(), doc! { "a": 2 });
        assert_eq!(store.delete_many(&ns(), doc! { "a": 1 }).await.unwrap(), 1);
        assert_eq!(store.documents(&ns()).len(), 1);
    }
}
