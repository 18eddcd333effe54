//! docket-memory: the in-memory reference adapter
//!
//! A complete `Adapter` implementation backed by `BTreeMap`s behind a
//! `parking_lot::RwLock`. It exists so the engine has a real backend for
//! tests and embedded use: every filter kind, multi-key ordering with
//! natural order, offset/limit/cursor pagination, exact vector scoring
//! (cosine, euclidean, dot) and unique-index enforcement.
//!
//! Internal ids come from a per-collection sequence, so natural order is
//! insertion order. Document ids deduplicate case-insensitively, scoped by
//! tenant when shared tables are enabled.

mod matcher;
mod scoring;

use docket_core::{
    query::CursorDirection, Adapter, Attribute, Collection, DatabaseError, Document, Index,
    IndexKind, Query, QueryPlan, Result, SortOrder, Value,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Sizing and behavior knobs for the adapter
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum attribute columns per collection, internal columns included
    pub limit_for_attributes: u64,
    /// Columns reserved for internal fields
    pub count_of_default_attributes: u64,
    /// Row width ceiling in bytes
    pub row_size_limit: u64,
    /// Encoded document size ceiling; 0 means unlimited
    pub document_size_limit: u64,
    /// Multi-tenant mode
    pub shared_tables: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            limit_for_attributes: 1000,
            count_of_default_attributes: 6,
            row_size_limit: 65535,
            document_size_limit: 0,
            shared_tables: false,
        }
    }
}

impl MemoryConfig {
    /// Tight limits for boundary tests
    pub fn with_small_limits() -> Self {
        MemoryConfig {
            limit_for_attributes: 8,
            count_of_default_attributes: 2,
            row_size_limit: 500,
            document_size_limit: 2048,
            shared_tables: false,
        }
    }

    pub fn shared(mut self) -> Self {
        self.shared_tables = true;
        self
    }
}

#[derive(Debug, Default)]
struct CollectionStore {
    indexes: Vec<Index>,
    sequence: u64,
    /// Stored documents ordered by internal id (insertion order)
    docs: BTreeMap<u64, Document>,
    /// Case-insensitive id (tenant-scoped) to internal id
    ids: HashMap<String, u64>,
}

/// In-memory storage backend
pub struct MemoryAdapter {
    config: MemoryConfig,
    collections: RwLock<HashMap<String, CollectionStore>>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        MemoryAdapter::new(MemoryConfig::default())
    }
}

impl MemoryAdapter {
    pub fn new(config: MemoryConfig) -> Self {
        MemoryAdapter {
            config,
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn store_key(id: &str) -> String {
        id.to_lowercase()
    }

    fn id_key(&self, document: &Document) -> String {
        self.id_key_for(document.tenant(), document.id())
    }

    fn id_key_for(&self, tenant: Option<&str>, id: &str) -> String {
        if self.config.shared_tables {
            format!("{}\u{1}{}", tenant.unwrap_or(""), id.to_lowercase())
        } else {
            id.to_lowercase()
        }
    }

    fn with_store<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&CollectionStore) -> Result<T>,
    ) -> Result<T> {
        let stores = self.collections.read();
        let store = stores
            .get(&Self::store_key(collection))
            .ok_or_else(|| DatabaseError::NotFound(format!("Collection \"{collection}\"")))?;
        f(store)
    }

    fn with_store_mut<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut CollectionStore) -> Result<T>,
    ) -> Result<T> {
        let mut stores = self.collections.write();
        let store = stores
            .get_mut(&Self::store_key(collection))
            .ok_or_else(|| DatabaseError::NotFound(format!("Collection \"{collection}\"")))?;
        f(store)
    }

    /// Reject a write that would break a unique index
    fn check_unique(
        store: &CollectionStore,
        candidate: &Document,
        exclude: Option<u64>,
    ) -> Result<()> {
        for index in &store.indexes {
            if index.kind != IndexKind::Unique {
                continue;
            }
            let tuple: Vec<Value> = index
                .attributes
                .iter()
                .map(|attr| candidate.value_of(attr))
                .collect();
            if tuple.iter().all(Value::is_null) {
                continue;
            }
            for (internal_id, existing) in &store.docs {
                if Some(*internal_id) == exclude {
                    continue;
                }
                if existing.tenant() != candidate.tenant() {
                    continue;
                }
                let other: Vec<Value> = index
                    .attributes
                    .iter()
                    .map(|attr| existing.value_of(attr))
                    .collect();
                if other == tuple {
                    return Err(DatabaseError::Duplicate(format!(
                        "Duplicate document violates unique index \"{}\"",
                        index.key
                    )));
                }
            }
        }
        Ok(())
    }

    fn insert_document(store: &mut CollectionStore, key: String, mut document: Document) -> Document {
        store.sequence += 1;
        document.assign_internal_id(store.sequence);
        store.ids.insert(key, store.sequence);
        store.docs.insert(store.sequence, document.clone());
        document
    }

    /// Evaluate a query list: filter, score or sort, window by cursor,
    /// offset and limit
    fn execute(&self, store: &CollectionStore, queries: &[Query]) -> Result<Vec<Document>> {
        let plan = QueryPlan::of(queries)?;

        let mut matches: Vec<&Document> = store
            .docs
            .values()
            .filter(|doc| plan.filters.iter().all(|q| matcher::matches(doc, q)))
            .collect();

        if let Some(vector) = &plan.vector {
            matches.retain(|doc| scoring::document_vector(doc, &vector.attribute).is_some());
            let mut scored: Vec<(f32, &Document)> = matches
                .into_iter()
                .map(|doc| (scoring::score(doc, vector), doc))
                .collect();
            scored.sort_by(|(score_a, a), (score_b, b)| {
                scoring::rank(vector.metric, *score_a, *score_b)
                    .then_with(|| a.internal_id().cmp(&b.internal_id()))
            });
            matches = scored.into_iter().map(|(_, doc)| doc).collect();
        } else {
            matches.sort_by(|a, b| Self::order_documents(a, b, &plan.orders));
        }

        let window = Self::window(matches, &plan)?;
        Ok(window.into_iter().cloned().collect())
    }

    /// Multi-key comparison with the natural tie-break on internal id
    fn order_documents(
        a: &Document,
        b: &Document,
        orders: &[(String, SortOrder)],
    ) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        for (attribute, direction) in orders {
            let ord = if attribute.is_empty() {
                a.internal_id().cmp(&b.internal_id())
            } else {
                docket_core::value::compare(&a.value_of(attribute), &b.value_of(attribute))
            };
            let ord = match direction {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.internal_id().cmp(&b.internal_id())
    }

    /// Apply cursor, offset and limit to an ordered match list
    fn window<'a>(
        matches: Vec<&'a Document>,
        plan: &QueryPlan,
    ) -> Result<Vec<&'a Document>> {
        let offset = plan.offset.unwrap_or(0);
        let limit = plan.limit.unwrap_or(usize::MAX);

        let (slice, from_end) = match &plan.cursor {
            None => (matches, false),
            Some((anchor, direction)) => {
                let position = matches
                    .iter()
                    .position(|doc| doc.id().eq_ignore_ascii_case(anchor.id()))
                    .ok_or_else(|| {
                        DatabaseError::Query(format!(
                            "Cursor document \"{}\" not found in result set",
                            anchor.id()
                        ))
                    })?;
                match direction {
                    CursorDirection::After => (matches[position + 1..].to_vec(), false),
                    CursorDirection::Before => (matches[..position].to_vec(), true),
                }
            }
        };

        if from_end {
            // Pages before the anchor count backwards but keep sort order
            let end = slice.len().saturating_sub(offset);
            let start = end.saturating_sub(limit.min(end));
            Ok(slice[start..end].to_vec())
        } else {
            Ok(slice.into_iter().skip(offset).take(limit).collect())
        }
    }
}

impl Adapter for MemoryAdapter {
    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    fn create_collection(&self, collection: &Collection) -> Result<()> {
        let mut stores = self.collections.write();
        let key = Self::store_key(&collection.id);
        if stores.contains_key(&key) {
            return Err(DatabaseError::Duplicate(format!(
                "Collection \"{}\" already exists",
                collection.id
            )));
        }
        stores.insert(
            key,
            CollectionStore {
                indexes: collection.indexes.clone(),
                ..CollectionStore::default()
            },
        );
        Ok(())
    }

    fn delete_collection(&self, id: &str) -> Result<()> {
        let mut stores = self.collections.write();
        stores
            .remove(&Self::store_key(id))
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound(format!("Collection \"{id}\"")))
    }

    fn collection_exists(&self, id: &str) -> Result<bool> {
        Ok(self.collections.read().contains_key(&Self::store_key(id)))
    }

    fn create_attribute(&self, collection: &str, _attribute: &Attribute) -> Result<()> {
        // Rows are schemaless maps; only the store has to exist
        self.with_store(collection, |_| Ok(()))
    }

    fn update_attribute(&self, collection: &str, _attribute: &Attribute) -> Result<()> {
        self.with_store(collection, |_| Ok(()))
    }

    fn rename_attribute(&self, collection: &str, old: &str, new: &str) -> Result<()> {
        self.with_store_mut(collection, |store| {
            for doc in store.docs.values_mut() {
                if let Some(value) = doc.remove(old) {
                    doc.set(new.to_string(), value);
                }
            }
            for index in &mut store.indexes {
                index.rename_attribute(old, new);
            }
            Ok(())
        })
    }

    fn delete_attribute(&self, collection: &str, key: &str) -> Result<()> {
        self.with_store_mut(collection, |store| {
            for doc in store.docs.values_mut() {
                doc.remove(key);
            }
            store.indexes.retain(|index| !index.references(key));
            Ok(())
        })
    }

    fn create_index(&self, collection: &str, index: &Index) -> Result<()> {
        self.with_store_mut(collection, |store| {
            if index.kind == IndexKind::Unique {
                // Existing rows must already satisfy the constraint
                let mut seen: Vec<(Option<&str>, Vec<Value>)> = Vec::new();
                for doc in store.docs.values() {
                    let tuple: Vec<Value> = index
                        .attributes
                        .iter()
                        .map(|attr| doc.value_of(attr))
                        .collect();
                    if tuple.iter().all(Value::is_null) {
                        continue;
                    }
                    let entry = (doc.tenant(), tuple);
                    if seen.contains(&entry) {
                        return Err(DatabaseError::Duplicate(format!(
                            "Duplicate document violates unique index \"{}\"",
                            index.key
                        )));
                    }
                    seen.push(entry);
                }
            }
            store.indexes.push(index.clone());
            Ok(())
        })
    }

    fn delete_index(&self, collection: &str, key: &str) -> Result<()> {
        self.with_store_mut(collection, |store| {
            store.indexes.retain(|index| !index.key.eq_ignore_ascii_case(key));
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    fn create_document(&self, collection: &Collection, document: Document) -> Result<Document> {
        let key = self.id_key(&document);
        self.with_store_mut(&collection.id, |store| {
            if store.ids.contains_key(&key) {
                return Err(DatabaseError::Duplicate(format!(
                    "Document with id \"{}\" already exists",
                    document.id()
                )));
            }
            Self::check_unique(store, &document, None)?;
            Ok(Self::insert_document(store, key, document))
        })
    }

    fn create_documents(
        &self,
        collection: &Collection,
        documents: Vec<Document>,
    ) -> Result<Vec<Document>> {
        let mut created = Vec::with_capacity(documents.len());
        for document in documents {
            created.push(self.create_document(collection, document)?);
        }
        Ok(created)
    }

    fn update_document(&self, collection: &Collection, document: Document) -> Result<Document> {
        let key = self.id_key(&document);
        self.with_store_mut(&collection.id, |store| {
            let internal_id = *store.ids.get(&key).ok_or_else(|| {
                DatabaseError::NotFound(format!("Document \"{}\"", document.id()))
            })?;
            Self::check_unique(store, &document, Some(internal_id))?;
            let mut document = document;
            document.assign_internal_id(internal_id);
            store.docs.insert(internal_id, document.clone());
            Ok(document)
        })
    }

    fn update_documents(
        &self,
        collection: &Collection,
        documents: Vec<Document>,
    ) -> Result<usize> {
        let mut written = 0;
        for document in documents {
            self.update_document(collection, document)?;
            written += 1;
        }
        Ok(written)
    }

    fn upsert_document(&self, collection: &Collection, document: Document) -> Result<Document> {
        let key = self.id_key(&document);
        let exists = self.with_store(&collection.id, |store| Ok(store.ids.contains_key(&key)))?;
        if exists {
            self.update_document(collection, document)
        } else {
            self.create_document(collection, document)
        }
    }

    fn delete_document(&self, collection: &Collection, id: &str) -> Result<bool> {
        // Under shared tables the engine resolves tenant visibility before
        // deleting, so matching on the id part of the key is sufficient.
        self.with_store_mut(&collection.id, |store| {
            let found = store
                .ids
                .iter()
                .find(|(key, _)| {
                    key.rsplit('\u{1}')
                        .next()
                        .map(|k| k == id.to_lowercase())
                        .unwrap_or(false)
                })
                .map(|(key, internal)| (key.clone(), *internal));
            match found {
                Some((key, internal_id)) => {
                    store.ids.remove(&key);
                    store.docs.remove(&internal_id);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn delete_documents(&self, collection: &Collection, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.delete_document(collection, id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn get_document(&self, collection: &Collection, id: &str) -> Result<Option<Document>> {
        self.with_store(&collection.id, |store| {
            let lowered = id.to_lowercase();
            let internal = store.ids.iter().find_map(|(key, internal)| {
                let candidate = key.rsplit('\u{1}').next().unwrap_or(key);
                (candidate == lowered).then_some(*internal)
            });
            Ok(internal.and_then(|id| store.docs.get(&id).cloned()))
        })
    }

    fn find(&self, collection: &Collection, queries: &[Query]) -> Result<Vec<Document>> {
        self.with_store(&collection.id, |store| self.execute(store, queries))
    }

    fn count(
        &self,
        collection: &Collection,
        queries: &[Query],
        max: Option<usize>,
    ) -> Result<usize> {
        self.with_store(&collection.id, |store| {
            let plan = QueryPlan::of(queries)?;
            let count = store
                .docs
                .values()
                .filter(|doc| plan.filters.iter().all(|q| matcher::matches(doc, q)))
                .count();
            Ok(max.map_or(count, |m| count.min(m)))
        })
    }

    fn sum(
        &self,
        collection: &Collection,
        attribute: &str,
        queries: &[Query],
        max: Option<usize>,
    ) -> Result<f64> {
        self.with_store(&collection.id, |store| {
            let plan = QueryPlan::of(queries)?;
            let total = store
                .docs
                .values()
                .filter(|doc| plan.filters.iter().all(|q| matcher::matches(doc, q)))
                .take(max.unwrap_or(usize::MAX))
                .filter_map(|doc| doc.get(attribute).and_then(Value::as_number))
                .sum();
            Ok(total)
        })
    }

    // ------------------------------------------------------------------
    // Sizing and capabilities
    // ------------------------------------------------------------------

    fn get_limit_for_attributes(&self) -> u64 {
        self.config.limit_for_attributes
    }

    fn get_count_of_default_attributes(&self) -> u64 {
        self.config.count_of_default_attributes
    }

    fn get_row_size_limit(&self) -> u64 {
        self.config.row_size_limit
    }

    fn get_document_size_limit(&self) -> u64 {
        self.config.document_size_limit
    }

    fn supports_upserts(&self) -> bool {
        true
    }

    fn supports_batch_operations(&self) -> bool {
        true
    }

    fn supports_vectors(&self) -> bool {
        true
    }

    fn supports_fulltext_index(&self) -> bool {
        true
    }

    fn shared_tables(&self) -> bool {
        self.config.shared_tables
    }
}
