//! Database facade
//!
//! Orchestrates every public operation: schema changes with limit
//! enforcement, the document write state machine, query execution with
//! permission filtering, optimistic-concurrency conflict detection and
//! batched bulk operations. Persistence is delegated to the `Adapter`.
//!
//! Write state machine: validate structure, check permissions, resolve
//! operators against current values, re-validate the computed result,
//! encode, delegate to the adapter, decode, invalidate cache entries.
//!
//! ## Permission filtering and pagination
//!
//! Read filtering happens after query evaluation. To keep `limit`/cursor
//! semantics intact when leading results are filtered out, the engine
//! over-fetches: it asks the adapter for twice the outstanding page
//! (doubling on each retry) and filters, so a page always holds the
//! requested count of *visible* documents unless the collection is
//! exhausted.

use crate::authorization;
use crate::codec;
use crate::context::AccessContext;
use crate::operator::{Operator, Patch};
use crate::structure;
use dashmap::DashMap;
use docket_core::{
    document as doc_fields, query, Action, Adapter, Attribute, AttributeKind, Collection,
    DatabaseError, Document, Index, IndexKind, Permission, Query, QueryPlan, Result, Value,
    METADATA_COLLECTION,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Page size used by bulk operations when the caller does not pass one
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Over-fetch multiplier for permission-filtered pagination
const PERMISSION_OVERFETCH_FACTOR: usize = 2;

/// Sentinel id asking the engine to generate a unique document id
pub const ID_UNIQUE: &str = "unique()";

/// Update payload: plain values and deferred operators, plus an optional
/// permissions replacement
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    permissions: Option<Vec<Permission>>,
    fields: BTreeMap<String, Patch>,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        DocumentUpdate::default()
    }

    /// Overwrite one attribute with a concrete value
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), Patch::Set(value.into()));
        self
    }

    /// Apply an operator to one attribute server-side
    pub fn apply(mut self, key: impl Into<String>, operator: Operator) -> Self {
        self.fields.insert(key.into(), Patch::Apply(operator));
        self
    }

    /// Replace the document's permission list
    pub fn permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Plain-value payload from a document's attributes
    pub fn from_document(document: &Document) -> Self {
        let mut update = DocumentUpdate::new();
        for (key, value) in document.attributes() {
            update.fields.insert(key.clone(), Patch::Set(value.clone()));
        }
        if !document.permissions().is_empty() {
            update.permissions = Some(document.permissions().to_vec());
        }
        update
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.permissions.is_none()
    }
}

/// The execution engine
///
/// Cheap to share: schema and document caches are concurrent maps, and the
/// adapter is held behind an `Arc`.
pub struct Database {
    adapter: Arc<dyn Adapter>,
    schemas: DashMap<String, Collection>,
    cache: DashMap<(String, String), Document>,
}

impl Database {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Database {
            adapter,
            schemas: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Seed the reserved metadata collection
    ///
    /// Must run once before any collection operation; safe to call again.
    pub fn bootstrap(&self) -> Result<()> {
        if !self.adapter.collection_exists(METADATA_COLLECTION)? {
            self.adapter.create_collection(&Collection::metadata())?;
            info!(collection = METADATA_COLLECTION, "seeded metadata collection");
        }
        self.schemas
            .insert(METADATA_COLLECTION.to_string(), Collection::metadata());
        Ok(())
    }

    fn ensure_bootstrapped(&self) -> Result<()> {
        if self.schemas.contains_key(METADATA_COLLECTION) {
            Ok(())
        } else {
            Err(DatabaseError::Initialization(
                "Database has not been bootstrapped".into(),
            ))
        }
    }

    // ==================================================================
    // Collections
    // ==================================================================

    pub fn create_collection(&self, ctx: &AccessContext, collection: Collection) -> Result<Collection> {
        self.ensure_bootstrapped()?;
        if collection.id.starts_with('_') {
            return Err(DatabaseError::InvalidOperation(format!(
                "Collection id \"{}\" uses the reserved underscore prefix",
                collection.id
            )));
        }
        collection.validate()?;
        self.check_collection_limits(&collection)?;
        self.check_capabilities(&collection)?;

        if self.adapter.collection_exists(&collection.id)? {
            return Err(DatabaseError::Duplicate(format!(
                "Collection \"{}\" already exists",
                collection.id
            )));
        }

        self.adapter.create_collection(&collection)?;
        self.save_schema(ctx, &collection, true)?;
        info!(collection = %collection.id, "created collection");
        Ok(collection)
    }

    pub fn get_collection(&self, _ctx: &AccessContext, id: &str) -> Result<Collection> {
        self.ensure_bootstrapped()?;
        self.load_schema(id)
    }

    pub fn list_collections(&self, _ctx: &AccessContext) -> Result<Vec<Collection>> {
        self.ensure_bootstrapped()?;
        let metadata = Collection::metadata();
        let raw = self.adapter.find(&metadata, &[])?;
        raw.into_iter()
            .map(|doc| {
                let decoded = codec::decode(&metadata, doc)?;
                Collection::from_document(&decoded)
            })
            .collect()
    }

    pub fn delete_collection(&self, _ctx: &AccessContext, id: &str) -> Result<bool> {
        self.ensure_bootstrapped()?;
        if id == METADATA_COLLECTION {
            return Err(DatabaseError::InvalidOperation(
                "The metadata collection cannot be deleted".into(),
            ));
        }
        if !self.adapter.collection_exists(id)? {
            return Ok(false);
        }
        self.adapter.delete_collection(id)?;
        self.adapter
            .delete_document(&Collection::metadata(), id)?;
        self.schemas.remove(id);
        self.purge_collection_cache(id);
        info!(collection = %id, "deleted collection");
        Ok(true)
    }

    // ==================================================================
    // Attributes
    // ==================================================================

    /// Pre-flight limit check for adding one attribute
    ///
    /// Raises `LimitException` with a distinct message for the attribute
    /// count ceiling versus the row width ceiling.
    pub fn check_attribute(&self, collection: &Collection, attribute: &Attribute) -> Result<()> {
        let limit = self.adapter.get_limit_for_attributes();
        let reserved = self.adapter.get_count_of_default_attributes();
        let count = collection.attributes.len() as u64 + 1 + reserved;
        if count > limit {
            return Err(DatabaseError::attribute_limit(limit.saturating_sub(reserved)));
        }

        let row_limit = self.adapter.get_row_size_limit();
        let width: u64 = collection
            .attributes
            .iter()
            .map(|a| self.adapter.get_attribute_width(a))
            .sum::<u64>()
            + self.adapter.get_attribute_width(attribute);
        if width > row_limit {
            return Err(DatabaseError::row_width_limit(row_limit));
        }
        Ok(())
    }

    pub fn create_attribute(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        attribute: Attribute,
    ) -> Result<()> {
        let mut collection = self.user_schema(collection_id)?;
        attribute.validate()?;
        self.check_attribute(&collection, &attribute)?;

        collection.add_attribute(attribute.clone())?;
        self.adapter.create_attribute(collection_id, &attribute)?;
        self.save_schema(ctx, &collection, false)?;
        debug!(collection = %collection_id, attribute = %attribute.key, "created attribute");
        Ok(())
    }

    /// Alter an attribute definition, including a key rename
    ///
    /// `key` addresses the existing attribute; `attribute.key` may differ,
    /// which renames it and cascades into every index referencing the old
    /// key. Vector dimensionality is immutable.
    pub fn update_attribute(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        key: &str,
        attribute: Attribute,
    ) -> Result<()> {
        let mut collection = self.user_schema(collection_id)?;
        let existing = collection
            .attribute(key)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("Attribute \"{key}\"")))?;

        attribute.validate()?;

        match (&existing.kind, &attribute.kind) {
            (AttributeKind::Vector { dimensions: old }, AttributeKind::Vector { dimensions: new })
                if old != new =>
            {
                return Err(DatabaseError::InvalidOperation(
                    "Vector attribute dimensions are immutable".into(),
                ));
            }
            (AttributeKind::Vector { .. }, other) if !other.is_vector() => {
                return Err(DatabaseError::InvalidOperation(format!(
                    "Vector attribute \"{key}\" cannot change type"
                )));
            }
            (other, AttributeKind::Vector { .. }) if !other.is_vector() => {
                return Err(DatabaseError::InvalidOperation(format!(
                    "Attribute \"{key}\" cannot change type to vector"
                )));
            }
            _ => {}
        }

        // Width re-check with the old attribute swapped out
        let row_limit = self.adapter.get_row_size_limit();
        let width: u64 = collection
            .attributes
            .iter()
            .filter(|a| !a.key.eq_ignore_ascii_case(key))
            .map(|a| self.adapter.get_attribute_width(a))
            .sum::<u64>()
            + self.adapter.get_attribute_width(&attribute);
        if width > row_limit {
            return Err(DatabaseError::row_width_limit(row_limit));
        }

        let renamed = !attribute.key.eq_ignore_ascii_case(key);
        if renamed {
            if collection.has_attribute(&attribute.key) {
                return Err(DatabaseError::Duplicate(format!(
                    "Attribute \"{}\" already exists",
                    attribute.key
                )));
            }
            self.adapter
                .rename_attribute(collection_id, key, &attribute.key)?;
            collection.rename_attribute(key, &attribute.key)?;
        }

        self.adapter.update_attribute(collection_id, &attribute)?;
        let slot = collection
            .attributes
            .iter_mut()
            .find(|a| a.key.eq_ignore_ascii_case(&attribute.key))
            .expect("attribute present after rename");
        *slot = attribute.clone();

        self.save_schema(ctx, &collection, false)?;
        self.purge_collection_cache(collection_id);
        debug!(collection = %collection_id, attribute = %attribute.key, renamed, "updated attribute");
        Ok(())
    }

    /// Rename an attribute, keeping the rest of its definition
    pub fn rename_attribute(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        old: &str,
        new: &str,
    ) -> Result<()> {
        let collection = self.user_schema(collection_id)?;
        let mut attribute = collection
            .attribute(old)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("Attribute \"{old}\"")))?;
        attribute.key = new.to_string();
        self.update_attribute(ctx, collection_id, old, attribute)
    }

    pub fn delete_attribute(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        key: &str,
    ) -> Result<()> {
        let mut collection = self.user_schema(collection_id)?;
        let dropped_indexes: Vec<String> = collection
            .indexes
            .iter()
            .filter(|i| i.references(key))
            .map(|i| i.key.clone())
            .collect();

        collection.remove_attribute(key)?;
        for index in &dropped_indexes {
            self.adapter.delete_index(collection_id, index)?;
        }
        self.adapter.delete_attribute(collection_id, key)?;
        self.save_schema(ctx, &collection, false)?;
        self.purge_collection_cache(collection_id);
        debug!(collection = %collection_id, attribute = %key, "deleted attribute");
        Ok(())
    }

    // ==================================================================
    // Indexes
    // ==================================================================

    pub fn create_index(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        index: Index,
    ) -> Result<()> {
        let mut collection = self.user_schema(collection_id)?;
        index.validate(&collection.attributes)?;

        if index.kind == IndexKind::Fulltext && !self.adapter.supports_fulltext_index() {
            return Err(DatabaseError::InvalidOperation(
                "Fulltext indexes are not supported by this adapter".into(),
            ));
        }
        if index.kind.is_vector() && !self.adapter.supports_vectors() {
            return Err(DatabaseError::InvalidOperation(
                "Vector indexes are not supported by this adapter".into(),
            ));
        }

        collection.add_index(index.clone())?;
        self.adapter.create_index(collection_id, &index)?;
        self.save_schema(ctx, &collection, false)?;
        debug!(collection = %collection_id, index = %index.key, kind = index.kind.name(), "created index");
        Ok(())
    }

    pub fn delete_index(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        key: &str,
    ) -> Result<()> {
        let mut collection = self.user_schema(collection_id)?;
        collection.remove_index(key)?;
        self.adapter.delete_index(collection_id, key)?;
        self.save_schema(ctx, &collection, false)?;
        debug!(collection = %collection_id, index = %key, "deleted index");
        Ok(())
    }

    // ==================================================================
    // Documents
    // ==================================================================

    pub fn create_document(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        document: Document,
    ) -> Result<Document> {
        let collection = self.user_schema(collection_id)?;
        authorization::check_write(ctx, &collection, None, Action::Create)?;

        let prepared = self.prepare_create(ctx, &collection, document)?;
        let stored = self.adapter.create_document(&collection, prepared)?;
        let decoded = codec::decode(&collection, stored)?;
        debug!(collection = %collection_id, id = %decoded.id(), "created document");
        Ok(decoded)
    }

    /// Create a batch of documents, paging through the adapter
    ///
    /// Returns the created documents in input order and hands each one to
    /// `on_next` as it is persisted.
    pub fn create_documents(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        documents: Vec<Document>,
        batch_size: usize,
        mut on_next: Option<&mut dyn FnMut(&Document)>,
    ) -> Result<Vec<Document>> {
        let collection = self.user_schema(collection_id)?;
        authorization::check_write(ctx, &collection, None, Action::Create)?;

        let batch_size = if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size };
        let mut prepared = Vec::with_capacity(documents.len());
        for document in documents {
            prepared.push(self.prepare_create(ctx, &collection, document)?);
        }

        let mut created = Vec::with_capacity(prepared.len());
        for chunk in prepared.chunks(batch_size) {
            let stored = if self.adapter.supports_batch_operations() {
                self.adapter.create_documents(&collection, chunk.to_vec())?
            } else {
                let mut stored = Vec::with_capacity(chunk.len());
                for doc in chunk {
                    stored.push(self.adapter.create_document(&collection, doc.clone())?);
                }
                stored
            };
            for doc in stored {
                let decoded = codec::decode(&collection, doc)?;
                if let Some(callback) = on_next.as_deref_mut() {
                    callback(&decoded);
                }
                created.push(decoded);
            }
        }
        debug!(collection = %collection_id, count = created.len(), "created documents");
        Ok(created)
    }

    pub fn get_document(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        id: &str,
        queries: &[Query],
    ) -> Result<Option<Document>> {
        let collection = self.user_schema(collection_id)?;
        if ctx.validation_enabled() {
            query::validate_queries(queries, &collection)?;
        }
        let plan = QueryPlan::of(queries)?;

        let Some(document) = self.fetch_document(&collection, id)? else {
            return Ok(None);
        };
        if !self.tenant_visible(ctx, &document) {
            return Ok(None);
        }
        if !authorization::allows(ctx, &collection, &document, Action::Read) {
            return Ok(None);
        }
        Ok(Some(codec::apply_projection(document, &plan.selections)))
    }

    pub fn update_document(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        id: &str,
        update: DocumentUpdate,
    ) -> Result<Document> {
        let collection = self.user_schema(collection_id)?;
        let current = self
            .fetch_document(&collection, id)?
            .filter(|doc| self.tenant_visible(ctx, doc))
            .ok_or_else(|| DatabaseError::NotFound(format!("Document \"{id}\"")))?;

        self.check_conflict(ctx, &current)?;
        authorization::check_write(ctx, &collection, Some(&current), Action::Update)?;

        let merged = self.resolve_update(ctx, &collection, &current, update)?;
        let stored = self.adapter.update_document(&collection, merged)?;
        let decoded = codec::decode(&collection, stored)?;
        self.invalidate(collection_id, id);
        debug!(collection = %collection_id, id = %id, "updated document");
        Ok(decoded)
    }

    /// Apply one update payload to every matching document
    ///
    /// Operators resolve per document against that document's own current
    /// value, read immediately before its write. Matching is scoped to
    /// documents the caller may update; others are silently skipped, the
    /// same way read filtering hides unreadable documents.
    pub fn update_documents(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        update: DocumentUpdate,
        queries: &[Query],
        batch_size: usize,
        mut on_next: Option<&mut dyn FnMut(&Document)>,
    ) -> Result<usize> {
        let collection = self.user_schema(collection_id)?;
        if ctx.validation_enabled() {
            query::validate_queries(queries, &collection)?;
        }
        let batch_size = if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size };

        let targets = self.collect_write_targets(ctx, &collection, queries, Action::Update)?;
        let mut affected = 0usize;

        for chunk in targets.chunks(batch_size) {
            let mut batch = Vec::with_capacity(chunk.len());
            for id in chunk {
                // Fresh read right before the write: bulk operator input is
                // each document's value now, not a snapshot from match time.
                let Some(current) = self.fetch_document(&collection, id)? else {
                    continue;
                };
                self.check_conflict(ctx, &current)?;
                let merged = self.resolve_update(ctx, &collection, &current, update.clone())?;
                batch.push(merged);
            }

            let written = if self.adapter.supports_batch_operations() {
                self.adapter.update_documents(&collection, batch.clone())?
            } else {
                for doc in &batch {
                    self.adapter.update_document(&collection, doc.clone())?;
                }
                batch.len()
            };
            affected += written;

            for doc in batch {
                let id = doc.id().to_string();
                self.invalidate(collection_id, &id);
                if let Some(callback) = on_next.as_deref_mut() {
                    let fresh = self
                        .fetch_document(&collection, &id)?
                        .unwrap_or_default();
                    callback(&fresh);
                }
            }
        }
        debug!(collection = %collection_id, affected, "updated documents");
        Ok(affected)
    }

    pub fn upsert_document(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        id: &str,
        document: Document,
    ) -> Result<Document> {
        let collection = self.user_schema(collection_id)?;
        let existing = self
            .fetch_document(&collection, id)?
            .filter(|doc| self.tenant_visible(ctx, doc));

        match existing {
            Some(current) => {
                self.check_conflict(ctx, &current)?;
                authorization::check_write(ctx, &collection, Some(&current), Action::Update)?;
                let merged = self.resolve_update(
                    ctx,
                    &collection,
                    &current,
                    DocumentUpdate::from_document(&document),
                )?;
                let stored = if self.adapter.supports_upserts() {
                    self.adapter.upsert_document(&collection, merged)?
                } else {
                    self.adapter.update_document(&collection, merged)?
                };
                self.invalidate(collection_id, id);
                codec::decode(&collection, stored)
            }
            None => {
                authorization::check_write(ctx, &collection, None, Action::Create)?;
                let mut document = document;
                document.set_id(id);
                let prepared = self.prepare_create(ctx, &collection, document)?;
                let stored = if self.adapter.supports_upserts() {
                    self.adapter.upsert_document(&collection, prepared)?
                } else {
                    self.adapter.create_document(&collection, prepared)?
                };
                codec::decode(&collection, stored)
            }
        }
    }

    pub fn upsert_documents(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        documents: Vec<Document>,
        batch_size: usize,
    ) -> Result<Vec<Document>> {
        let batch_size = if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size };
        let mut results = Vec::with_capacity(documents.len());
        for chunk in documents.chunks(batch_size) {
            for document in chunk {
                let id = document.id().to_string();
                results.push(self.upsert_document(ctx, collection_id, &id, document.clone())?);
            }
        }
        Ok(results)
    }

    pub fn delete_document(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        id: &str,
    ) -> Result<bool> {
        let collection = self.user_schema(collection_id)?;
        let Some(current) = self
            .fetch_document(&collection, id)?
            .filter(|doc| self.tenant_visible(ctx, doc))
        else {
            return Ok(false);
        };

        self.check_conflict(ctx, &current)?;
        authorization::check_write(ctx, &collection, Some(&current), Action::Delete)?;

        let deleted = self.adapter.delete_document(&collection, id)?;
        self.invalidate(collection_id, id);
        debug!(collection = %collection_id, id = %id, "deleted document");
        Ok(deleted)
    }

    /// Delete every matching document the caller may delete
    pub fn delete_documents(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        queries: &[Query],
        batch_size: usize,
        mut on_next: Option<&mut dyn FnMut(&Document)>,
    ) -> Result<usize> {
        let collection = self.user_schema(collection_id)?;
        if ctx.validation_enabled() {
            query::validate_queries(queries, &collection)?;
        }
        let batch_size = if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size };

        let targets = self.collect_write_targets(ctx, &collection, queries, Action::Delete)?;
        let mut removed = 0usize;

        for chunk in targets.chunks(batch_size) {
            for id in chunk {
                let Some(current) = self.fetch_document(&collection, id)? else {
                    continue;
                };
                self.check_conflict(ctx, &current)?;
                if let Some(callback) = on_next.as_deref_mut() {
                    callback(&current);
                }
            }
            let ids: Vec<String> = chunk.to_vec();
            removed += if self.adapter.supports_batch_operations() {
                self.adapter.delete_documents(&collection, &ids)?
            } else {
                let mut count = 0;
                for id in &ids {
                    if self.adapter.delete_document(&collection, id)? {
                        count += 1;
                    }
                }
                count
            };
            for id in chunk {
                self.invalidate(collection_id, id);
            }
        }
        debug!(collection = %collection_id, removed, "deleted documents");
        Ok(removed)
    }

    // ==================================================================
    // Queries
    // ==================================================================

    pub fn find(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<Vec<Document>> {
        let collection = self.user_schema(collection_id)?;
        if ctx.validation_enabled() {
            query::validate_queries(queries, &collection)?;
        }
        let plan = QueryPlan::of(queries)?;
        self.check_query_capabilities(&plan)?;

        let adapter_queries = self.adapter_queries(ctx, queries);

        // Fast path: the whole collection is readable, the adapter's own
        // limit/offset/cursor handling is correct as-is.
        if !ctx.authorization_enabled()
            || authorization::collection_allows(ctx, &collection, Action::Read)
        {
            let raw = self.adapter.find(&collection, &adapter_queries)?;
            return raw
                .into_iter()
                .map(|doc| {
                    let decoded = codec::decode(&collection, doc)?;
                    Ok(codec::apply_projection(decoded, &plan.selections))
                })
                .collect();
        }

        // Collection-level read denied: only document grants can help.
        if !collection.document_security {
            return Ok(Vec::new());
        }
        self.find_permission_filtered(ctx, &collection, queries, &plan)
    }

    pub fn find_one(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<Option<Document>> {
        let mut queries = queries.to_vec();
        queries.retain(|q| !matches!(q, Query::Limit { .. }));
        queries.push(Query::limit(1));
        Ok(self.find(ctx, collection_id, &queries)?.into_iter().next())
    }

    pub fn count(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        queries: &[Query],
        max: Option<usize>,
    ) -> Result<usize> {
        let collection = self.user_schema(collection_id)?;
        if ctx.validation_enabled() {
            query::validate_queries(queries, &collection)?;
        }
        let adapter_queries = self.adapter_queries(ctx, queries);

        if !ctx.authorization_enabled()
            || authorization::collection_allows(ctx, &collection, Action::Read)
        {
            return self.adapter.count(&collection, &adapter_queries, max);
        }
        if !collection.document_security {
            return Ok(0);
        }

        let mut count = 0usize;
        self.stream_raw(&collection, &adapter_queries, |doc| {
            if authorization::allows(ctx, &collection, doc, Action::Read) {
                count += 1;
            }
            Ok(max.map_or(true, |m| count < m))
        })?;
        Ok(count)
    }

    pub fn sum(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        attribute: &str,
        queries: &[Query],
        max: Option<usize>,
    ) -> Result<f64> {
        let collection = self.user_schema(collection_id)?;
        let kind_ok = collection
            .attribute(attribute)
            .map(|a| a.kind.is_numeric() && !a.array)
            .unwrap_or(false);
        if !kind_ok {
            return Err(DatabaseError::Query(format!(
                "Cannot sum non-numeric attribute \"{attribute}\""
            )));
        }
        if ctx.validation_enabled() {
            query::validate_queries(queries, &collection)?;
        }
        let adapter_queries = self.adapter_queries(ctx, queries);

        if !ctx.authorization_enabled()
            || authorization::collection_allows(ctx, &collection, Action::Read)
        {
            return self.adapter.sum(&collection, attribute, &adapter_queries, max);
        }
        if !collection.document_security {
            return Ok(0.0);
        }

        let mut total = 0.0;
        let mut seen = 0usize;
        self.stream_raw(&collection, &adapter_queries, |doc| {
            if authorization::allows(ctx, &collection, doc, Action::Read) {
                if let Some(n) = doc.get(attribute).and_then(Value::as_number) {
                    total += n;
                }
                seen += 1;
            }
            Ok(max.map_or(true, |m| seen < m))
        })?;
        Ok(total)
    }

    /// Stream matching documents through a callback, page by page
    ///
    /// Cursor-forward only: a `cursor_before` query is rejected here even
    /// though `find` supports it.
    pub fn foreach(
        &self,
        ctx: &AccessContext,
        collection_id: &str,
        queries: &[Query],
        mut callback: impl FnMut(Document) -> Result<()>,
    ) -> Result<usize> {
        let plan = QueryPlan::of(queries)?;
        if matches!(plan.cursor, Some((_, query::CursorDirection::Before))) {
            return Err(DatabaseError::Query(
                "cursorBefore is not supported by foreach".into(),
            ));
        }

        let limit = plan.limit;
        let offset = plan.offset;
        let base: Vec<Query> = queries
            .iter()
            .filter(|q| {
                !matches!(
                    q,
                    Query::Limit { .. }
                        | Query::Offset { .. }
                        | Query::Select { .. }
                        | Query::CursorAfter { .. }
                )
            })
            .cloned()
            .collect();
        let mut cursor: Option<Document> = plan.cursor.clone().map(|(doc, _)| doc);
        let mut first_page = true;
        let mut processed = 0usize;

        loop {
            let remaining = limit.map_or(DEFAULT_BATCH_SIZE, |l| {
                l.saturating_sub(processed).min(DEFAULT_BATCH_SIZE)
            });
            if remaining == 0 {
                break;
            }

            let mut page_queries = base.clone();
            page_queries.push(Query::limit(remaining));
            // The caller's offset applies once, before the first page
            if first_page {
                if let Some(skip) = offset {
                    page_queries.push(Query::offset(skip));
                }
                first_page = false;
            }
            if let Some(anchor) = &cursor {
                page_queries.push(Query::cursor_after(anchor.clone()));
            }

            let page = self.find(ctx, collection_id, &page_queries)?;
            let fetched = page.len();
            for doc in page {
                cursor = Some(doc.clone());
                callback(doc)?;
                processed += 1;
            }
            if fetched < remaining {
                break;
            }
        }
        Ok(processed)
    }

    // ==================================================================
    // Internal helpers
    // ==================================================================

    fn load_schema(&self, id: &str) -> Result<Collection> {
        if id == METADATA_COLLECTION {
            return Ok(Collection::metadata());
        }
        if let Some(cached) = self.schemas.get(id) {
            return Ok(cached.clone());
        }
        let metadata = Collection::metadata();
        let raw = self
            .adapter
            .get_document(&metadata, id)?
            .ok_or_else(|| DatabaseError::NotFound(format!("Collection \"{id}\"")))?;
        let decoded = codec::decode(&metadata, raw)?;
        let collection = Collection::from_document(&decoded)?;
        self.schemas.insert(id.to_string(), collection.clone());
        Ok(collection)
    }

    /// Schema for a user collection write path; metadata is off limits
    fn user_schema(&self, id: &str) -> Result<Collection> {
        self.ensure_bootstrapped()?;
        if id == METADATA_COLLECTION {
            return Err(DatabaseError::InvalidOperation(
                "The metadata collection is managed through collection operations".into(),
            ));
        }
        self.load_schema(id)
    }

    /// Persist a collection document into the metadata collection
    fn save_schema(&self, _ctx: &AccessContext, collection: &Collection, create: bool) -> Result<()> {
        let metadata = Collection::metadata();
        let mut doc = collection.to_document()?;
        let now = docket_core::datetime::now();
        doc.set_updated_at(now);

        let encoded = codec::encode(&metadata, doc)?;
        if create {
            let mut encoded = encoded;
            encoded.set_created_at(now);
            self.adapter.create_document(&metadata, encoded)?;
        } else {
            // Preserve the original creation timestamp
            if let Some(existing) = self.adapter.get_document(&metadata, &collection.id)? {
                let mut encoded = encoded;
                if let Some(created) = existing.created_at() {
                    encoded.set_created_at(created);
                }
                encoded.assign_internal_id(existing.internal_id().unwrap_or_default());
                self.adapter.update_document(&metadata, encoded)?;
            }
        }
        self.schemas.insert(collection.id.clone(), collection.clone());
        Ok(())
    }

    fn check_collection_limits(&self, collection: &Collection) -> Result<()> {
        let limit = self.adapter.get_limit_for_attributes();
        let reserved = self.adapter.get_count_of_default_attributes();
        if collection.attributes.len() as u64 + reserved > limit {
            return Err(DatabaseError::attribute_limit(limit.saturating_sub(reserved)));
        }
        let row_limit = self.adapter.get_row_size_limit();
        let width: u64 = collection
            .attributes
            .iter()
            .map(|a| self.adapter.get_attribute_width(a))
            .sum();
        if width > row_limit {
            return Err(DatabaseError::row_width_limit(row_limit));
        }
        Ok(())
    }

    fn check_capabilities(&self, collection: &Collection) -> Result<()> {
        let has_vectors = collection.attributes.iter().any(|a| a.kind.is_vector());
        if has_vectors && !self.adapter.supports_vectors() {
            return Err(DatabaseError::InvalidOperation(
                "Vector attributes are not supported by this adapter".into(),
            ));
        }
        let has_fulltext = collection
            .indexes
            .iter()
            .any(|i| i.kind == IndexKind::Fulltext);
        if has_fulltext && !self.adapter.supports_fulltext_index() {
            return Err(DatabaseError::InvalidOperation(
                "Fulltext indexes are not supported by this adapter".into(),
            ));
        }
        Ok(())
    }

    fn check_query_capabilities(&self, plan: &QueryPlan) -> Result<()> {
        if plan.vector.is_some() && !self.adapter.supports_vectors() {
            return Err(DatabaseError::InvalidOperation(
                "Vector queries are not supported by this adapter".into(),
            ));
        }
        if !self.adapter.supports_query_contains() {
            fn has_contains(queries: &[Query]) -> bool {
                queries.iter().any(|q| match q {
                    Query::Contains { .. } => true,
                    Query::And { queries } | Query::Or { queries } => has_contains(queries),
                    _ => false,
                })
            }
            if has_contains(&plan.filters) {
                return Err(DatabaseError::InvalidOperation(
                    "Contains queries are not supported by this adapter".into(),
                ));
            }
        }
        Ok(())
    }

    /// Queries forwarded to the adapter: tenant scoping appended, projection
    /// stripped (the engine projects after decode)
    fn adapter_queries(&self, ctx: &AccessContext, queries: &[Query]) -> Vec<Query> {
        let mut result: Vec<Query> = queries
            .iter()
            .filter(|q| !matches!(q, Query::Select { .. }))
            .cloned()
            .collect();
        if self.adapter.shared_tables() {
            match ctx.tenant() {
                Some(tenant) => result.push(Query::equal(
                    doc_fields::KEY_TENANT,
                    vec![Value::from(tenant)],
                )),
                None => result.push(Query::is_null(doc_fields::KEY_TENANT)),
            }
        }
        result
    }

    /// Over-fetch-and-filter pagination for permission-filtered reads
    fn find_permission_filtered(
        &self,
        ctx: &AccessContext,
        collection: &Collection,
        queries: &[Query],
        plan: &QueryPlan,
    ) -> Result<Vec<Document>> {
        let offset = plan.offset.unwrap_or(0);
        let before = matches!(plan.cursor, Some((_, query::CursorDirection::Before)));

        let base: Vec<Query> = self
            .adapter_queries(ctx, queries)
            .into_iter()
            .filter(|q| !matches!(q, Query::Limit { .. } | Query::Offset { .. }))
            .collect();

        // Without a limit there is nothing to over-fetch against: take every
        // match once and filter.
        let Some(limit) = plan.limit else {
            let raw = self.adapter.find(collection, &base)?;
            let mut visible: Vec<Document> = raw
                .into_iter()
                .filter(|doc| authorization::allows(ctx, collection, doc, Action::Read))
                .collect();
            if before {
                // Offset counts backwards from the anchor
                visible.truncate(visible.len().saturating_sub(offset));
            } else {
                visible.drain(..offset.min(visible.len()));
            }
            return visible
                .into_iter()
                .map(|doc| {
                    let decoded = codec::decode(collection, doc)?;
                    Ok(codec::apply_projection(decoded, &plan.selections))
                })
                .collect();
        };

        let needed = limit + offset;
        let mut fetch = needed.max(1) * PERMISSION_OVERFETCH_FACTOR;
        loop {
            let mut page_queries = base.clone();
            page_queries.push(Query::limit(fetch));
            let raw = self.adapter.find(collection, &page_queries)?;
            let exhausted = raw.len() < fetch;

            let mut visible = Vec::new();
            for doc in raw {
                if authorization::allows(ctx, collection, &doc, Action::Read) {
                    visible.push(doc);
                }
            }

            if visible.len() >= needed || exhausted {
                let window: Vec<Document> = if before {
                    // Pages before the anchor: offset and limit count from
                    // the anchor backwards, order stays ascending.
                    let end = visible.len().saturating_sub(offset);
                    let start = end.saturating_sub(limit);
                    visible[start..end].to_vec()
                } else {
                    visible.into_iter().skip(offset).take(limit).collect()
                };
                return window
                    .into_iter()
                    .map(|doc| {
                        let decoded = codec::decode(collection, doc)?;
                        Ok(codec::apply_projection(decoded, &plan.selections))
                    })
                    .collect();
            }
            fetch *= 2;
        }
    }

    /// Page raw (encoded) matches through a callback using natural order
    ///
    /// The callback returns `false` to stop early.
    fn stream_raw(
        &self,
        collection: &Collection,
        queries: &[Query],
        mut callback: impl FnMut(&Document) -> Result<bool>,
    ) -> Result<()> {
        let base: Vec<Query> = queries
            .iter()
            .filter(|q| {
                !matches!(
                    q,
                    Query::Limit { .. }
                        | Query::Offset { .. }
                        | Query::CursorAfter { .. }
                        | Query::CursorBefore { .. }
                )
            })
            .cloned()
            .collect();

        let mut cursor: Option<Document> = None;
        loop {
            let mut page_queries = base.clone();
            page_queries.push(Query::limit(DEFAULT_BATCH_SIZE));
            if let Some(anchor) = &cursor {
                page_queries.push(Query::cursor_after(anchor.clone()));
            }
            let page = self.adapter.find(collection, &page_queries)?;
            let fetched = page.len();
            for doc in page {
                let keep_going = callback(&doc)?;
                cursor = Some(doc);
                if !keep_going {
                    return Ok(());
                }
            }
            if fetched < DEFAULT_BATCH_SIZE {
                return Ok(());
            }
        }
    }

    /// Ids of matching documents the caller may mutate, in cursor order
    fn collect_write_targets(
        &self,
        ctx: &AccessContext,
        collection: &Collection,
        queries: &[Query],
        action: Action,
    ) -> Result<Vec<String>> {
        let adapter_queries = self.adapter_queries(ctx, queries);
        let mut targets = Vec::new();
        self.stream_raw(collection, &adapter_queries, |doc| {
            if authorization::allows(ctx, collection, doc, action) {
                targets.push(doc.id().to_string());
            }
            Ok(true)
        })?;
        Ok(targets)
    }

    /// Shared creation pipeline: id, tenant, defaults, timestamps,
    /// validation, size check, encode
    fn prepare_create(
        &self,
        ctx: &AccessContext,
        collection: &Collection,
        mut document: Document,
    ) -> Result<Document> {
        if document.id().is_empty() || document.id() == ID_UNIQUE {
            document.set_id(uuid::Uuid::new_v4().to_string());
        }
        document.set_collection(&collection.id);
        if self.adapter.shared_tables() {
            document.set_tenant(ctx.tenant().map(str::to_string));
        }

        for attribute in &collection.attributes {
            if document.get(&attribute.key).is_none() {
                if let Some(default) = &attribute.default {
                    document.set(attribute.key.clone(), default.clone());
                }
            }
        }

        if ctx.validation_enabled() {
            structure::validate_document(collection, &document)?;
        }
        self.check_document_size(&document)?;

        let now = docket_core::datetime::now();
        document.set_created_at(now);
        document.set_updated_at(now);

        codec::encode(collection, document)
    }

    /// Merge an update payload over the current document, resolving
    /// operators against current values and re-validating the result
    fn resolve_update(
        &self,
        ctx: &AccessContext,
        collection: &Collection,
        current: &Document,
        update: DocumentUpdate,
    ) -> Result<Document> {
        let mut merged = current.clone();
        if let Some(permissions) = update.permissions {
            merged.set_permissions(permissions);
        }

        for (key, patch) in update.fields {
            match patch {
                Patch::Set(value) => merged.set(key, value),
                Patch::Apply(operator) => {
                    let attribute = collection.attribute(&key).ok_or_else(|| {
                        DatabaseError::Structure(format!("Unknown attribute: \"{key}\""))
                    })?;
                    let seed = current
                        .get(&key)
                        .cloned()
                        .or_else(|| attribute.default.clone())
                        .unwrap_or(Value::Null);
                    let resolved = operator.apply(attribute, &seed)?;
                    merged.set(key, resolved);
                }
            }
        }

        if ctx.validation_enabled() {
            structure::validate_document(collection, &merged)?;
        }
        self.check_document_size(&merged)?;

        merged.set_updated_at(docket_core::datetime::now());
        codec::encode(collection, merged)
    }

    fn check_document_size(&self, document: &Document) -> Result<()> {
        let limit = self.adapter.get_document_size_limit();
        if limit == 0 {
            return Ok(());
        }
        let size = serde_json::to_string(document)
            .map(|s| s.len() as u64)
            .unwrap_or(u64::MAX);
        if size > limit {
            return Err(DatabaseError::Structure(format!(
                "Document size of {size} bytes exceeds the limit of {limit} bytes"
            )));
        }
        Ok(())
    }

    fn check_conflict(&self, ctx: &AccessContext, current: &Document) -> Result<()> {
        if let (Some(request), Some(updated)) = (ctx.request_timestamp(), current.updated_at()) {
            if updated > request {
                return Err(DatabaseError::Conflict);
            }
        }
        Ok(())
    }

    fn tenant_visible(&self, ctx: &AccessContext, document: &Document) -> bool {
        if !self.adapter.shared_tables() {
            return true;
        }
        document.tenant() == ctx.tenant()
    }

    /// Cached, decoded fetch without permission gating
    fn fetch_document(&self, collection: &Collection, id: &str) -> Result<Option<Document>> {
        let key = (collection.id.clone(), id.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached.clone()));
        }
        let Some(raw) = self.adapter.get_document(collection, id)? else {
            return Ok(None);
        };
        let decoded = codec::decode(collection, raw)?;
        self.cache.insert(key, decoded.clone());
        Ok(Some(decoded))
    }

    fn invalidate(&self, collection_id: &str, id: &str) {
        self.cache
            .remove(&(collection_id.to_string(), id.to_string()));
    }

    fn purge_collection_cache(&self, collection_id: &str) {
        self.cache.retain(|(col, _), _| col != collection_id);
    }
}
