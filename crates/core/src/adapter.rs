//! Adapter contract
//!
//! The `Adapter` trait is the only seam between the core and a physical
//! backend (relational, document store, in-memory). The core decides *when*
//! schema changes, document writes and queries happen and with what
//! parameters; the adapter owns *how* they hit storage.
//!
//! Adapters self-report capabilities; the engine branches on them instead of
//! probing. Internal-id assignment is an adapter duty: `create_document`
//! must assign a stable, monotonically increasing id exactly once.
//!
//! Thread safety: all methods must be safe to call concurrently
//! (`Send + Sync`).

use crate::document::Document;
use crate::error::Result;
use crate::limits::MAX_VECTOR_DIMENSIONS;
use crate::query::Query;
use crate::schema::{Attribute, Collection, Index};

/// Storage backend abstraction
pub trait Adapter: Send + Sync {
    // ------------------------------------------------------------------
    // Schema operations
    // ------------------------------------------------------------------

    /// Create the physical collection with its initial attributes and indexes
    ///
    /// # Errors
    ///
    /// `Duplicate` if a collection with this id (case-insensitive) exists.
    fn create_collection(&self, collection: &Collection) -> Result<()>;

    /// Drop a collection and all of its documents
    fn delete_collection(&self, id: &str) -> Result<()>;

    /// Whether the physical collection exists
    fn collection_exists(&self, id: &str) -> Result<bool>;

    /// Add one attribute to an existing collection
    fn create_attribute(&self, collection: &str, attribute: &Attribute) -> Result<()>;

    /// Alter an existing attribute in place (same key)
    fn update_attribute(&self, collection: &str, attribute: &Attribute) -> Result<()>;

    /// Rename an attribute; stored values must stay reachable under the new
    /// key and become unreachable under the old one
    fn rename_attribute(&self, collection: &str, old: &str, new: &str) -> Result<()>;

    /// Drop an attribute and its stored values
    fn delete_attribute(&self, collection: &str, key: &str) -> Result<()>;

    fn create_index(&self, collection: &str, index: &Index) -> Result<()>;

    fn delete_index(&self, collection: &str, key: &str) -> Result<()>;

    // ------------------------------------------------------------------
    // Document operations
    // ------------------------------------------------------------------

    /// Persist a new document, assigning its internal id
    ///
    /// # Errors
    ///
    /// `Duplicate` if the id already exists in the collection
    /// (case-insensitive, scoped by tenant under shared tables).
    fn create_document(&self, collection: &Collection, document: Document) -> Result<Document>;

    /// Persist a batch of new documents in input order
    fn create_documents(
        &self,
        collection: &Collection,
        documents: Vec<Document>,
    ) -> Result<Vec<Document>>;

    /// Overwrite an existing document's attributes and permissions
    fn update_document(&self, collection: &Collection, document: Document) -> Result<Document>;

    /// Batch form of `update_document`; returns the number of rows written
    fn update_documents(&self, collection: &Collection, documents: Vec<Document>)
        -> Result<usize>;

    /// Create the document if absent, overwrite it otherwise
    fn upsert_document(&self, collection: &Collection, document: Document) -> Result<Document>;

    /// Delete by id; `Ok(false)` when the id did not exist
    fn delete_document(&self, collection: &Collection, id: &str) -> Result<bool>;

    /// Batch delete by id; returns the number of rows removed
    fn delete_documents(&self, collection: &Collection, ids: &[String]) -> Result<usize>;

    /// Fetch one document by id, `Ok(None)` when absent
    fn get_document(&self, collection: &Collection, id: &str) -> Result<Option<Document>>;

    /// Evaluate a query list and return matching documents in query order
    fn find(&self, collection: &Collection, queries: &[Query]) -> Result<Vec<Document>>;

    /// Count matching documents, optionally stopping at `max`
    fn count(&self, collection: &Collection, queries: &[Query], max: Option<usize>)
        -> Result<usize>;

    /// Sum a numeric attribute over matching documents
    fn sum(
        &self,
        collection: &Collection,
        attribute: &str,
        queries: &[Query],
        max: Option<usize>,
    ) -> Result<f64>;

    // ------------------------------------------------------------------
    // Sizing and limits
    // ------------------------------------------------------------------

    /// Row-width contribution of one attribute in bytes
    fn get_attribute_width(&self, attribute: &Attribute) -> u64 {
        attribute.storage_width()
    }

    /// Maximum number of attribute columns per collection
    fn get_limit_for_attributes(&self) -> u64;

    /// Columns reserved for internal fields, counted against the limit
    fn get_count_of_default_attributes(&self) -> u64;

    /// Row width ceiling in bytes
    fn get_row_size_limit(&self) -> u64;

    /// Encoded document size ceiling in bytes; 0 means unlimited
    fn get_document_size_limit(&self) -> u64 {
        0
    }

    fn get_max_vector_dimensions(&self) -> usize {
        MAX_VECTOR_DIMENSIONS
    }

    // ------------------------------------------------------------------
    // Capability flags
    // ------------------------------------------------------------------

    /// Whether the backend can evaluate update operators server-side
    fn supports_operators(&self) -> bool {
        false
    }

    fn supports_upserts(&self) -> bool {
        false
    }

    fn supports_batch_operations(&self) -> bool {
        false
    }

    fn supports_vectors(&self) -> bool {
        false
    }

    fn supports_fulltext_index(&self) -> bool {
        false
    }

    fn supports_fulltext_wildcard_index(&self) -> bool {
        false
    }

    fn supports_query_contains(&self) -> bool {
        true
    }

    /// Multi-tenant mode: rows carry a tenant id and reads are tenant-scoped
    fn shared_tables(&self) -> bool {
        false
    }
}
