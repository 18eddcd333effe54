//! DocketDB - backend-agnostic document database core
//!
//! DocketDB is a schema-validated document store with a query/filter AST,
//! role-based permissions, atomic server-side update operators, optimistic
//! concurrency and vector-similarity search. Persistence goes through the
//! pluggable [`Adapter`] trait; `MemoryAdapter` is the bundled reference
//! backend.
//!
//! # Quick Start
//!
//! ```
//! use docketdb::{
//!     AccessContext, Attribute, Collection, Database, Document, DocumentUpdate,
//!     MemoryAdapter, Operator,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> docketdb::Result<()> {
//! let db = Database::new(Arc::new(MemoryAdapter::default()));
//! db.bootstrap()?;
//!
//! let ctx = AccessContext::privileged();
//! db.create_collection(&ctx, Collection::new("articles")
//!     .with_attribute(Attribute::string("title", 128).required())
//!     .with_attribute(Attribute::integer("views").with_default(0i64)))?;
//!
//! db.create_document(&ctx, "articles", Document::new("a1").with("title", "hello"))?;
//! let updated = db.update_document(&ctx, "articles", "a1",
//!     DocumentUpdate::new().apply("views", Operator::increment(1i64)))?;
//! assert_eq!(updated.get("views"), Some(&docketdb::Value::Int(1)));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `docket-core`: data model, query model, permission grammar, error
//!   taxonomy and the `Adapter` contract
//! - `docket-engine`: the execution engine (validation, authorization,
//!   operator resolution, conflict detection, bulk orchestration)
//! - `docket-memory`: the in-memory reference adapter

pub use docket_core::*;
pub use docket_engine::{
    AccessContext, ArrayPredicate, Database, DocumentUpdate, Operator, Patch, DEFAULT_BATCH_SIZE,
    ID_UNIQUE,
};
pub use docket_memory::{MemoryAdapter, MemoryConfig};
