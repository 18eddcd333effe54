//! docket-engine: the execution engine for DocketDB
//!
//! Orchestrates schema operations, the document write state machine,
//! query execution with permission filtering, atomic update operators and
//! batched bulk operations over any `docket_core::Adapter`.
//!
//! # Quick start
//!
//! ```ignore
//! use docket_engine::{AccessContext, Database, DocumentUpdate, Operator};
//! use docket_core::{Attribute, Collection, Document};
//! use std::sync::Arc;
//!
//! let db = Database::new(Arc::new(adapter));
//! db.bootstrap()?;
//!
//! let ctx = AccessContext::privileged();
//! db.create_collection(&ctx, Collection::new("articles")
//!     .with_attribute(Attribute::string("title", 128).required())
//!     .with_attribute(Attribute::integer("views").with_default(0i64)))?;
//!
//! db.create_document(&ctx, "articles", Document::new("a1").with("title", "hello"))?;
//! db.update_document(&ctx, "articles", "a1",
//!     DocumentUpdate::new().apply("views", Operator::increment(1i64)))?;
//! ```

pub mod authorization;
pub mod codec;
pub mod context;
pub mod database;
pub mod operator;
pub mod structure;

pub use context::AccessContext;
pub use database::{Database, DocumentUpdate, DEFAULT_BATCH_SIZE, ID_UNIQUE};
pub use operator::{ArrayPredicate, Operator, Patch};
