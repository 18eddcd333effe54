//! docket-core: data model and contracts for DocketDB
//!
//! This crate holds everything the execution engine and the storage adapters
//! agree on: the value and document models, the schema model, the query AST,
//! the permission grammar, the error taxonomy and the `Adapter` trait.
//!
//! It contains no execution logic and no storage; see `docket-engine` for
//! orchestration and `docket-memory` for the reference adapter.

pub mod adapter;
pub mod datetime;
pub mod document;
pub mod error;
pub mod filters;
pub mod limits;
pub mod permission;
pub mod query;
pub mod schema;
pub mod value;

pub use adapter::Adapter;
pub use document::Document;
pub use error::{DatabaseError, Result};
pub use filters::FilterTag;
pub use permission::{Action, Permission, Role};
pub use query::{Query, QueryPlan, VectorMetric, VectorQuery};
pub use schema::{
    Attribute, AttributeKind, Collection, Format, Index, IndexKind, SortOrder,
    METADATA_COLLECTION,
};
pub use value::Value;
