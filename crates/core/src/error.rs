//! Error taxonomy for the document database core
//!
//! Every failure surfaced by the core maps onto one of these variants. We use
//! `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Propagation policy: errors are raised synchronously to the caller and never
//! retried inside the core. The single deliberate exception is read
//! authorization, which silently filters documents out of result sets instead
//! of raising.

use crate::permission::Action;
use thiserror::Error;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error type for all core database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Duplicate document id or schema key (case-insensitive)
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Document failed schema validation; names the offending attribute
    #[error("Invalid document structure: {0}")]
    Structure(String),

    /// Attribute count or row width ceiling exceeded
    #[error("{0}")]
    Limit(String),

    /// A write action was denied by permission evaluation
    #[error("Missing \"{action}\" permission for role(s) [{roles}]")]
    Authorization {
        /// The denied action
        action: Action,
        /// The caller's active roles at the time of the check
        roles: String,
    },

    /// Optimistic concurrency check failed
    #[error("Document was updated after the request timestamp")]
    Conflict,

    /// Operator applied to an incompatible attribute or operand
    #[error("{0}")]
    Operator(String),

    /// Malformed or semantically invalid query
    #[error("Invalid query: {0}")]
    Query(String),

    /// Referenced collection, attribute or index does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation is not valid in the current state or for this adapter
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Database has not been bootstrapped, or bootstrap failed
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Backend adapter failure
    #[error("Adapter error: {0}")]
    Adapter(String),
}

impl DatabaseError {
    /// Attribute-count ceiling error, distinguishable from the row-width one
    pub fn attribute_limit(max: u64) -> Self {
        DatabaseError::Limit(format!("Attribute limit of {max} exceeded"))
    }

    /// Row-width ceiling error, distinguishable from the attribute-count one
    pub fn row_width_limit(max: u64) -> Self {
        DatabaseError::Limit(format!("Row width limit of {max} bytes exceeded"))
    }

    pub fn adapter(message: impl Into<String>) -> Self {
        DatabaseError::Adapter(message.into())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DatabaseError::Duplicate(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict)
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, DatabaseError::Authorization { .. })
    }
}
