//! Permission evaluation
//!
//! An action is permitted when the collection-level permissions grant it, or,
//! with `document_security` enabled, when the document's own permissions
//! grant it. Either source is sufficient (union semantics).
//!
//! Write denials raise `AuthorizationException`. Read denials never raise:
//! unreadable documents are filtered out of result sets, and direct lookups
//! return nothing.

use crate::context::AccessContext;
use docket_core::{Action, Collection, DatabaseError, Document, Result, Role};

/// Whether any grant in `roles` matches the caller's active role set
fn roles_match<'a>(ctx: &AccessContext, mut granted: impl Iterator<Item = &'a Role>) -> bool {
    granted.any(|role| matches!(role, Role::Any) || ctx.has_role(role))
}

/// Evaluate `action` against collection-level grants only
pub fn collection_allows(ctx: &AccessContext, collection: &Collection, action: Action) -> bool {
    if !ctx.authorization_enabled() {
        return true;
    }
    roles_match(ctx, collection.roles_for(action))
}

/// Evaluate `action` against the union of collection and document grants
pub fn allows(
    ctx: &AccessContext,
    collection: &Collection,
    document: &Document,
    action: Action,
) -> bool {
    if !ctx.authorization_enabled() {
        return true;
    }
    if roles_match(ctx, collection.roles_for(action)) {
        return true;
    }
    collection.document_security && roles_match(ctx, document.roles_for(action))
}

/// Raise `AuthorizationException` unless the write action is permitted
pub fn check_write(
    ctx: &AccessContext,
    collection: &Collection,
    document: Option<&Document>,
    action: Action,
) -> Result<()> {
    let permitted = match document {
        Some(doc) => allows(ctx, collection, doc, action),
        None => collection_allows(ctx, collection, action),
    };
    if permitted {
        Ok(())
    } else {
        Err(DatabaseError::Authorization {
            action,
            roles: ctx.roles_display(),
        })
    }
}
