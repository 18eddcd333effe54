//! Access context
//!
//! Every facade call receives an `AccessContext`: the caller's active roles,
//! the authorization and validation switches, the optional request timestamp
//! for optimistic concurrency, and the tenant under shared tables.
//!
//! The context is an immutable value. Scoped variants are derived with the
//! builder-style combinators (`skip_authorization`, `with_request_timestamp`,
//! ...), so "restoring prior state" is free: the original context is simply
//! untouched, on every exit path including panics.

use chrono::{DateTime, Utc};
use docket_core::Role;
use std::collections::BTreeSet;

/// Caller identity and per-call switches
#[derive(Debug, Clone, PartialEq)]
pub struct AccessContext {
    roles: BTreeSet<Role>,
    authorization: bool,
    validation: bool,
    request_timestamp: Option<DateTime<Utc>>,
    tenant: Option<String>,
}

impl Default for AccessContext {
    fn default() -> Self {
        AccessContext {
            roles: BTreeSet::new(),
            authorization: true,
            validation: true,
            request_timestamp: None,
            tenant: None,
        }
    }
}

impl AccessContext {
    /// Context with no roles; only `any`-granted permissions will match
    pub fn new() -> Self {
        AccessContext::default()
    }

    /// Context with authorization disabled, for trusted server-side calls
    pub fn privileged() -> Self {
        AccessContext::new().skip_authorization()
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn without_role(mut self, role: &Role) -> Self {
        self.roles.remove(role);
        self
    }

    pub fn clean_roles(mut self) -> Self {
        self.roles.clear();
        self
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Render the active roles for error messages
    pub fn roles_display(&self) -> String {
        self.roles
            .iter()
            .map(Role::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Disable permission checks for calls made with the derived context
    pub fn skip_authorization(mut self) -> Self {
        self.authorization = false;
        self
    }

    pub fn with_authorization(mut self) -> Self {
        self.authorization = true;
        self
    }

    pub fn authorization_enabled(&self) -> bool {
        self.authorization
    }

    /// Disable structure and query validation for the derived context
    pub fn skip_validation(mut self) -> Self {
        self.validation = false;
        self
    }

    pub fn with_validation(mut self) -> Self {
        self.validation = true;
        self
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation
    }

    /// Scope mutating calls to an optimistic-concurrency timestamp
    pub fn with_request_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.request_timestamp = Some(at);
        self
    }

    pub fn request_timestamp(&self) -> Option<DateTime<Utc>> {
        self.request_timestamp
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// Run a closure against an authorization-free variant of this context
    ///
    /// The receiver is left untouched, so prior state survives any exit path
    /// of the closure, including unwinding.
    pub fn skip<T>(&self, f: impl FnOnce(&AccessContext) -> T) -> T {
        let scoped = self.clone().skip_authorization();
        f(&scoped)
    }

    /// Run a closure against a validation-free variant of this context
    pub fn skip_validation_scope<T>(&self, f: impl FnOnce(&AccessContext) -> T) -> T {
        let scoped = self.clone().skip_validation();
        f(&scoped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_validating_and_authorized() {
        let ctx = AccessContext::new();
        assert!(ctx.authorization_enabled());
        assert!(ctx.validation_enabled());
        assert!(ctx.roles().is_empty());
        assert!(ctx.request_timestamp().is_none());
    }

    #[test]
    fn test_role_management() {
        let ctx = AccessContext::new()
            .with_role(Role::user("alice"))
            .with_role(Role::Users)
            .without_role(&Role::Users);
        assert!(ctx.has_role(&Role::user("alice")));
        assert!(!ctx.has_role(&Role::Users));

        let cleaned = ctx.clean_roles();
        assert!(cleaned.roles().is_empty());
    }

    #[test]
    fn test_skip_leaves_original_untouched() {
        let ctx = AccessContext::new().with_role(Role::user("a"));
        let inner_disabled = ctx.skip(|scoped| scoped.authorization_enabled());
        assert!(!inner_disabled);
        assert!(ctx.authorization_enabled());
    }

    #[test]
    fn test_skip_restores_even_on_panic() {
        let ctx = AccessContext::new();
        let result = std::panic::catch_unwind(|| {
            ctx.skip(|_| panic!("boom"));
        });
        assert!(result.is_err());
        assert!(ctx.authorization_enabled());
    }

    #[test]
    fn test_validation_scope_is_independent_of_authorization() {
        let ctx = AccessContext::new().skip_validation();
        assert!(!ctx.validation_enabled());
        assert!(ctx.authorization_enabled());
    }

    #[test]
    fn test_roles_display_sorted() {
        let ctx = AccessContext::new()
            .with_role(Role::user("zed"))
            .with_role(Role::Any);
        assert_eq!(ctx.roles_display(), "any, user:zed");
    }
}
