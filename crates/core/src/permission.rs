//! Permission and role model
//!
//! A `Permission` grants one `Action` to one `Role`. The serialized grammar
//! is `action("role")`, e.g. `read("any")` or `update("user:alice")`.
//! Role strings: `any`, `users`, `guests`, `user:<id>`.

use crate::error::{DatabaseError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Action a permission grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(Action::Read),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(DatabaseError::Structure(format!(
                "Invalid permission action \"{other}\""
            ))),
        }
    }
}

/// Subject a permission applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Every caller, authenticated or not
    Any,
    /// Any authenticated user
    Users,
    /// Unauthenticated callers only
    Guests,
    /// One specific user id
    User(String),
}

impl Role {
    pub fn user(id: impl Into<String>) -> Self {
        Role::User(id.into())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Any => f.write_str("any"),
            Role::Users => f.write_str("users"),
            Role::Guests => f.write_str("guests"),
            Role::User(id) => write!(f, "user:{id}"),
        }
    }
}

impl FromStr for Role {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "any" => Ok(Role::Any),
            "users" => Ok(Role::Users),
            "guests" => Ok(Role::Guests),
            other => match other.strip_prefix("user:") {
                Some(id) if !id.is_empty() => Ok(Role::User(id.to_string())),
                _ => Err(DatabaseError::Structure(format!(
                    "Invalid permission role \"{other}\""
                ))),
            },
        }
    }
}

/// One grant: an action allowed for a role
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    action: Action,
    role: Role,
}

impl Permission {
    pub fn new(action: Action, role: Role) -> Self {
        Permission { action, role }
    }

    pub fn read(role: Role) -> Self {
        Permission::new(Action::Read, role)
    }

    pub fn create(role: Role) -> Self {
        Permission::new(Action::Create, role)
    }

    pub fn update(role: Role) -> Self {
        Permission::new(Action::Update, role)
    }

    pub fn delete(role: Role) -> Self {
        Permission::new(Action::Delete, role)
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn role(&self) -> &Role {
        &self.role
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(\"{}\")", self.action, self.role)
    }
}

impl FromStr for Permission {
    type Err = DatabaseError;

    /// Parse the `action("role")` form, strictly
    fn from_str(s: &str) -> Result<Self> {
        let malformed =
            || DatabaseError::Structure(format!("Invalid permission string \"{s}\""));

        let open = s.find('(').ok_or_else(malformed)?;
        if !s.ends_with(')') {
            return Err(malformed());
        }
        let action: Action = s[..open].parse()?;
        let inner = &s[open + 1..s.len() - 1];
        let quoted = inner
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .ok_or_else(malformed)?;
        let role: Role = quoted.parse()?;
        Ok(Permission::new(action, role))
    }
}

// Permissions serialize as their wire string, matching the adapter contract.
impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
