//! Document record
//!
//! A `Document` is one schema-conforming record: internal fields (`$id`,
//! `$internalId`, `$collection`, `$permissions`, `$createdAt`, `$updatedAt`,
//! `$tenant`) plus an ordered attribute map. Internal fields are excluded
//! from normal attribute iteration; queries address them through their
//! `$`-prefixed keys.
//!
//! The internal numeric id is assigned exactly once, by the adapter at
//! creation, and never changes afterwards.

use crate::datetime;
use crate::permission::{Action, Permission, Role};
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const KEY_ID: &str = "$id";
pub const KEY_INTERNAL_ID: &str = "$internalId";
pub const KEY_COLLECTION: &str = "$collection";
pub const KEY_PERMISSIONS: &str = "$permissions";
pub const KEY_CREATED_AT: &str = "$createdAt";
pub const KEY_UPDATED_AT: &str = "$updatedAt";
pub const KEY_TENANT: &str = "$tenant";

/// All internal field keys, in canonical order
pub const INTERNAL_KEYS: [&str; 7] = [
    KEY_ID,
    KEY_INTERNAL_ID,
    KEY_COLLECTION,
    KEY_PERMISSIONS,
    KEY_CREATED_AT,
    KEY_UPDATED_AT,
    KEY_TENANT,
];

/// Whether a key addresses an internal field rather than a schema attribute
pub fn is_internal_key(key: &str) -> bool {
    key.starts_with('$')
}

/// One document record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id", default, skip_serializing_if = "String::is_empty")]
    id: String,

    #[serde(rename = "$internalId", default, skip_serializing_if = "Option::is_none")]
    internal_id: Option<u64>,

    #[serde(rename = "$collection", default, skip_serializing_if = "String::is_empty")]
    collection: String,

    #[serde(rename = "$permissions", default, skip_serializing_if = "Vec::is_empty")]
    permissions: Vec<Permission>,

    #[serde(
        rename = "$createdAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "wire_datetime"
    )]
    created_at: Option<DateTime<Utc>>,

    #[serde(
        rename = "$updatedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "wire_datetime"
    )]
    updated_at: Option<DateTime<Utc>>,

    #[serde(rename = "$tenant", default, skip_serializing_if = "Option::is_none")]
    tenant: Option<String>,

    #[serde(flatten)]
    attributes: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            ..Document::default()
        }
    }

    /// Builder-style attribute setter, mainly for payload construction
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn internal_id(&self) -> Option<u64> {
        self.internal_id
    }

    /// Assign the internal id. A second assignment is ignored; the id is
    /// immutable once set.
    pub fn assign_internal_id(&mut self, internal_id: u64) {
        if self.internal_id.is_none() {
            self.internal_id = Some(internal_id);
        }
    }

    /// Strip the internal id, used when cloning a record into a new document
    pub fn clear_internal_id(&mut self) {
        self.internal_id = None;
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn set_collection(&mut self, collection: impl Into<String>) {
        self.collection = collection.into();
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn set_permissions(&mut self, permissions: Vec<Permission>) {
        self.permissions = permissions;
    }

    /// Roles granted a specific action by this document's own permissions
    pub fn roles_for(&self, action: Action) -> impl Iterator<Item = &Role> {
        self.permissions
            .iter()
            .filter(move |p| p.action() == action)
            .map(|p| p.role())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    pub fn clear_created_at(&mut self) {
        self.created_at = None;
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    pub fn clear_updated_at(&mut self) {
        self.updated_at = None;
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn set_tenant(&mut self, tenant: Option<String>) {
        self.tenant = tenant;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.attributes
    }

    /// Whether the document carries no attributes and no id. An empty
    /// document is what `get_document` returns for unknown ids.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.attributes.is_empty()
    }

    /// Value of any addressable field, internal fields included
    ///
    /// Used for order comparison and cursor anchoring, where `$internalId`
    /// and timestamps must be comparable like any attribute.
    pub fn value_of(&self, key: &str) -> Value {
        match key {
            KEY_ID => Value::String(self.id.clone()),
            KEY_INTERNAL_ID => self
                .internal_id
                .map(|i| Value::Int(i as i64))
                .unwrap_or(Value::Null),
            KEY_COLLECTION => Value::String(self.collection.clone()),
            KEY_PERMISSIONS => Value::Array(
                self.permissions
                    .iter()
                    .map(|p| Value::String(p.to_string()))
                    .collect(),
            ),
            KEY_CREATED_AT => self
                .created_at
                .map(|t| Value::String(datetime::format_utc(&t)))
                .unwrap_or(Value::Null),
            KEY_UPDATED_AT => self
                .updated_at
                .map(|t| Value::String(datetime::format_utc(&t)))
                .unwrap_or(Value::Null),
            KEY_TENANT => self
                .tenant
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            attribute => self.attributes.get(attribute).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Serde adapter emitting timestamps in the canonical wire format
mod wire_datetime {
    use crate::datetime;
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&datetime::format_utc(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) => {
                let parsed = datetime::parse(&s).map_err(de::Error::custom)?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }
}
