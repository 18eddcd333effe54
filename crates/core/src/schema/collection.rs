//! Collection schema
//!
//! A collection owns an ordered attribute list, its indexes, collection-level
//! permissions and the `document_security` switch. The schema is
//! self-hosting: every collection is persisted as a document inside a
//! reserved metadata collection, serialized through the `json` filter.

use crate::document::Document;
use crate::error::{DatabaseError, Result};
use crate::filters::FilterTag;
use crate::permission::{Action, Permission, Role};
use crate::schema::attribute::Attribute;
use crate::schema::index::Index;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Reserved collection holding one document per user collection
pub const METADATA_COLLECTION: &str = "_collections";

/// A named set of documents sharing one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub document_security: bool,
}

impl Collection {
    pub fn new(id: impl Into<String>) -> Self {
        Collection {
            id: id.into(),
            attributes: Vec::new(),
            indexes: Vec::new(),
            permissions: Vec::new(),
            document_security: false,
        }
    }

    /// The reserved metadata collection schema
    ///
    /// Attribute and index lists are stored as JSON text; engine-level writes
    /// to this collection bypass structure validation because the structured
    /// values only become strings at encode time.
    pub fn metadata() -> Self {
        Collection::new(METADATA_COLLECTION)
            .with_attribute(Attribute::string("attributes", 1_000_000).with_filter(FilterTag::Json))
            .with_attribute(Attribute::string("indexes", 1_000_000).with_filter(FilterTag::Json))
            .with_attribute(Attribute::boolean("documentSecurity"))
            .with_permissions(vec![
                Permission::new(Action::Read, Role::Any),
                Permission::new(Action::Create, Role::Any),
                Permission::new(Action::Update, Role::Any),
                Permission::new(Action::Delete, Role::Any),
            ])
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_document_security(mut self, enabled: bool) -> Self {
        self.document_security = enabled;
        self
    }

    /// Case-insensitive attribute lookup
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key.eq_ignore_ascii_case(key))
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    pub fn index(&self, key: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.key.eq_ignore_ascii_case(key))
    }

    /// Roles granted a specific action at the collection level
    pub fn roles_for(&self, action: Action) -> impl Iterator<Item = &Role> {
        self.permissions
            .iter()
            .filter(move |p| p.action() == action)
            .map(|p| p.role())
    }

    /// Add an attribute, rejecting case-insensitive duplicates
    pub fn add_attribute(&mut self, attribute: Attribute) -> Result<()> {
        attribute.validate()?;
        if self.has_attribute(&attribute.key) {
            return Err(DatabaseError::Duplicate(format!(
                "Attribute \"{}\" already exists",
                attribute.key
            )));
        }
        self.attributes.push(attribute);
        Ok(())
    }

    /// Remove an attribute and drop any index referencing it
    pub fn remove_attribute(&mut self, key: &str) -> Result<Attribute> {
        let position = self
            .attributes
            .iter()
            .position(|a| a.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| DatabaseError::NotFound(format!("Attribute \"{key}\"")))?;
        let removed = self.attributes.remove(position);
        self.indexes.retain(|index| !index.references(key));
        Ok(removed)
    }

    /// Rename an attribute, cascading into every index that references it
    pub fn rename_attribute(&mut self, old: &str, new: &str) -> Result<()> {
        if !old.eq_ignore_ascii_case(new) && self.has_attribute(new) {
            return Err(DatabaseError::Duplicate(format!(
                "Attribute \"{new}\" already exists"
            )));
        }
        let attribute = self
            .attributes
            .iter_mut()
            .find(|a| a.key.eq_ignore_ascii_case(old))
            .ok_or_else(|| DatabaseError::NotFound(format!("Attribute \"{old}\"")))?;
        attribute.key = new.to_string();
        for index in &mut self.indexes {
            index.rename_attribute(old, new);
        }
        Ok(())
    }

    pub fn add_index(&mut self, index: Index) -> Result<()> {
        index.validate(&self.attributes)?;
        if self.index(&index.key).is_some() {
            return Err(DatabaseError::Duplicate(format!(
                "Index \"{}\" already exists",
                index.key
            )));
        }
        self.indexes.push(index);
        Ok(())
    }

    pub fn remove_index(&mut self, key: &str) -> Result<Index> {
        let position = self
            .indexes
            .iter()
            .position(|i| i.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| DatabaseError::NotFound(format!("Index \"{key}\"")))?;
        Ok(self.indexes.remove(position))
    }

    /// Sum of per-attribute storage widths
    pub fn total_attribute_width(&self) -> u64 {
        self.attributes.iter().map(Attribute::storage_width).sum()
    }

    /// Validate the whole schema: every definition plus duplicate detection
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(DatabaseError::Structure("Collection id must not be empty".into()));
        }
        for (position, attribute) in self.attributes.iter().enumerate() {
            attribute.validate()?;
            let duplicate = self.attributes[..position]
                .iter()
                .any(|a| a.key.eq_ignore_ascii_case(&attribute.key));
            if duplicate {
                return Err(DatabaseError::Duplicate(format!(
                    "Attribute \"{}\" already exists",
                    attribute.key
                )));
            }
        }
        for (position, index) in self.indexes.iter().enumerate() {
            index.validate(&self.attributes)?;
            let duplicate = self.indexes[..position]
                .iter()
                .any(|i| i.key.eq_ignore_ascii_case(&index.key));
            if duplicate {
                return Err(DatabaseError::Duplicate(format!(
                    "Index \"{}\" already exists",
                    index.key
                )));
            }
        }
        Ok(())
    }

    /// Serialize into a metadata-collection document
    pub fn to_document(&self) -> Result<Document> {
        let attributes = serde_json::to_value(&self.attributes)
            .map_err(|e| DatabaseError::Structure(format!("Failed to serialize schema: {e}")))?;
        let indexes = serde_json::to_value(&self.indexes)
            .map_err(|e| DatabaseError::Structure(format!("Failed to serialize schema: {e}")))?;

        let mut doc = Document::new(&self.id);
        doc.set_collection(METADATA_COLLECTION);
        doc.set_permissions(self.permissions.clone());
        doc.set("attributes", Value::from(attributes));
        doc.set("indexes", Value::from(indexes));
        doc.set("documentSecurity", self.document_security);
        Ok(doc)
    }

    /// Restore a collection from its metadata-collection document
    pub fn from_document(doc: &Document) -> Result<Collection> {
        let invalid =
            |field: &str| DatabaseError::Initialization(format!("Corrupt schema field \"{field}\""));

        let attributes: Vec<Attribute> = match doc.get("attributes") {
            Some(value) => serde_json::from_value(serde_json::Value::from(value.clone()))
                .map_err(|_| invalid("attributes"))?,
            None => Vec::new(),
        };
        let indexes: Vec<Index> = match doc.get("indexes") {
            Some(value) => serde_json::from_value(serde_json::Value::from(value.clone()))
                .map_err(|_| invalid("indexes"))?,
            None => Vec::new(),
        };
        let document_security = doc
            .get("documentSecurity")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Collection {
            id: doc.id().to_string(),
            attributes,
            indexes,
            permissions: doc.permissions().to_vec(),
            document_security,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::index::IndexKind;

    fn articles() -> Collection {
        Collection::new("articles")
            .with_attribute(Attribute::string("title", 128).required())
            .with_attribute(Attribute::integer("views").with_default(0i64))
            .with_index(Index::new("by_title", IndexKind::Key, vec!["title".into()]))
    }

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let col = articles();
        assert!(col.has_attribute("TITLE"));
        assert!(col.attribute("Title").is_some());
        assert!(!col.has_attribute("body"));
    }

    #[test]
    fn test_add_attribute_rejects_case_insensitive_duplicate() {
        let mut col = articles();
        let err = col.add_attribute(Attribute::integer("Views")).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_remove_attribute_drops_referencing_indexes() {
        let mut col = articles();
        col.remove_attribute("title").unwrap();
        assert!(col.index("by_title").is_none());
        assert!(!col.has_attribute("title"));
    }

    #[test]
    fn test_rename_cascades_into_indexes() {
        let mut col = articles();
        col.rename_attribute("title", "headline").unwrap();
        assert!(col.has_attribute("headline"));
        assert!(!col.has_attribute("title"));
        assert!(col.index("by_title").unwrap().references("headline"));
    }

    #[test]
    fn test_rename_rejects_existing_target() {
        let mut col = articles();
        let err = col.rename_attribute("title", "views").unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_duplicate_index_key_rejected() {
        let mut col = articles();
        let err = col
            .add_index(Index::new("BY_TITLE", IndexKind::Key, vec!["views".into()]))
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_validate_catches_duplicates() {
        let mut col = articles();
        col.attributes.push(Attribute::integer("TITLE"));
        assert!(col.validate().is_err());
    }

    #[test]
    fn test_document_roundtrip() {
        let col = articles().with_document_security(true).with_permissions(vec![
            Permission::read(Role::Any),
        ]);
        let doc = col.to_document().unwrap();
        assert_eq!(doc.collection(), METADATA_COLLECTION);
        let restored = Collection::from_document(&doc).unwrap();
        assert_eq!(restored, col);
    }

    #[test]
    fn test_metadata_schema_is_valid() {
        assert!(Collection::metadata().validate().is_ok());
    }

    #[test]
    fn test_total_width_sums_attributes() {
        let col = articles();
        assert_eq!(col.total_attribute_width(), 130 + 8);
    }
}
