//! Index definitions
//!
//! Indexes describe *what* the adapter should index and with which
//! parameters. Physical construction (B-trees, HNSW graphs) is entirely the
//! adapter's concern.

use crate::error::{DatabaseError, Result};
use crate::schema::attribute::{Attribute, AttributeKind};
use serde::{Deserialize, Serialize};

/// Index flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexKind {
    /// Plain lookup index
    Key,
    /// Uniqueness constraint over the attribute tuple
    Unique,
    /// Fulltext search index, string attributes only
    Fulltext,
    /// Approximate nearest-neighbor index, cosine similarity
    HnswCosine,
    /// Approximate nearest-neighbor index, euclidean distance
    HnswEuclidean,
    /// Approximate nearest-neighbor index, dot product
    HnswDot,
}

impl IndexKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Key => "key",
            IndexKind::Unique => "unique",
            IndexKind::Fulltext => "fulltext",
            IndexKind::HnswCosine => "hnswCosine",
            IndexKind::HnswEuclidean => "hnswEuclidean",
            IndexKind::HnswDot => "hnswDot",
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            IndexKind::HnswCosine | IndexKind::HnswEuclidean | IndexKind::HnswDot
        )
    }
}

/// Sort direction for one indexed attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One index over an ordered list of attribute keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub key: String,
    pub kind: IndexKind,
    pub attributes: Vec<String>,
    /// Optional per-attribute prefix lengths (string attributes)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lengths: Vec<Option<u64>>,
    /// Optional per-attribute sort orders
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orders: Vec<Option<SortOrder>>,
}

impl Index {
    pub fn new(key: impl Into<String>, kind: IndexKind, attributes: Vec<String>) -> Self {
        Index {
            key: key.into(),
            kind,
            attributes,
            lengths: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// Whether this index references the given attribute key
    pub fn references(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a.eq_ignore_ascii_case(attribute))
    }

    /// Rewrite references after an attribute rename
    pub fn rename_attribute(&mut self, old: &str, new: &str) {
        for attr in &mut self.attributes {
            if attr.eq_ignore_ascii_case(old) {
                *attr = new.to_string();
            }
        }
    }

    /// Validate against the owning collection's attributes
    pub fn validate(&self, attributes: &[Attribute]) -> Result<()> {
        if self.key.is_empty() {
            return Err(DatabaseError::Structure("Index key must not be empty".into()));
        }
        if self.attributes.is_empty() {
            return Err(DatabaseError::Structure(format!(
                "Index \"{}\" must reference at least one attribute",
                self.key
            )));
        }

        let lookup = |key: &str| -> Option<&Attribute> {
            attributes.iter().find(|a| a.key.eq_ignore_ascii_case(key))
        };

        for key in &self.attributes {
            // Internal fields are always indexable
            if key.starts_with('$') {
                continue;
            }
            let attribute = lookup(key).ok_or_else(|| {
                DatabaseError::NotFound(format!(
                    "Attribute \"{key}\" referenced by index \"{}\"",
                    self.key
                ))
            })?;

            match self.kind {
                IndexKind::Fulltext => {
                    if !matches!(attribute.kind, AttributeKind::String { .. }) {
                        return Err(DatabaseError::Structure(format!(
                            "Fulltext index \"{}\" requires string attributes, \"{key}\" is {}",
                            self.key,
                            attribute.kind.name()
                        )));
                    }
                }
                kind if kind.is_vector() => {
                    if !attribute.kind.is_vector() {
                        return Err(DatabaseError::Structure(format!(
                            "Vector index \"{}\" requires a vector attribute, \"{key}\" is {}",
                            self.key,
                            attribute.kind.name()
                        )));
                    }
                }
                _ => {
                    if attribute.kind.is_vector() {
                        return Err(DatabaseError::Structure(format!(
                            "Vector attribute \"{key}\" can only back a vector index"
                        )));
                    }
                }
            }
        }

        if self.kind.is_vector() && self.attributes.len() != 1 {
            return Err(DatabaseError::Structure(format!(
                "Vector index \"{}\" must reference exactly one attribute",
                self.key
            )));
        }
        Ok(())
    }
}
