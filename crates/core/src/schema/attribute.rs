//! Attribute definitions
//!
//! An `Attribute` is one typed, constrained field in a collection's schema.
//! The type is a closed sum, `AttributeKind`, with per-variant parameters;
//! validation dispatches on the variant rather than on runtime strings.

use crate::error::{DatabaseError, Result};
use crate::filters::FilterTag;
use crate::limits::{
    MAX_VECTOR_DIMENSIONS, OUT_OF_ROW_WIDTH, RELATIONSHIP_WIDTH, STRING_INLINE_MAX,
    STRING_SIZE_MAX,
};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Closed set of attribute types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AttributeKind {
    /// UTF-8 text with a declared maximum byte length
    String { size: u64 },
    /// Signed or unsigned integer; `wide` selects 64-bit over 32-bit range
    Integer { signed: bool, wide: bool },
    /// IEEE-754 double; `signed = false` restricts to non-negative values
    Float { signed: bool },
    Boolean,
    /// ISO-8601 datetime string, normalized to UTC in storage
    Datetime,
    /// Reference to a document in another collection
    Relationship { collection: String },
    /// Dense numeric embedding with fixed dimensionality
    ///
    /// Dimensionality is immutable once the attribute exists.
    Vector { dimensions: u32 },
}

impl AttributeKind {
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::String { .. } => "string",
            AttributeKind::Integer { .. } => "integer",
            AttributeKind::Float { .. } => "float",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Datetime => "datetime",
            AttributeKind::Relationship { .. } => "relationship",
            AttributeKind::Vector { .. } => "vector",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AttributeKind::Integer { .. } | AttributeKind::Float { .. }
        )
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, AttributeKind::Vector { .. })
    }

    /// Shallow type compatibility, used for default-value checks
    ///
    /// Integers are acceptable where floats are expected; everything else is
    /// strict. Deep checks (ranges, dimensionality) live in the structure
    /// validator.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeKind::String { .. } | AttributeKind::Datetime => value.is_string(),
            AttributeKind::Integer { .. } => matches!(value, Value::Int(_)),
            AttributeKind::Float { .. } => value.is_numeric(),
            AttributeKind::Boolean => matches!(value, Value::Bool(_)),
            AttributeKind::Relationship { .. } => {
                value.is_string() || matches!(value, Value::Document(_))
            }
            AttributeKind::Vector { .. } => value.is_array(),
        }
    }

    /// Sanity of the kind's own parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            AttributeKind::String { size } => {
                if *size == 0 || *size > STRING_SIZE_MAX {
                    return Err(DatabaseError::Structure(format!(
                        "String attribute size must be between 1 and {STRING_SIZE_MAX}, got {size}"
                    )));
                }
            }
            AttributeKind::Vector { dimensions } => {
                if *dimensions == 0 || *dimensions as usize > MAX_VECTOR_DIMENSIONS {
                    return Err(DatabaseError::Structure(format!(
                        "Vector dimensions must be between 1 and {MAX_VECTOR_DIMENSIONS}, got {dimensions}"
                    )));
                }
            }
            AttributeKind::Relationship { collection } => {
                if collection.is_empty() {
                    return Err(DatabaseError::Structure(
                        "Relationship attribute requires a target collection".into(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Optional extra validator attached to an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "camelCase")]
pub enum Format {
    IntRange { min: i64, max: i64 },
    FloatRange { min: f64, max: f64 },
    Enum { elements: Vec<String> },
}

impl Format {
    /// Formats are type-specific; reject mismatched pairings at schema time
    pub fn compatible_with(&self, kind: &AttributeKind) -> bool {
        match self {
            Format::IntRange { .. } => matches!(kind, AttributeKind::Integer { .. }),
            Format::FloatRange { .. } => matches!(kind, AttributeKind::Float { .. }),
            Format::Enum { .. } => matches!(kind, AttributeKind::String { .. }),
        }
    }

    pub fn check(&self, key: &str, value: &Value) -> Result<()> {
        match self {
            Format::IntRange { min, max } => {
                let n = value.as_int().unwrap_or_default();
                if n < *min || n > *max {
                    return Err(DatabaseError::Structure(format!(
                        "Attribute \"{key}\" must be between {min} and {max}, got {n}"
                    )));
                }
            }
            Format::FloatRange { min, max } => {
                let n = value.as_number().unwrap_or_default();
                if n < *min || n > *max {
                    return Err(DatabaseError::Structure(format!(
                        "Attribute \"{key}\" must be between {min} and {max}, got {n}"
                    )));
                }
            }
            Format::Enum { elements } => {
                let s = value.as_str().unwrap_or_default();
                if !elements.iter().any(|e| e == s) {
                    return Err(DatabaseError::Structure(format!(
                        "Attribute \"{key}\" must be one of {elements:?}, got \"{s}\""
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One field definition in a collection schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    #[serde(flatten)]
    pub kind: AttributeKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterTag>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, kind: AttributeKind) -> Self {
        Attribute {
            key: key.into(),
            kind,
            required: false,
            array: false,
            default: None,
            format: None,
            filters: Vec::new(),
        }
    }

    /// Shorthand for a string attribute of the given size
    pub fn string(key: impl Into<String>, size: u64) -> Self {
        Attribute::new(key, AttributeKind::String { size })
    }

    /// Shorthand for a signed 64-bit integer attribute
    pub fn integer(key: impl Into<String>) -> Self {
        Attribute::new(key, AttributeKind::Integer { signed: true, wide: true })
    }

    pub fn float(key: impl Into<String>) -> Self {
        Attribute::new(key, AttributeKind::Float { signed: true })
    }

    pub fn boolean(key: impl Into<String>) -> Self {
        Attribute::new(key, AttributeKind::Boolean)
    }

    pub fn datetime(key: impl Into<String>) -> Self {
        Attribute::new(key, AttributeKind::Datetime).with_filter(FilterTag::Datetime)
    }

    pub fn vector(key: impl Into<String>, dimensions: u32) -> Self {
        Attribute::new(key, AttributeKind::Vector { dimensions })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn as_array(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_filter(mut self, tag: FilterTag) -> Self {
        self.filters.push(tag);
        self
    }

    /// Row-width contribution in bytes
    ///
    /// Arrays and long strings live out of row and are charged a fixed
    /// pointer width. Adapters may override this accounting.
    pub fn storage_width(&self) -> u64 {
        if self.array {
            return OUT_OF_ROW_WIDTH;
        }
        match &self.kind {
            AttributeKind::String { size } => {
                if *size > STRING_INLINE_MAX {
                    OUT_OF_ROW_WIDTH
                } else {
                    size + 2
                }
            }
            AttributeKind::Integer { wide, .. } => {
                if *wide {
                    8
                } else {
                    4
                }
            }
            AttributeKind::Float { .. } => 8,
            AttributeKind::Boolean => 1,
            AttributeKind::Datetime => 8,
            AttributeKind::Relationship { .. } => RELATIONSHIP_WIDTH,
            AttributeKind::Vector { dimensions } => u64::from(*dimensions) * 4,
        }
    }

    /// Validate the definition itself (not document values)
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(DatabaseError::Structure("Attribute key must not be empty".into()));
        }
        if self.key.starts_with('$') {
            return Err(DatabaseError::Structure(format!(
                "Attribute key \"{}\" collides with internal fields",
                self.key
            )));
        }
        self.kind.validate()?;

        if self.array && self.kind.is_vector() {
            return Err(DatabaseError::Structure(format!(
                "Vector attribute \"{}\" cannot be an array",
                self.key
            )));
        }
        if let Some(format) = &self.format {
            if !format.compatible_with(&self.kind) {
                return Err(DatabaseError::Structure(format!(
                    "Format is not compatible with {} attribute \"{}\"",
                    self.kind.name(),
                    self.key
                )));
            }
        }
        if let Some(default) = &self.default {
            if self.required {
                return Err(DatabaseError::Structure(format!(
                    "Cannot set a default value on required attribute \"{}\"",
                    self.key
                )));
            }
            if self.array {
                if !default.is_array() && !default.is_null() {
                    return Err(DatabaseError::Structure(format!(
                        "Default value for array attribute \"{}\" must be an array",
                        self.key
                    )));
                }
            } else if !default.is_null() && !self.kind.accepts(default) {
                return Err(DatabaseError::Structure(format!(
                    "Default value for attribute \"{}\" must be of type {}",
                    self.key,
                    self.kind.name()
                )));
            }
        }
        Ok(())
    }
}
