//! Named value-transform pipeline
//!
//! Attributes carry an ordered list of filter tags. Encoding applies each
//! filter's forward transform in order; decoding applies the inverse
//! transforms in reverse order. Transforms are pure functions resolved from
//! a process-wide registry, so encode and decode cannot drift apart.
//!
//! Null values bypass every filter.

use crate::datetime;
use crate::error::{DatabaseError, Result};
use crate::value::Value;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registered filter names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterTag {
    /// Serialize structured values to a JSON string for storage
    Json,
    /// Normalize wire datetimes to the UTC storage form
    Datetime,
}

impl FilterTag {
    pub fn name(&self) -> &'static str {
        match self {
            FilterTag::Json => "json",
            FilterTag::Datetime => "datetime",
        }
    }
}

/// A pair of pure transforms: storage-bound and caller-bound
pub struct Filter {
    pub encode: fn(Value) -> Result<Value>,
    pub decode: fn(Value) -> Result<Value>,
}

fn json_encode(value: Value) -> Result<Value> {
    let json: serde_json::Value = value.into();
    let text = serde_json::to_string(&json)
        .map_err(|e| DatabaseError::Structure(format!("Failed to serialize value: {e}")))?;
    Ok(Value::String(text))
}

fn json_decode(value: Value) -> Result<Value> {
    match value {
        Value::String(text) => {
            let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                DatabaseError::Structure(format!("Failed to parse stored JSON: {e}"))
            })?;
            Ok(Value::from(json))
        }
        // Adapters that store structured values natively hand them back as-is
        other => Ok(other),
    }
}

fn datetime_encode(value: Value) -> Result<Value> {
    match value {
        Value::String(text) => Ok(Value::String(datetime::to_storage(&text)?)),
        other => Err(DatabaseError::Structure(format!(
            "Datetime filter expects a string value, got {}",
            other.type_name()
        ))),
    }
}

fn datetime_decode(value: Value) -> Result<Value> {
    match value {
        Value::String(text) => Ok(Value::String(datetime::from_storage(&text)?)),
        other => Err(DatabaseError::Structure(format!(
            "Datetime filter expects a string value, got {}",
            other.type_name()
        ))),
    }
}

static REGISTRY: Lazy<HashMap<FilterTag, Filter>> = Lazy::new(|| {
    let mut registry = HashMap::new();
    registry.insert(
        FilterTag::Json,
        Filter {
            encode: json_encode,
            decode: json_decode,
        },
    );
    registry.insert(
        FilterTag::Datetime,
        Filter {
            encode: datetime_encode,
            decode: datetime_decode,
        },
    );
    registry
});

/// Look up a filter by tag
pub fn filter(tag: FilterTag) -> &'static Filter {
    // The registry covers every FilterTag variant by construction.
    REGISTRY.get(&tag).expect("filter registry is complete")
}

/// Apply the forward pipeline in declaration order
pub fn encode_value(tags: &[FilterTag], value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }
    tags.iter()
        .try_fold(value, |acc, tag| (filter(*tag).encode)(acc))
}

/// Apply the inverse pipeline in reverse declaration order
pub fn decode_value(tags: &[FilterTag], value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }
    tags.iter()
        .rev()
        .try_fold(value, |acc, tag| (filter(*tag).decode)(acc))
}
