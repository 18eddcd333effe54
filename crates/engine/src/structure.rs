//! Document structure validation
//!
//! Pre-encode validation of a document against the current schema snapshot:
//! required presence, per-kind type and range checks, homogeneous arrays,
//! vector shape, format validators, and rejection of attributes the schema
//! does not know (which is what makes renamed keys unusable under their old
//! name).
//!
//! Every violation is a `StructureException` naming the offending attribute.

use docket_core::{
    datetime, Attribute, AttributeKind, Collection, DatabaseError, Document, Result, Value,
};

/// Validate a full document against its collection schema
pub fn validate_document(collection: &Collection, document: &Document) -> Result<()> {
    for key in document.attributes().keys() {
        if !collection.has_attribute(key) {
            return Err(DatabaseError::Structure(format!(
                "Unknown attribute: \"{key}\""
            )));
        }
    }

    for attribute in &collection.attributes {
        match document.get(&attribute.key) {
            None | Some(Value::Null) if attribute.required => {
                return Err(DatabaseError::Structure(format!(
                    "Missing required attribute \"{}\"",
                    attribute.key
                )));
            }
            None | Some(Value::Null) => {}
            Some(value) => validate_value(attribute, value)?,
        }
    }
    Ok(())
}

/// Validate one value against one attribute definition
///
/// Also used to re-validate operator results before persistence, so computed
/// values obey the same constraints as client-supplied ones.
pub fn validate_value(attribute: &Attribute, value: &Value) -> Result<()> {
    if value.is_null() {
        if attribute.required {
            return Err(DatabaseError::Structure(format!(
                "Missing required attribute \"{}\"",
                attribute.key
            )));
        }
        return Ok(());
    }

    if attribute.array {
        let items = value.as_array().ok_or_else(|| {
            DatabaseError::Structure(format!(
                "Attribute \"{}\" must be an array, got {}",
                attribute.key,
                value.type_name()
            ))
        })?;
        for item in items {
            if item.is_null() {
                return Err(DatabaseError::Structure(format!(
                    "Array attribute \"{}\" must not contain null elements",
                    attribute.key
                )));
            }
            validate_scalar(attribute, item)?;
        }
        return Ok(());
    }

    validate_scalar(attribute, value)
}

fn validate_scalar(attribute: &Attribute, value: &Value) -> Result<()> {
    let key = &attribute.key;
    let type_error = |expected: &str| {
        DatabaseError::Structure(format!(
            "Attribute \"{key}\" must be of type {expected}, got {}",
            value.type_name()
        ))
    };

    match &attribute.kind {
        AttributeKind::String { size } => {
            let text = value.as_str().ok_or_else(|| type_error("string"))?;
            if text.len() as u64 > *size {
                return Err(DatabaseError::Structure(format!(
                    "Attribute \"{key}\" must be no longer than {size} bytes"
                )));
            }
        }
        AttributeKind::Integer { signed, wide } => {
            let n = value.as_int().ok_or_else(|| type_error("integer"))?;
            let (min, max) = integer_bounds(*signed, *wide);
            if n < min || n > max {
                return Err(DatabaseError::Structure(format!(
                    "Attribute \"{key}\" must be between {min} and {max}, got {n}"
                )));
            }
        }
        AttributeKind::Float { signed } => {
            let n = value.as_number().ok_or_else(|| type_error("float"))?;
            if !n.is_finite() {
                return Err(DatabaseError::Structure(format!(
                    "Attribute \"{key}\" must be a finite number"
                )));
            }
            if !signed && n < 0.0 {
                return Err(DatabaseError::Structure(format!(
                    "Attribute \"{key}\" must not be negative, got {n}"
                )));
            }
        }
        AttributeKind::Boolean => {
            value.as_bool().ok_or_else(|| type_error("boolean"))?;
        }
        AttributeKind::Datetime => {
            let text = value.as_str().ok_or_else(|| type_error("datetime"))?;
            datetime::parse(text).map_err(|_| {
                DatabaseError::Structure(format!(
                    "Attribute \"{key}\" must be a valid datetime string, got \"{text}\""
                ))
            })?;
        }
        AttributeKind::Relationship { .. } => {
            let ok = value.is_string() || matches!(value, Value::Document(_));
            if !ok {
                return Err(type_error("relationship"));
            }
        }
        AttributeKind::Vector { dimensions } => {
            validate_vector(key, *dimensions, value)?;
        }
    }

    if let Some(format) = &attribute.format {
        format.check(key, value)?;
    }
    Ok(())
}

/// Vector shape check: a dense list of exactly N finite numerics
fn validate_vector(key: &str, dimensions: u32, value: &Value) -> Result<()> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => {
            return Err(DatabaseError::Structure(format!(
                "Vector attribute \"{key}\" must be a dense numeric array, got an associative object"
            )));
        }
        other => {
            return Err(DatabaseError::Structure(format!(
                "Vector attribute \"{key}\" must be an array, got {}",
                other.type_name()
            )));
        }
    };

    if items.len() != dimensions as usize {
        return Err(DatabaseError::Structure(format!(
            "Vector attribute \"{key}\" requires exactly {dimensions} dimensions, got {}",
            items.len()
        )));
    }

    for (position, item) in items.iter().enumerate() {
        let number = match item {
            Value::Int(n) => *n as f64,
            Value::Float(n) => *n,
            other => {
                return Err(DatabaseError::Structure(format!(
                    "Vector attribute \"{key}\" must contain only numeric values, found {} at position {position}",
                    other.type_name()
                )));
            }
        };
        if !number.is_finite() {
            return Err(DatabaseError::Structure(format!(
                "Vector attribute \"{key}\" must contain only finite values, found {number} at position {position}"
            )));
        }
    }
    Ok(())
}

fn integer_bounds(signed: bool, wide: bool) -> (i64, i64) {
    match (signed, wide) {
        (true, true) => (i64::MIN, i64::MAX),
        (false, true) => (0, i64::MAX),
        (true, false) => (i64::from(i32::MIN), i64::from(i32::MAX)),
        (false, false) => (0, i64::from(u32::MAX)),
    }
}
