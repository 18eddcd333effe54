//! Filter evaluation over stored documents

use docket_core::value::compare;
use docket_core::{Document, Query, Value};
use std::cmp::Ordering;

/// Whether a document satisfies one filter node
///
/// Equality against an array-valued attribute matches any element, so
/// `equal("tags", ["rust"])` behaves like membership on multi-valued
/// attributes. Shaping nodes (select, order, pagination) match trivially;
/// the query plan keeps them out of the filter list.
pub fn matches(doc: &Document, query: &Query) -> bool {
    match query {
        Query::Equal { attribute, values } => {
            let actual = doc.value_of(attribute);
            values.iter().any(|v| value_equals(&actual, v))
        }
        Query::NotEqual { attribute, value } => !value_equals(&doc.value_of(attribute), value),
        Query::LessThan { attribute, value } => {
            ordered(doc, attribute, value, |o| o == Ordering::Less)
        }
        Query::LessThanEqual { attribute, value } => {
            ordered(doc, attribute, value, |o| o != Ordering::Greater)
        }
        Query::GreaterThan { attribute, value } => {
            ordered(doc, attribute, value, |o| o == Ordering::Greater)
        }
        Query::GreaterThanEqual { attribute, value } => {
            ordered(doc, attribute, value, |o| o != Ordering::Less)
        }
        Query::Between { attribute, start, end } => {
            let actual = doc.value_of(attribute);
            !actual.is_null()
                && compare(&actual, start) != Ordering::Less
                && compare(&actual, end) != Ordering::Greater
        }
        Query::IsNull { attribute } => doc.value_of(attribute).is_null(),
        Query::IsNotNull { attribute } => !doc.value_of(attribute).is_null(),
        Query::StartsWith { attribute, value } => {
            text(doc, attribute).map_or(false, |s| s.starts_with(value.as_str()))
        }
        Query::EndsWith { attribute, value } => {
            text(doc, attribute).map_or(false, |s| s.ends_with(value.as_str()))
        }
        Query::Search { attribute, value } => {
            // Simplified fulltext: case-insensitive substring match
            text(doc, attribute)
                .map_or(false, |s| s.to_lowercase().contains(&value.to_lowercase()))
        }
        Query::Contains { attribute, values } => contains(doc, attribute, values),
        Query::And { queries } => queries.iter().all(|q| matches(doc, q)),
        Query::Or { queries } => queries.iter().any(|q| matches(doc, q)),
        _ => true,
    }
}

/// Equality with array-membership semantics for multi-valued attributes
fn value_equals(actual: &Value, candidate: &Value) -> bool {
    match (actual, candidate) {
        (Value::Array(items), scalar) if !scalar.is_array() => items.contains(scalar),
        _ => actual == candidate,
    }
}

fn ordered(doc: &Document, attribute: &str, value: &Value, test: impl Fn(Ordering) -> bool) -> bool {
    let actual = doc.value_of(attribute);
    // Null never satisfies a range comparison
    !actual.is_null() && test(compare(&actual, value))
}

fn text(doc: &Document, attribute: &str) -> Option<String> {
    match doc.value_of(attribute) {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn contains(doc: &Document, attribute: &str, values: &[Value]) -> bool {
    match doc.value_of(attribute) {
        Value::Array(items) => values.iter().any(|v| items.contains(v)),
        Value::String(haystack) => values
            .iter()
            .filter_map(Value::as_str)
            .any(|needle| haystack.contains(needle)),
        _ => false,
    }
}
