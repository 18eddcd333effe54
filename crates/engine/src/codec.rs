//! Document encode/decode pipeline
//!
//! `encode` walks the schema in attribute order and applies each attribute's
//! filter pipeline forward, producing a storage-ready document. `decode`
//! applies the inverse pipeline in reverse order, upgrades relationship
//! objects back into nested `Document`s, and applies query projection.
//!
//! Projection removes fields from the *returned copy* only; nothing is ever
//! deleted from storage. `$permissions` and `$collection` survive every
//! projection so results stay auditable.

use docket_core::{
    document, filters, AttributeKind, Collection, DatabaseError, Document, Result, Value,
};

/// Apply the forward filter pipeline to every schema attribute
pub fn encode(collection: &Collection, mut doc: Document) -> Result<Document> {
    for attribute in &collection.attributes {
        if let Some(value) = doc.remove(&attribute.key) {
            let encoded = filters::encode_value(&attribute.filters, value)?;
            doc.set(attribute.key.clone(), encoded);
        }
    }
    Ok(doc)
}

/// Apply the inverse filter pipeline and reconstruct relationship documents
pub fn decode(collection: &Collection, mut doc: Document) -> Result<Document> {
    for attribute in &collection.attributes {
        if let Some(value) = doc.remove(&attribute.key) {
            let mut decoded = filters::decode_value(&attribute.filters, value)?;
            if let AttributeKind::Relationship { collection: related } = &attribute.kind {
                decoded = upgrade_relationship(related, decoded)?;
            }
            doc.set(attribute.key.clone(), decoded);
        }
    }
    Ok(doc)
}

/// Relationship values come back from storage as plain objects; return them
/// to the caller as nested documents, never as maps
fn upgrade_relationship(related: &str, value: Value) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let json = serde_json::Value::from(Value::Object(map));
            let mut nested: Document = serde_json::from_value(json).map_err(|e| {
                DatabaseError::Structure(format!("Corrupt relationship value: {e}"))
            })?;
            if nested.collection().is_empty() {
                nested.set_collection(related);
            }
            Ok(Value::Document(Box::new(nested)))
        }
        other => Ok(other),
    }
}

/// Restrict a decoded document to the selected attributes
///
/// With an empty selection the document passes through untouched. Otherwise
/// attributes outside the selection are dropped, and the projection-gated
/// internal fields (`$id`, `$internalId`, `$createdAt`, `$updatedAt`,
/// `$tenant`) appear only when selected by name. `$permissions` and
/// `$collection` are always retained.
pub fn apply_projection(mut doc: Document, selections: &[String]) -> Document {
    if selections.is_empty() {
        return doc;
    }

    let selected = |key: &str| selections.iter().any(|s| s == key);

    doc.attributes_mut().retain(|key, _| selected(key));

    if !selected(document::KEY_ID) {
        doc.set_id("");
    }
    if !selected(document::KEY_INTERNAL_ID) {
        doc.clear_internal_id();
    }
    if !selected(document::KEY_CREATED_AT) {
        doc.clear_created_at();
    }
    if !selected(document::KEY_UPDATED_AT) {
        doc.clear_updated_at();
    }
    if !selected(document::KEY_TENANT) {
        doc.set_tenant(None);
    }
    doc
}
