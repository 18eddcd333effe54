//! Query model
//!
//! Queries form a small AST: leaf filters, logical combinators, projection,
//! ordering, pagination and vector-similarity filters. Queries are plain
//! values; reusing one across evaluations can never mutate it.
//!
//! Two consumers share this module. The engine validates query lists against
//! a collection schema (`validate_queries`) before anything reaches the
//! adapter, and adapters group a query list into an executable `QueryPlan`.

use crate::document::Document;
use crate::error::{DatabaseError, Result};
use crate::schema::{Collection, SortOrder};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Similarity metric of a vector filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VectorMetric {
    Cosine,
    Euclidean,
    Dot,
}

impl VectorMetric {
    pub fn name(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Euclidean => "euclidean",
            VectorMetric::Dot => "dot",
        }
    }
}

/// Which side of the anchor document a cursor page lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    After,
    Before,
}

/// One node of the query AST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Query {
    Equal { attribute: String, values: Vec<Value> },
    NotEqual { attribute: String, value: Value },
    LessThan { attribute: String, value: Value },
    LessThanEqual { attribute: String, value: Value },
    GreaterThan { attribute: String, value: Value },
    GreaterThanEqual { attribute: String, value: Value },
    Between { attribute: String, start: Value, end: Value },
    IsNull { attribute: String },
    IsNotNull { attribute: String },
    StartsWith { attribute: String, value: String },
    EndsWith { attribute: String, value: String },
    Search { attribute: String, value: String },
    Contains { attribute: String, values: Vec<Value> },
    And { queries: Vec<Query> },
    Or { queries: Vec<Query> },
    Select { attributes: Vec<String> },
    /// Empty attribute means natural order (internal id)
    OrderAsc { attribute: String },
    OrderDesc { attribute: String },
    Limit { count: usize },
    Offset { count: usize },
    CursorAfter { document: Box<Document> },
    CursorBefore { document: Box<Document> },
    VectorCosine { attribute: String, values: Vec<f32> },
    VectorEuclidean { attribute: String, values: Vec<f32> },
    VectorDot { attribute: String, values: Vec<f32> },
}

impl Query {
    pub fn equal(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Query::Equal { attribute: attribute.into(), values }
    }

    pub fn not_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::NotEqual { attribute: attribute.into(), value: value.into() }
    }

    pub fn less_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::LessThan { attribute: attribute.into(), value: value.into() }
    }

    pub fn less_than_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::LessThanEqual { attribute: attribute.into(), value: value.into() }
    }

    pub fn greater_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::GreaterThan { attribute: attribute.into(), value: value.into() }
    }

    pub fn greater_than_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::GreaterThanEqual { attribute: attribute.into(), value: value.into() }
    }

    pub fn between(
        attribute: impl Into<String>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        Query::Between { attribute: attribute.into(), start: start.into(), end: end.into() }
    }

    pub fn is_null(attribute: impl Into<String>) -> Self {
        Query::IsNull { attribute: attribute.into() }
    }

    pub fn is_not_null(attribute: impl Into<String>) -> Self {
        Query::IsNotNull { attribute: attribute.into() }
    }

    pub fn starts_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Query::StartsWith { attribute: attribute.into(), value: value.into() }
    }

    pub fn ends_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Query::EndsWith { attribute: attribute.into(), value: value.into() }
    }

    pub fn search(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Search { attribute: attribute.into(), value: value.into() }
    }

    pub fn contains(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Query::Contains { attribute: attribute.into(), values }
    }

    pub fn and(queries: Vec<Query>) -> Self {
        Query::And { queries }
    }

    pub fn or(queries: Vec<Query>) -> Self {
        Query::Or { queries }
    }

    pub fn select(attributes: Vec<String>) -> Self {
        Query::Select { attributes }
    }

    pub fn order_asc(attribute: impl Into<String>) -> Self {
        Query::OrderAsc { attribute: attribute.into() }
    }

    pub fn order_desc(attribute: impl Into<String>) -> Self {
        Query::OrderDesc { attribute: attribute.into() }
    }

    pub fn limit(count: usize) -> Self {
        Query::Limit { count }
    }

    pub fn offset(count: usize) -> Self {
        Query::Offset { count }
    }

    pub fn cursor_after(document: Document) -> Self {
        Query::CursorAfter { document: Box::new(document) }
    }

    pub fn cursor_before(document: Document) -> Self {
        Query::CursorBefore { document: Box::new(document) }
    }

    pub fn vector_cosine(attribute: impl Into<String>, values: Vec<f32>) -> Self {
        Query::VectorCosine { attribute: attribute.into(), values }
    }

    pub fn vector_euclidean(attribute: impl Into<String>, values: Vec<f32>) -> Self {
        Query::VectorEuclidean { attribute: attribute.into(), values }
    }

    pub fn vector_dot(attribute: impl Into<String>, values: Vec<f32>) -> Self {
        Query::VectorDot { attribute: attribute.into(), values }
    }

    /// Whether this node restricts the result set (as opposed to shaping it)
    pub fn is_filter(&self) -> bool {
        !matches!(
            self,
            Query::Select { .. }
                | Query::OrderAsc { .. }
                | Query::OrderDesc { .. }
                | Query::Limit { .. }
                | Query::Offset { .. }
                | Query::CursorAfter { .. }
                | Query::CursorBefore { .. }
        )
    }

    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            Query::VectorCosine { .. } | Query::VectorEuclidean { .. } | Query::VectorDot { .. }
        )
    }
}

/// A vector filter lifted out of the query list
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub attribute: String,
    pub metric: VectorMetric,
    pub values: Vec<f32>,
}

/// A query list grouped into its executable parts
///
/// Shape errors (two cursors, two vector filters, combinators with too few
/// children) are caught here; schema-dependent checks live in
/// [`validate_queries`].
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    pub filters: Vec<Query>,
    pub vector: Option<VectorQuery>,
    pub selections: Vec<String>,
    pub orders: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub cursor: Option<(Document, CursorDirection)>,
}

impl QueryPlan {
    pub fn of(queries: &[Query]) -> Result<QueryPlan> {
        let mut plan = QueryPlan::default();

        for query in queries {
            match query {
                Query::Select { attributes } => {
                    plan.selections.extend(attributes.iter().cloned());
                }
                Query::OrderAsc { attribute } => {
                    plan.orders.push((attribute.clone(), SortOrder::Asc));
                }
                Query::OrderDesc { attribute } => {
                    plan.orders.push((attribute.clone(), SortOrder::Desc));
                }
                Query::Limit { count } => plan.limit = Some(*count),
                Query::Offset { count } => plan.offset = Some(*count),
                Query::CursorAfter { document } => {
                    if plan.cursor.is_some() {
                        return Err(DatabaseError::Query(
                            "Only one cursor is allowed per query".into(),
                        ));
                    }
                    plan.cursor = Some(((**document).clone(), CursorDirection::After));
                }
                Query::CursorBefore { document } => {
                    if plan.cursor.is_some() {
                        return Err(DatabaseError::Query(
                            "Only one cursor is allowed per query".into(),
                        ));
                    }
                    plan.cursor = Some(((**document).clone(), CursorDirection::Before));
                }
                Query::VectorCosine { attribute, values } => {
                    plan.set_vector(attribute, VectorMetric::Cosine, values)?;
                }
                Query::VectorEuclidean { attribute, values } => {
                    plan.set_vector(attribute, VectorMetric::Euclidean, values)?;
                }
                Query::VectorDot { attribute, values } => {
                    plan.set_vector(attribute, VectorMetric::Dot, values)?;
                }
                filter => {
                    validate_shape(filter)?;
                    plan.filters.push(filter.clone());
                }
            }
        }
        Ok(plan)
    }

    fn set_vector(&mut self, attribute: &str, metric: VectorMetric, values: &[f32]) -> Result<()> {
        if self.vector.is_some() {
            return Err(DatabaseError::Query(
                "Only one vector filter is allowed per query".into(),
            ));
        }
        if values.is_empty() {
            return Err(DatabaseError::Query(
                "Vector queries require a non-empty value vector".into(),
            ));
        }
        self.vector = Some(VectorQuery {
            attribute: attribute.to_string(),
            metric,
            values: values.to_vec(),
        });
        Ok(())
    }
}

/// Structural validation of one filter node, recursing through combinators
fn validate_shape(query: &Query) -> Result<()> {
    match query {
        Query::And { queries } | Query::Or { queries } => {
            let name = if matches!(query, Query::And { .. }) { "And" } else { "Or" };
            if queries.len() < 2 {
                return Err(DatabaseError::Query(format!(
                    "{name} queries require at least two queries"
                )));
            }
            for child in queries {
                if !child.is_filter() {
                    return Err(DatabaseError::Query(format!(
                        "{name} queries can only contain filter queries"
                    )));
                }
                if child.is_vector() {
                    return Err(DatabaseError::Query(
                        "Vector filters cannot be nested inside logical queries".into(),
                    ));
                }
                validate_shape(child)?;
            }
        }
        Query::Equal { values, .. } => {
            if values.is_empty() {
                return Err(DatabaseError::Query(
                    "Equal queries require at least one value".into(),
                ));
            }
        }
        Query::Contains { values, .. } => {
            if values.is_empty() {
                return Err(DatabaseError::Query(
                    "Contains queries require at least one value".into(),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validate a query list against a collection schema
///
/// Runs the structural checks from [`QueryPlan::of`] first, then the
/// schema-dependent rules: attribute existence, contains only on arrays or
/// strings, vector filters only on vector attributes with matching
/// dimensionality.
pub fn validate_queries(queries: &[Query], collection: &Collection) -> Result<()> {
    let plan = QueryPlan::of(queries)?;

    for filter in &plan.filters {
        validate_filter_schema(filter, collection)?;
    }

    if let Some(vector) = &plan.vector {
        let attribute = collection.attribute(&vector.attribute).ok_or_else(|| {
            DatabaseError::Query(format!(
                "Attribute not found in schema: {}",
                vector.attribute
            ))
        })?;
        match attribute.kind {
            crate::schema::AttributeKind::Vector { dimensions } => {
                if vector.values.len() != dimensions as usize {
                    return Err(DatabaseError::Query(format!(
                        "Vector query dimensions ({}) do not match attribute \"{}\" dimensions ({dimensions})",
                        vector.values.len(),
                        vector.attribute
                    )));
                }
            }
            _ => {
                return Err(DatabaseError::Query(format!(
                    "Cannot apply a vector filter to non-vector attribute \"{}\"",
                    vector.attribute
                )));
            }
        }
    }

    for (attribute, _) in &plan.orders {
        // Empty attribute selects natural order
        if !attribute.is_empty() && !crate::document::is_internal_key(attribute)
            && !collection.has_attribute(attribute)
        {
            return Err(DatabaseError::Query(format!(
                "Attribute not found in schema: {attribute}"
            )));
        }
    }

    for attribute in &plan.selections {
        if !crate::document::is_internal_key(attribute) && !collection.has_attribute(attribute) {
            return Err(DatabaseError::Query(format!(
                "Attribute not found in schema: {attribute}"
            )));
        }
    }

    Ok(())
}

fn validate_filter_schema(query: &Query, collection: &Collection) -> Result<()> {
    let check_attribute = |attribute: &str| -> Result<()> {
        if crate::document::is_internal_key(attribute) || collection.has_attribute(attribute) {
            Ok(())
        } else {
            Err(DatabaseError::Query(format!(
                "Attribute not found in schema: {attribute}"
            )))
        }
    };

    match query {
        Query::And { queries } | Query::Or { queries } => {
            for child in queries {
                validate_filter_schema(child, collection)?;
            }
        }
        Query::Contains { attribute, .. } => {
            check_attribute(attribute)?;
            if let Some(attr) = collection.attribute(attribute) {
                let is_string = matches!(attr.kind, crate::schema::AttributeKind::String { .. });
                if !attr.array && !is_string {
                    return Err(DatabaseError::Query(format!(
                        "Cannot query contains on attribute \"{attribute}\" because it is neither an array nor a string"
                    )));
                }
            }
        }
        Query::Equal { attribute, .. }
        | Query::NotEqual { attribute, .. }
        | Query::LessThan { attribute, .. }
        | Query::LessThanEqual { attribute, .. }
        | Query::GreaterThan { attribute, .. }
        | Query::GreaterThanEqual { attribute, .. }
        | Query::Between { attribute, .. }
        | Query::IsNull { attribute }
        | Query::IsNotNull { attribute }
        | Query::StartsWith { attribute, .. }
        | Query::EndsWith { attribute, .. }
        | Query::Search { attribute, .. } => check_attribute(attribute)?,
        _ => {}
    }
    Ok(())
}
