//! Vector similarity scoring
//!
//! Exact (brute force) scoring for the reference adapter. A production
//! backend would satisfy the same ordering contract with an approximate
//! index; only the ranking matters to the engine.

use docket_core::{Document, Value, VectorMetric, VectorQuery};
use std::cmp::Ordering;

/// Extract a document's vector attribute as `f32`s
pub fn document_vector(doc: &Document, attribute: &str) -> Option<Vec<f32>> {
    match doc.get(attribute)? {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_number().map(|n| n as f32))
            .collect(),
        _ => None,
    }
}

/// Score a document against the query vector
///
/// Documents without a usable vector score worst; callers filter those out
/// before ranking.
pub fn score(doc: &Document, query: &VectorQuery) -> f32 {
    let Some(vector) = document_vector(doc, &query.attribute) else {
        return f32::NEG_INFINITY;
    };
    if vector.len() != query.values.len() {
        return f32::NEG_INFINITY;
    }
    match query.metric {
        VectorMetric::Cosine => cosine_similarity(&vector, &query.values),
        VectorMetric::Euclidean => euclidean_distance(&vector, &query.values),
        VectorMetric::Dot => dot_product(&vector, &query.values),
    }
}

/// Ranking direction per metric: similarity descends, distance ascends
pub fn rank(metric: VectorMetric, a: f32, b: f32) -> Ordering {
    let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match metric {
        VectorMetric::Euclidean => ord,
        VectorMetric::Cosine | VectorMetric::Dot => ord.reverse(),
    }
}

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = dot_product(a, a).sqrt();
    let norm_b = dot_product(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_value(values: &[f32]) -> Value {
        Value::Array(values.iter().map(|v| Value::Float(f64::from(*v))).collect())
    }

    #[test]
    fn test_dot_product() {
        assert_eq!(dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity() {
        let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((sim - 1.0).abs() < f32::EPSILON);

        let orthogonal = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(orthogonal.abs() < f32::EPSILON);

        let opposite = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((opposite + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_document_vector_extraction() {
        let doc = Document::new("a").with("v", vec_value(&[0.1, 0.2]));
        assert_eq!(document_vector(&doc, "v"), Some(vec![0.1, 0.2]));

        let doc = Document::new("a").with("v", "not a vector");
        assert_eq!(document_vector(&doc, "v"), None);

        let doc = Document::new("a");
        assert_eq!(document_vector(&doc, "v"), None);
    }

    #[test]
    fn test_rank_directions() {
        // Higher similarity first
        assert_eq!(rank(VectorMetric::Cosine, 0.9, 0.5), Ordering::Less);
        assert_eq!(rank(VectorMetric::Dot, 10.0, 20.0), Ordering::Greater);
        // Lower distance first
        assert_eq!(rank(VectorMetric::Euclidean, 0.5, 2.0), Ordering::Less);
    }
}
