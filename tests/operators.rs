//! Server-side operator resolution through the facade

mod common;

use common::*;
use docketdb::{
    Attribute, Collection, DatabaseError, Document, DocumentUpdate, Format, Operator, Value,
};

#[test]
fn increment_clamps_and_stays_clamped() {
    let (db, ctx) = open();
    db.create_collection(
        &ctx,
        Collection::new("counters").with_attribute(Attribute::integer("count").with_default(0i64)),
    )
    .unwrap();
    db.create_document(&ctx, "counters", Document::new("c1").with("count", 5i64))
        .unwrap();

    let updated = db
        .update_document(
            &ctx,
            "counters",
            "c1",
            DocumentUpdate::new().apply("count", Operator::increment_max(3i64, 7i64)),
        )
        .unwrap();
    assert_eq!(updated.get("count"), Some(&Value::Int(7)));

    // A second clamped increment holds at the bound
    let updated = db
        .update_document(
            &ctx,
            "counters",
            "c1",
            DocumentUpdate::new().apply("count", Operator::increment_max(3i64, 7i64)),
        )
        .unwrap();
    assert_eq!(updated.get("count"), Some(&Value::Int(7)));
}

#[test]
fn operators_resolve_against_stored_value_not_payload() {
    let (db, ctx) = open();
    db.create_collection(
        &ctx,
        Collection::new("counters").with_attribute(Attribute::integer("count").with_default(0i64)),
    )
    .unwrap();
    db.create_document(&ctx, "counters", Document::new("c").with("count", 10i64))
        .unwrap();

    // Simulate a stale client: the operator still sees the stored 10
    let updated = db
        .update_document(
            &ctx,
            "counters",
            "c",
            DocumentUpdate::new().apply("count", Operator::increment(5i64)),
        )
        .unwrap();
    assert_eq!(updated.get("count"), Some(&Value::Int(15)));
}

#[test]
fn operator_on_absent_attribute_uses_schema_default() {
    let (db, ctx) = open();
    db.create_collection(
        &ctx,
        Collection::new("counters").with_attribute(Attribute::integer("count").with_default(100i64)),
    )
    .unwrap();
    db.create_document(&ctx, "counters", Document::new("c")).unwrap();

    let updated = db
        .update_document(
            &ctx,
            "counters",
            "c",
            DocumentUpdate::new().apply("count", Operator::increment(1i64)),
        )
        .unwrap();
    // Default 100 was the seed (it was applied at create time)
    assert_eq!(updated.get("count"), Some(&Value::Int(101)));
}

#[test]
fn computed_result_must_satisfy_schema() {
    let (db, ctx) = open();
    db.create_collection(
        &ctx,
        Collection::new("ratings").with_attribute(
            Attribute::integer("stars").with_format(Format::IntRange { min: 0, max: 5 }),
        ),
    )
    .unwrap();
    db.create_document(&ctx, "ratings", Document::new("r").with("stars", 4i64))
        .unwrap();

    // 4 + 3 = 7 violates the declared range even though the inputs are valid
    let err = db
        .update_document(
            &ctx,
            "ratings",
            "r",
            DocumentUpdate::new().apply("stars", Operator::increment(3i64)),
        )
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Structure(_)));
    assert!(err.to_string().contains("between 0 and 5"));

    // The stored value is untouched
    let doc = db.get_document(&ctx, "ratings", "r", &[]).unwrap().unwrap();
    assert_eq!(doc.get("stars"), Some(&Value::Int(4)));
}

#[test]
fn divide_by_zero_is_an_error() {
    let (db, ctx) = open();
    db.create_collection(
        &ctx,
        Collection::new("counters").with_attribute(Attribute::integer("count")),
    )
    .unwrap();
    db.create_document(&ctx, "counters", Document::new("c").with("count", 10i64))
        .unwrap();

    let err = db
        .update_document(
            &ctx,
            "counters",
            "c",
            DocumentUpdate::new().apply("count", Operator::divide(0i64)),
        )
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Operator(_)));
}

#[test]
fn array_insert_bounds_error_message() {
    let (db, ctx) = open();
    db.create_collection(
        &ctx,
        Collection::new("lists").with_attribute(Attribute::string("items", 32).as_array()),
    )
    .unwrap();
    let items = Value::Array(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
    db.create_document(&ctx, "lists", Document::new("l").with("items", items))
        .unwrap();

    let err = db
        .update_document(
            &ctx,
            "lists",
            "l",
            DocumentUpdate::new().apply("items", Operator::array_insert(10, "x")),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "index 10 is out of bounds for array of length 3"
    );
}

#[test]
fn mixed_sets_and_operators_in_one_update() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let updated = db
        .update_document(
            &ctx,
            "articles",
            "a0",
            DocumentUpdate::new()
                .set("title", "renamed")
                .apply("views", Operator::increment(10i64)),
        )
        .unwrap();
    assert_eq!(updated.get("title"), Some(&Value::String("renamed".into())));
    assert_eq!(updated.get("views"), Some(&Value::Int(10)));
}

#[test]
fn string_operators_through_facade() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let updated = db
        .update_document(
            &ctx,
            "articles",
            "a0",
            DocumentUpdate::new().apply("title", Operator::concat("!")),
        )
        .unwrap();
    assert_eq!(updated.get("title"), Some(&Value::String("title-0!".into())));

    let updated = db
        .update_document(
            &ctx,
            "articles",
            "a0",
            DocumentUpdate::new().apply("title", Operator::replace("title", "headline")),
        )
        .unwrap();
    assert_eq!(updated.get("title"), Some(&Value::String("headline-0!".into())));
}

#[test]
fn toggle_through_facade() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    // Seeded published=true for a0
    let updated = db
        .update_document(
            &ctx,
            "articles",
            "a0",
            DocumentUpdate::new().apply("published", Operator::toggle()),
        )
        .unwrap();
    assert_eq!(updated.get("published"), Some(&Value::Bool(false)));
}

#[test]
fn date_operator_through_facade_rolls_boundaries() {
    let (db, ctx) = open();
    db.create_collection(&ctx, articles()).unwrap();
    db.create_document(
        &ctx,
        "articles",
        Document::new("d")
            .with("title", "t")
            .with("publishedAt", "2024-02-28T09:00:00.000+00:00"),
    )
    .unwrap();

    let updated = db
        .update_document(
            &ctx,
            "articles",
            "d",
            DocumentUpdate::new().apply("publishedAt", Operator::date_add_days(2)),
        )
        .unwrap();
    // Leap year: 28 Feb + 2 = 1 Mar
    assert_eq!(
        updated.get("publishedAt"),
        Some(&Value::String("2024-03-01T09:00:00.000+00:00".into()))
    );
}

#[test]
fn type_mismatch_error_names_operator_and_field() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let err = db
        .update_document(
            &ctx,
            "articles",
            "a0",
            DocumentUpdate::new().apply("title", Operator::increment(1i64)),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot apply increment operator to non-numeric field 'title'"
    );
}

#[test]
fn callbacks_observe_resolved_values_in_bulk_updates() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 5);

    let mut observed: Vec<i64> = Vec::new();
    let mut collect = |doc: &Document| {
        observed.push(doc.get("views").unwrap().as_int().unwrap());
    };
    let callback: &mut dyn FnMut(&Document) = &mut collect;

    let affected = db
        .update_documents(
            &ctx,
            "articles",
            DocumentUpdate::new().apply("views", Operator::increment(100i64)),
            &[],
            2,
            Some(callback),
        )
        .unwrap();
    assert_eq!(affected, 5);

    // Each document was incremented from its own base: 0..4 become 100..104
    observed.sort_unstable();
    assert_eq!(observed, vec![100, 101, 102, 103, 104]);
}
