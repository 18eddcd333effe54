//! Optimistic concurrency via request timestamps

mod common;

use chrono::Duration;
use common::*;
use docketdb::{datetime, DocumentUpdate, Operator};

#[test]
fn stale_request_timestamp_conflicts() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    // The document was written "now"; a request stamped an hour earlier
    // must not overwrite it.
    let stale = ctx.clone().with_request_timestamp(datetime::now() - Duration::hours(1));
    let err = db
        .update_document(
            &stale,
            "articles",
            "a0",
            DocumentUpdate::new().set("views", 1i64),
        )
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(
        err.to_string(),
        "Document was updated after the request timestamp"
    );
}

#[test]
fn fresh_request_timestamp_passes() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let fresh = ctx.clone().with_request_timestamp(datetime::now() + Duration::seconds(1));
    assert!(db
        .update_document(
            &fresh,
            "articles",
            "a0",
            DocumentUpdate::new().set("views", 1i64),
        )
        .is_ok());
}

#[test]
fn equal_timestamp_is_not_a_conflict() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let updated_at = db
        .get_document(&ctx, "articles", "a0", &[])
        .unwrap()
        .unwrap()
        .updated_at()
        .unwrap();

    // Strictly-after comparison: an exactly equal stamp proceeds
    let exact = ctx.clone().with_request_timestamp(updated_at);
    assert!(db
        .update_document(
            &exact,
            "articles",
            "a0",
            DocumentUpdate::new().set("views", 2i64),
        )
        .is_ok());
}

#[test]
fn delete_respects_request_timestamp() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let stale = ctx.clone().with_request_timestamp(datetime::now() - Duration::hours(1));
    let err = db.delete_document(&stale, "articles", "a0").unwrap_err();
    assert!(err.is_conflict());

    // The document survived the rejected delete
    assert!(db.get_document(&ctx, "articles", "a0", &[]).unwrap().is_some());
}

#[test]
fn conflict_leaves_document_unchanged() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let stale = ctx.clone().with_request_timestamp(datetime::now() - Duration::hours(1));
    let _ = db.update_document(
        &stale,
        "articles",
        "a0",
        DocumentUpdate::new().apply("views", Operator::increment(5i64)),
    );

    let doc = db.get_document(&ctx, "articles", "a0", &[]).unwrap().unwrap();
    assert_eq!(doc.get("views"), Some(&docketdb::Value::Int(0)));
}

#[test]
fn context_without_timestamp_never_conflicts() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    for i in 0..3 {
        assert!(db
            .update_document(
                &ctx,
                "articles",
                "a0",
                DocumentUpdate::new().set("views", i as i64),
            )
            .is_ok());
    }
}

#[test]
fn bulk_update_respects_request_timestamp() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 3);

    let stale = ctx.clone().with_request_timestamp(datetime::now() - Duration::hours(1));
    let err = db
        .update_documents(
            &stale,
            "articles",
            DocumentUpdate::new().apply("views", Operator::increment(1i64)),
            &[],
            10,
            None,
        )
        .unwrap_err();
    assert!(err.is_conflict());
}
