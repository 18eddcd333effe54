//! Query execution: filters, ordering, pagination, projection

mod common;

use common::*;
use docketdb::{DatabaseError, Document, Query, Value};

#[test]
fn filters_combine_as_and() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 10);

    let docs = db
        .find(
            &ctx,
            "articles",
            &[
                Query::greater_than("views", 2i64),
                Query::equal("published", vec![Value::Bool(true)]),
            ],
        )
        .unwrap();
    let ids: Vec<&str> = docs.iter().map(Document::id).collect();
    assert_eq!(ids, vec!["a4", "a6", "a8"]);
}

#[test]
fn or_combinator() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 6);

    let docs = db
        .find(
            &ctx,
            "articles",
            &[Query::or(vec![
                Query::equal("views", vec![Value::Int(0)]),
                Query::equal("views", vec![Value::Int(5)]),
            ])],
        )
        .unwrap();
    let ids: Vec<&str> = docs.iter().map(Document::id).collect();
    assert_eq!(ids, vec!["a0", "a5"]);
}

#[test]
fn malformed_or_is_rejected() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 2);

    let err = db
        .find(
            &ctx,
            "articles",
            &[Query::or(vec![Query::equal("views", vec![Value::Int(0)])])],
        )
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Query(_)));
    assert!(err.to_string().contains("at least two"));
}

#[test]
fn order_ascending_and_descending() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 5);

    let asc = db.find(&ctx, "articles", &[Query::order_asc("views")]).unwrap();
    let views: Vec<i64> = asc.iter().map(|d| d.get("views").unwrap().as_int().unwrap()).collect();
    assert_eq!(views, vec![0, 1, 2, 3, 4]);

    let desc = db.find(&ctx, "articles", &[Query::order_desc("views")]).unwrap();
    let views: Vec<i64> = desc.iter().map(|d| d.get("views").unwrap().as_int().unwrap()).collect();
    assert_eq!(views, vec![4, 3, 2, 1, 0]);
}

#[test]
fn multi_key_order_breaks_ties() {
    let (db, ctx) = open();
    db.create_collection(&ctx, articles()).unwrap();
    for (id, published, views) in [
        ("x1", true, 5i64),
        ("x2", false, 9),
        ("x3", true, 1),
        ("x4", false, 2),
    ] {
        db.create_document(
            &ctx,
            "articles",
            Document::new(id).with("title", id).with("published", published).with("views", views),
        )
        .unwrap();
    }

    let docs = db
        .find(
            &ctx,
            "articles",
            &[Query::order_desc("published"), Query::order_asc("views")],
        )
        .unwrap();
    let ids: Vec<&str> = docs.iter().map(Document::id).collect();
    assert_eq!(ids, vec!["x3", "x1", "x4", "x2"]);
}

#[test]
fn natural_order_is_insertion_order() {
    let (db, ctx) = open();
    db.create_collection(&ctx, articles()).unwrap();
    for id in ["zeta", "alpha", "mid"] {
        db.create_document(&ctx, "articles", Document::new(id).with("title", id))
            .unwrap();
    }

    let docs = db.find(&ctx, "articles", &[Query::order_asc("")]).unwrap();
    let ids: Vec<&str> = docs.iter().map(Document::id).collect();
    assert_eq!(ids, vec!["zeta", "alpha", "mid"]);

    let reversed = db.find(&ctx, "articles", &[Query::order_desc("")]).unwrap();
    let ids: Vec<&str> = reversed.iter().map(Document::id).collect();
    assert_eq!(ids, vec!["mid", "alpha", "zeta"]);
}

#[test]
fn limit_and_offset() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 10);

    let docs = db
        .find(
            &ctx,
            "articles",
            &[Query::order_asc("views"), Query::limit(3), Query::offset(4)],
        )
        .unwrap();
    let views: Vec<i64> = docs.iter().map(|d| d.get("views").unwrap().as_int().unwrap()).collect();
    assert_eq!(views, vec![4, 5, 6]);
}

/// Forward cursor pages reproduce a full scan exactly, for any ordering
#[test]
fn cursor_pagination_matches_full_scan() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 23);

    for ordering in [
        vec![Query::order_asc("views")],
        vec![Query::order_desc("title")],
        vec![Query::order_desc("published"), Query::order_asc("views")],
        vec![Query::order_asc("")],
    ] {
        let full = db.find(&ctx, "articles", &ordering).unwrap();
        assert_eq!(full.len(), 23);

        let mut paged: Vec<Document> = Vec::new();
        let mut cursor: Option<Document> = None;
        loop {
            let mut queries = ordering.clone();
            queries.push(Query::limit(5));
            if let Some(anchor) = &cursor {
                queries.push(Query::cursor_after(anchor.clone()));
            }
            let page = db.find(&ctx, "articles", &queries).unwrap();
            if page.is_empty() {
                break;
            }
            cursor = page.last().cloned();
            paged.extend(page);
        }

        let full_ids: Vec<&str> = full.iter().map(Document::id).collect();
        let paged_ids: Vec<&str> = paged.iter().map(Document::id).collect();
        assert_eq!(full_ids, paged_ids, "ordering {ordering:?}");
    }
}

/// Backward cursor pages reproduce the same sequence symmetrically
#[test]
fn cursor_before_walks_backwards() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 12);

    let ordering = vec![Query::order_asc("views")];
    let full = db.find(&ctx, "articles", &ordering).unwrap();

    let mut collected: Vec<Document> = full.last().cloned().into_iter().collect();
    let mut anchor = full.last().cloned().unwrap();
    loop {
        let mut queries = ordering.clone();
        queries.push(Query::limit(4));
        queries.push(Query::cursor_before(anchor.clone()));
        let page = db.find(&ctx, "articles", &queries).unwrap();
        if page.is_empty() {
            break;
        }
        anchor = page.first().cloned().unwrap();
        for doc in page.into_iter().rev() {
            collected.push(doc);
        }
    }
    collected.reverse();

    let full_ids: Vec<&str> = full.iter().map(Document::id).collect();
    let collected_ids: Vec<&str> = collected.iter().map(Document::id).collect();
    assert_eq!(full_ids, collected_ids);
}

#[test]
fn projection_returns_selected_fields_only() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let doc = db
        .get_document(
            &ctx,
            "articles",
            "a0",
            &[Query::select(vec!["title".into()])],
        )
        .unwrap()
        .unwrap();

    assert_eq!(doc.get("title"), Some(&Value::String("title-0".into())));
    assert!(doc.get("views").is_none());
    // Projection-gated internal fields are absent unless selected
    assert_eq!(doc.id(), "");
    assert!(doc.internal_id().is_none());
    assert!(doc.created_at().is_none());
    // Always retained for auditing
    assert_eq!(doc.collection(), "articles");
}

#[test]
fn projection_with_internal_field_selection() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let doc = db
        .get_document(
            &ctx,
            "articles",
            "a0",
            &[Query::select(vec!["title".into(), "$id".into()])],
        )
        .unwrap()
        .unwrap();
    assert_eq!(doc.id(), "a0");
    assert!(doc.internal_id().is_none());
    assert!(doc.updated_at().is_none());
}

#[test]
fn projection_does_not_persist() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let _ = db
        .find(&ctx, "articles", &[Query::select(vec!["title".into()])])
        .unwrap();
    // A later unprojected read still sees everything
    let full = db.get_document(&ctx, "articles", "a0", &[]).unwrap().unwrap();
    assert!(full.get("views").is_some());
    assert_eq!(full.id(), "a0");
}

#[test]
fn find_one_returns_first_match() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 5);

    let doc = db
        .find_one(&ctx, "articles", &[Query::order_desc("views")])
        .unwrap()
        .unwrap();
    assert_eq!(doc.get("views"), Some(&Value::Int(4)));

    let none = db
        .find_one(&ctx, "articles", &[Query::greater_than("views", 100i64)])
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn count_and_sum() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 6);

    assert_eq!(db.count(&ctx, "articles", &[], None).unwrap(), 6);
    assert_eq!(
        db.count(&ctx, "articles", &[Query::greater_than("views", 2i64)], None).unwrap(),
        3
    );
    assert_eq!(db.count(&ctx, "articles", &[], Some(4)).unwrap(), 4);

    // 0 + 1 + ... + 5
    assert_eq!(db.sum(&ctx, "articles", "views", &[], None).unwrap(), 15.0);

    let err = db.sum(&ctx, "articles", "title", &[], None).unwrap_err();
    assert!(matches!(err, DatabaseError::Query(_)));
}

#[test]
fn foreach_streams_every_match_in_order() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 17);

    let mut seen: Vec<i64> = Vec::new();
    let processed = db
        .foreach(&ctx, "articles", &[Query::order_asc("views")], |doc| {
            seen.push(doc.get("views").unwrap().as_int().unwrap());
            Ok(())
        })
        .unwrap();
    assert_eq!(processed, 17);
    assert_eq!(seen, (0..17).collect::<Vec<i64>>());
}

#[test]
fn foreach_rejects_cursor_before() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 3);
    let anchor = db.get_document(&ctx, "articles", "a2", &[]).unwrap().unwrap();

    let err = db
        .foreach(&ctx, "articles", &[Query::cursor_before(anchor)], |_| Ok(()))
        .unwrap_err();
    assert!(err.to_string().contains("cursorBefore is not supported"));
}

#[test]
fn unknown_attribute_in_filter_is_rejected() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 1);

    let err = db
        .find(&ctx, "articles", &[Query::equal("ghost", vec![Value::Int(1)])])
        .unwrap_err();
    assert!(err.to_string().contains("Attribute not found in schema"));
}

#[test]
fn contains_on_array_attribute() {
    let (db, ctx) = open();
    db.create_collection(&ctx, articles()).unwrap();
    for (id, tags) in [("t1", vec!["rust", "db"]), ("t2", vec!["go"]), ("t3", vec!["db"])] {
        let tags = Value::Array(tags.into_iter().map(Value::from).collect());
        db.create_document(
            &ctx,
            "articles",
            Document::new(id).with("title", id).with("tags", tags),
        )
        .unwrap();
    }

    let docs = db
        .find(&ctx, "articles", &[Query::contains("tags", vec![Value::from("db")])])
        .unwrap();
    let ids: Vec<&str> = docs.iter().map(Document::id).collect();
    assert_eq!(ids, vec!["t1", "t3"]);

    // contains is invalid on scalar non-string attributes
    let err = db
        .find(&ctx, "articles", &[Query::contains("views", vec![Value::Int(1)])])
        .unwrap_err();
    assert!(err.to_string().contains("neither an array nor a string"));
}

#[test]
fn queries_are_reusable_values() {
    let (db, ctx) = open();
    seed_articles(&db, &ctx, 4);

    let query = Query::greater_than("views", 1i64);
    let first = db.find(&ctx, "articles", std::slice::from_ref(&query)).unwrap();
    let second = db.find(&ctx, "articles", std::slice::from_ref(&query)).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(query, Query::greater_than("views", 1i64));
}
