//! Shared helpers for the integration suites
#![allow(dead_code)]

use docketdb::{
    AccessContext, Attribute, Collection, Database, Document, MemoryAdapter, MemoryConfig,
};
use std::sync::Arc;

/// A bootstrapped database over a default memory adapter, plus a privileged
/// context for setup work
pub fn open() -> (Database, AccessContext) {
    open_with(MemoryConfig::default())
}

pub fn open_with(config: MemoryConfig) -> (Database, AccessContext) {
    init_tracing();
    let db = Database::new(Arc::new(MemoryAdapter::new(config)));
    db.bootstrap().expect("bootstrap");
    (db, AccessContext::privileged())
}

/// Route engine logs through the test harness; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// The schema most suites share: a small article catalog
pub fn articles() -> Collection {
    Collection::new("articles")
        .with_attribute(Attribute::string("title", 128).required())
        .with_attribute(Attribute::integer("views").with_default(0i64))
        .with_attribute(Attribute::float("score"))
        .with_attribute(Attribute::boolean("published"))
        .with_attribute(Attribute::datetime("publishedAt"))
        .with_attribute(Attribute::string("tags", 32).as_array())
}

/// Create the articles collection and seed `n` documents
///
/// Document `i` gets id `a<i>`, title `title-<i>`, views `i` and alternating
/// published flags, so ordering and filtering tests have known data.
pub fn seed_articles(db: &Database, ctx: &AccessContext, n: usize) {
    db.create_collection(ctx, articles()).expect("create articles");
    for i in 0..n {
        let doc = Document::new(format!("a{i}"))
            .with("title", format!("title-{i}"))
            .with("views", i as i64)
            .with("published", i % 2 == 0);
        db.create_document(ctx, "articles", doc).expect("seed doc");
    }
}
