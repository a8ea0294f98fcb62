//! PgRecordStore against a real pgvector database.
//!
//! These need Docker: cargo test --test record_store_pg_tests -- --ignored

mod common;

use common::*;
use mojifeed_core::domains::emoji::{NewRecord, Visual};
use mojifeed_core::kernel::{BaseRecordStore, PgRecordStore};
use test_context::test_context;
use uuid::Uuid;

// Each test uses its own axes so rows from other tests never reach its
// similarity threshold.

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn insert_then_read_back(ctx: &TestHarness) {
    let store = ctx.store();
    let new = NewRecord::new(Visual::Glyph("🐶".into()), "a happy dog".into(), axis(10));

    let created = store.insert(new.clone()).await.unwrap();
    assert_eq!(created.id, new.id);
    assert_eq!(created.embedding, new.embedding);

    let found = store.find_by_id(created.id).await.unwrap();
    assert_eq!(found, Some(created));
    assert_eq!(store.find_by_id(Uuid::new_v4()).await.unwrap(), None);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn sticker_url_round_trips(ctx: &TestHarness) {
    let store = ctx.store();
    let url = "http://localhost:8080/blobs/abc.png".to_string();
    let created = store
        .insert(NewRecord::new(Visual::ImageUrl(url.clone()), "a sticker".into(), axis(11)))
        .await
        .unwrap();

    assert_eq!(created.visual, Visual::ImageUrl(url));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn wrong_dimension_is_rejected(ctx: &TestHarness) {
    let store = ctx.store();
    let result = store
        .insert(NewRecord::new(Visual::Glyph("❌".into()), "short".into(), vec![1.0; 3]))
        .await;
    assert!(result.is_err());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn similarity_search_uses_cosine(ctx: &TestHarness) {
    let store = ctx.store();
    let close = store
        .insert(NewRecord::new(Visual::Glyph("🐕".into()), "close".into(), vector_at(20, 21, 0.82)))
        .await
        .unwrap();
    store
        .insert(NewRecord::new(Visual::Glyph("🚗".into()), "far".into(), vector_at(20, 22, 0.31)))
        .await
        .unwrap();

    let results = store.query_similar(&axis(20), 0.5, 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.id, close.id);
    assert!((results[0].similarity - 0.82).abs() < 1e-3);

    let exact = store
        .query_similar(&vector_at(20, 21, 0.82), 1.0, 10)
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].record.id, close.id);
    assert_eq!(exact[0].similarity, 1.0);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn identical_non_unit_vector_meets_threshold_one(ctx: &TestHarness) {
    let store = ctx.store();
    let mut embedding = vec![0.0; DIMS];
    embedding[40] = 3.0;
    embedding[41] = 4.0;
    embedding[42] = 0.7;
    let created = store
        .insert(NewRecord::new(Visual::Glyph("🎯".into()), "exact".into(), embedding.clone()))
        .await
        .unwrap();

    let results = store.query_similar(&embedding, 1.0, 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.id, created.id);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn recent_is_newest_first(ctx: &TestHarness) {
    let store = ctx.store();
    for i in 0..3 {
        store
            .insert(NewRecord::new(
                Visual::Glyph("🕐".into()),
                format!("tick {i}"),
                axis(30 + i),
            ))
            .await
            .unwrap();
    }

    let recent = store.recent(50).await.unwrap();
    assert!(recent
        .windows(2)
        .all(|w| w[0].created_at >= w[1].created_at));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn schema_matches_configured_dimensions(ctx: &TestHarness) {
    ctx.store().check_dimensions().await.unwrap();
    assert!(PgRecordStore::new(ctx.db_pool.clone(), 768)
        .check_dimensions()
        .await
        .is_err());
    ctx.store().ping().await.unwrap();
}
