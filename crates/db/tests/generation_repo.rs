//! Postgres-backed repository tests. Run with a database available:
//! `DATABASE_URL=... cargo test -p genhub-db -- --ignored`

use genhub_core::generation::{GenerationKind, GenerationRequest};
use genhub_db::models::generation::{CompleteGeneration, CreateGeneration, GenerationListQuery};
use genhub_db::models::status::GenerationStatus;
use genhub_db::repositories::GenerationRepo;
use serde_json::{json, Map, Value};
use sqlx::PgPool;

fn create_input(prompt: &str, negative: Option<&str>) -> CreateGeneration {
    let mut params = Map::new();
    params.insert("negative_prompt".into(), negative.map(str::to_string).into());
    params.insert("width".into(), json!(512));
    params.insert("seed".into(), Value::Null);
    CreateGeneration::from_request(&GenerationRequest::new(
        GenerationKind::TextToImage,
        prompt,
        params,
    ))
}

// ---------------------------------------------------------------------------
// Test: bootstrap and health check
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres database"]
async fn test_health_check_and_lookup_seed(pool: PgPool) {
    genhub_db::health_check(&pool).await.unwrap();

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM generation_statuses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 4);
}

// ---------------------------------------------------------------------------
// Test: create starts in processing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres database"]
async fn test_create_is_processing(pool: PgPool) {
    let row = GenerationRepo::create(&pool, &create_input("mountain sunset", None))
        .await
        .unwrap();

    assert_eq!(row.status(), Some(GenerationStatus::Processing));
    assert_eq!(row.generation_kind, "text-to-image");
    assert_eq!(row.parameters["width"], 512);
    assert!(row.completed_at.is_none());
}

// ---------------------------------------------------------------------------
// Test: terminal transition happens once
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres database"]
async fn test_complete_then_fail_is_rejected(pool: PgPool) {
    let row = GenerationRepo::create(&pool, &create_input("cat", None))
        .await
        .unwrap();

    let output = CompleteGeneration {
        output_path: Some("generated/a.png".into()),
        output_url: Some("https://cdn/a.png".into()),
        seed: Some(42),
        processing_time: 1.5,
    };
    assert!(GenerationRepo::complete(&pool, row.id, &output).await.unwrap());
    assert!(!GenerationRepo::fail(&pool, row.id, "late failure", None)
        .await
        .unwrap());

    let stored = GenerationRepo::find_by_id(&pool, row.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), Some(GenerationStatus::Completed));
    assert_eq!(stored.seed, Some(42));
    assert!(stored.error_message.is_none());
    assert!(stored.completed_at.is_some());
}

// ---------------------------------------------------------------------------
// Test: list filters and pagination
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres database"]
async fn test_list_filters_and_total(pool: PgPool) {
    let a = GenerationRepo::create(&pool, &create_input("Mountain sunset", None))
        .await
        .unwrap();
    GenerationRepo::create(&pool, &create_input("city at night", Some("mountains")))
        .await
        .unwrap();
    GenerationRepo::create(&pool, &create_input("forest", None))
        .await
        .unwrap();
    GenerationRepo::fail(&pool, a.id, "boom", Some(0.2)).await.unwrap();

    let search = GenerationListQuery {
        search: Some("mountain".into()),
        ..Default::default()
    };
    let page = GenerationRepo::list(&pool, &search).await.unwrap();
    assert_eq!(page.total, 2);

    let failed = GenerationListQuery {
        status: Some("failed".into()),
        ..Default::default()
    };
    let page = GenerationRepo::list(&pool, &failed).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].error_message.as_deref(), Some("boom"));

    let paged = GenerationListQuery {
        limit: Some(1),
        offset: Some(1),
        ..Default::default()
    };
    let page = GenerationRepo::list(&pool, &paged).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
}

// ---------------------------------------------------------------------------
// Test: delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres database"]
async fn test_delete(pool: PgPool) {
    let row = GenerationRepo::create(&pool, &create_input("cat", None))
        .await
        .unwrap();
    assert!(GenerationRepo::delete(&pool, row.id).await.unwrap());
    assert!(!GenerationRepo::delete(&pool, row.id).await.unwrap());
    assert!(GenerationRepo::find_by_id(&pool, row.id).await.unwrap().is_none());
}
