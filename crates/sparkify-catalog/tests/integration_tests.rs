//! Integration tests for warehouse adapters
//!
//! These tests validate the adapters against the [`Warehouse`] contract.
//! Tests requiring a live server are marked with `#[ignore]` and can be run
//! with `cargo test -- --ignored`.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no credentials required)
//! cargo test -p sparkify-catalog --test integration_tests
//!
//! # Run against PostgreSQL or Redshift
//! SPARKIFY_TEST_HOST=localhost \
//! SPARKIFY_TEST_PORT=5432 \
//! SPARKIFY_TEST_DB=postgres \
//! SPARKIFY_TEST_USER=postgres \
//! SPARKIFY_TEST_PASSWORD=postgres \
//! cargo test -p sparkify-catalog --test integration_tests -- --ignored
//! ```

mod fixtures;

use sparkify_catalog::{MockCall, MockWarehouse, PostgresWarehouse, Warehouse, WarehouseError};
use sparkify_core::ClusterConfig;

// =============================================================================
// Helper Functions
// =============================================================================

/// Cluster settings from `SPARKIFY_TEST_*`, if a live server is configured
fn live_cluster() -> Option<ClusterConfig> {
    let host = std::env::var("SPARKIFY_TEST_HOST").ok()?;
    Some(ClusterConfig {
        host,
        db_name: std::env::var("SPARKIFY_TEST_DB").unwrap_or_else(|_| "postgres".to_string()),
        db_user: std::env::var("SPARKIFY_TEST_USER").unwrap_or_else(|_| "postgres".to_string()),
        db_password: std::env::var("SPARKIFY_TEST_PASSWORD").unwrap_or_default(),
        db_port: std::env::var("SPARKIFY_TEST_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432),
    })
}

// =============================================================================
// Mock Adapter Tests (No credentials required)
// =============================================================================

#[tokio::test]
async fn test_mock_staging_workflow() {
    let mut warehouse = MockWarehouse::new()
        .with_source("s3://udacity-dend/song_data", fixtures::song_records())
        .with_source("s3://udacity-dend/log_data", fixtures::event_records());

    warehouse
        .execute("CREATE TABLE IF NOT EXISTS staging_songs (artist_id VARCHAR);")
        .await
        .unwrap();
    warehouse
        .execute("CREATE TABLE IF NOT EXISTS staging_events (artist VARCHAR);")
        .await
        .unwrap();

    let songs = warehouse
        .execute("COPY staging_songs FROM 's3://udacity-dend/song_data' format as json 'auto';")
        .await
        .unwrap();
    let events = warehouse
        .execute("COPY staging_events FROM 's3://udacity-dend/log_data' format as json 'auto';")
        .await
        .unwrap();

    assert_eq!(songs, 2);
    assert_eq!(events, 3);
    assert_eq!(warehouse.count_rows("staging_songs").await.unwrap(), 2);
    assert_eq!(warehouse.count_rows("STAGING_EVENTS").await.unwrap(), 3);
    assert_eq!(warehouse.table_names(), vec!["staging_events", "staging_songs"]);
}

#[tokio::test]
async fn test_mock_count_missing_table() {
    let mut warehouse = MockWarehouse::new();
    let result = warehouse.count_rows("songplays").await;

    match result {
        Err(WarehouseError::QueryError(msg)) => assert!(msg.contains("songplays")),
        other => panic!("Expected QueryError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_mock_committed_transaction_persists() {
    let mut warehouse = MockWarehouse::new().with_table("staging_songs");

    warehouse.begin().await.unwrap();
    warehouse.execute("TRUNCATE TABLE staging_songs;").await.unwrap();
    warehouse.execute("CREATE TABLE IF NOT EXISTS songs (song_id VARCHAR);").await.unwrap();
    warehouse.commit().await.unwrap();

    assert!(!warehouse.in_transaction());
    assert!(warehouse.table_exists("songs").await.unwrap());
    assert_eq!(
        warehouse.calls(),
        &[
            MockCall::Begin,
            MockCall::Execute("TRUNCATE TABLE staging_songs;".to_string()),
            MockCall::Execute("CREATE TABLE IF NOT EXISTS songs (song_id VARCHAR);".to_string()),
            MockCall::Commit,
        ]
    );
}

#[tokio::test]
async fn test_mock_failure_injection_is_atomic() {
    let mut warehouse = MockWarehouse::new()
        .with_table("staging_songs")
        .with_source("s3://b/songs", fixtures::song_records())
        .fail_on("ACCEPTINVCHARS", "Invalid operation: ACCEPTINVCHARS not supported");

    let result = warehouse
        .execute("COPY staging_songs FROM 's3://b/songs' ACCEPTINVCHARS AS '^';")
        .await;

    assert!(matches!(result, Err(WarehouseError::QueryError(ref m)) if m.contains("ACCEPTINVCHARS")));
    assert_eq!(warehouse.rows("staging_songs").map(|r| r.len()), Some(0));
}

#[tokio::test]
async fn test_mock_custom_name_and_trait_object() {
    let mut warehouse: Box<dyn Warehouse> = Box::new(MockWarehouse::new().with_name("Redshift (mock)"));

    assert_eq!(warehouse.name(), "Redshift (mock)");
    assert!(warehouse.test_connection().await.is_ok());
    warehouse.close().await.unwrap();
    assert!(matches!(warehouse.test_connection().await, Err(WarehouseError::Closed)));
}

// =============================================================================
// PostgreSQL / Redshift Tests (Require credentials)
// =============================================================================

#[tokio::test]
#[ignore = "requires a live PostgreSQL or Redshift server"]
async fn test_postgres_connection() {
    let Some(cluster) = live_cluster() else {
        eprintln!("Skipping: SPARKIFY_TEST_HOST not set");
        return;
    };

    let mut warehouse = PostgresWarehouse::connect(&cluster).await.unwrap();
    assert_eq!(warehouse.name(), "PostgreSQL");
    warehouse.test_connection().await.unwrap();
    warehouse.close().await.unwrap();

    assert!(matches!(warehouse.execute("SELECT 1").await, Err(WarehouseError::Closed)));
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL or Redshift server"]
async fn test_postgres_rollback_and_counts() {
    let Some(cluster) = live_cluster() else {
        eprintln!("Skipping: SPARKIFY_TEST_HOST not set");
        return;
    };

    let table = "sparkify_it_scratch";
    let mut warehouse = PostgresWarehouse::connect(&cluster).await.unwrap();

    warehouse.execute(&format!("DROP TABLE IF EXISTS {} CASCADE;", table)).await.unwrap();
    // Dropping again must not raise
    warehouse.execute(&format!("DROP TABLE IF EXISTS {} CASCADE;", table)).await.unwrap();
    warehouse.execute(&fixtures::scratch_table_ddl(table)).await.unwrap();
    assert!(warehouse.table_exists(table).await.unwrap());

    let inserted = warehouse
        .execute(&format!("INSERT INTO {} VALUES (1, 'a'), (2, 'b');", table))
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    warehouse.begin().await.unwrap();
    warehouse.execute(&format!("INSERT INTO {} VALUES (3, 'c');", table)).await.unwrap();
    warehouse.rollback().await.unwrap();
    assert_eq!(warehouse.count_rows(table).await.unwrap(), 2);

    let bad = warehouse.execute("SELECT * FROM sparkify_it_missing_table;").await;
    assert!(matches!(bad, Err(WarehouseError::QueryError(ref m)) if m.contains("does not exist")));

    warehouse.execute(&format!("DROP TABLE IF EXISTS {} CASCADE;", table)).await.unwrap();
    warehouse.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_postgres_unreachable_host() {
    let cluster = ClusterConfig {
        host: "127.0.0.1".to_string(),
        db_name: "dev".to_string(),
        db_user: "nobody".to_string(),
        db_password: String::new(),
        db_port: 1,
    };

    let result = PostgresWarehouse::connect(&cluster).await;
    assert!(matches!(result, Err(WarehouseError::ConnectionError(_))));
}
