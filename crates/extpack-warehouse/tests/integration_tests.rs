//! Integration tests for warehouse adapters
//!
//! These tests validate the adapters work correctly with the mock warehouse
//! and with real connections. Tests requiring actual warehouse credentials
//! are marked with `#[ignore]` and can be run with `cargo test -- --ignored`.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no credentials required)
//! cargo test -p extpack-warehouse --test integration_tests
//!
//! # Run BigQuery integration tests
//! GOOGLE_APPLICATION_CREDENTIALS=/path/to/key.json \
//! BQ_TEST_PROJECT=my-project \
//! BQ_TEST_DATASET=my_dataset \
//! cargo test -p extpack-warehouse --features bigquery --test integration_tests -- --ignored
//!
//! # Run Snowflake integration tests
//! SF_ACCOUNT=xy12345 SF_USER=user SF_PASSWORD=pass \
//! SF_TEST_DATABASE=DB SF_TEST_SCHEMA=TMP \
//! cargo test -p extpack-warehouse --features snowflake --test integration_tests -- --ignored
//! ```

mod fixtures;

use extpack_core::{Config, Provider};
use extpack_warehouse::{
    BigQueryAdapter, MockAdapter, Session, SnowflakeAdapter, WarehouseAdapter, WarehouseError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

/// Check if BigQuery credentials are available
fn has_bigquery_credentials() -> bool {
    std::env::var("BQ_TEST_PROJECT").is_ok() && std::env::var("BQ_TEST_DATASET").is_ok()
}

/// Check if Snowflake credentials are available
fn has_snowflake_credentials() -> bool {
    std::env::var("SF_ACCOUNT").is_ok() && std::env::var("SF_PASSWORD").is_ok()
}

// =============================================================================
// Mock Adapter Tests (No credentials required)
// =============================================================================

#[tokio::test]
async fn test_mock_load_then_select() {
    let adapter = MockAdapter::new();
    let table = "`p.d`._test_buffer_points";

    adapter.load_table(&fixtures::points_rows(), table).await.unwrap();

    let fetched = adapter.execute(&format!("SELECT * FROM {}", table)).await.unwrap();
    assert_eq!(fetched, fixtures::points_rows());
}

#[tokio::test]
async fn test_mock_load_replaces_existing_table() {
    let adapter = MockAdapter::new();

    adapter.load_table(&fixtures::points_rows(), "d.t").await.unwrap();
    adapter.load_table(&fixtures::single_row(), "d.t").await.unwrap();

    assert_eq!(adapter.table("d.t").await.unwrap(), fixtures::single_row());
}

#[tokio::test]
async fn test_mock_records_statements_in_order() {
    let adapter = MockAdapter::new();
    adapter.execute("CREATE TABLE a (x INT64)").await.unwrap();
    adapter.execute("DROP TABLE a").await.unwrap();

    assert_eq!(
        adapter.statements().await,
        vec!["CREATE TABLE a (x INT64)".to_string(), "DROP TABLE a".to_string()]
    );
    assert_eq!(adapter.statements_starting_with("drop").await.len(), 1);
}

#[tokio::test]
async fn test_mock_connection_failure_simulation() {
    let adapter = MockAdapter::new().with_connection_failure();

    let result = adapter.test_connection().await;
    assert!(matches!(result, Err(WarehouseError::Connection { .. })));

    let result = adapter.execute("SELECT 1").await;
    assert!(matches!(result, Err(WarehouseError::Connection { .. })));
}

#[tokio::test]
async fn test_mock_load_failure_simulation() {
    let adapter = MockAdapter::new().with_load_failure();
    let result = adapter.load_table(&fixtures::points_rows(), "d.t").await;

    assert!(matches!(result, Err(WarehouseError::LoadError { ref table, .. }) if table == "d.t"));
    assert!(adapter.table("d.t").await.is_none());
}

#[tokio::test]
async fn test_mock_procedure_with_two_outputs() {
    let adapter = MockAdapter::new();
    adapter
        .add_procedure("SPLIT", |call| {
            let n: i64 = call.args[0].parse().unwrap_or(0);
            let low = vec![json!({"n": n - 1}).as_object().unwrap().clone()];
            let high = vec![json!({"n": n + 1}).as_object().unwrap().clone()];
            Ok(vec![low, high])
        })
        .await;

    adapter
        .execute("CALL d.SPLIT(5,'d._table_low','d._table_high',false);")
        .await
        .unwrap();

    assert_eq!(adapter.table("d._table_low").await.unwrap()[0]["n"], json!(4));
    assert_eq!(adapter.table("d._table_high").await.unwrap()[0]["n"], json!(6));
    assert_eq!(adapter.table_names().await, vec!["d._table_high", "d._table_low"]);
}

#[tokio::test]
async fn test_session_uses_preset_mock() {
    let session = Session::new(Config::default()).with_adapter(Box::new(MockAdapter::new()));
    let adapter = session.adapter(Provider::BigQuery).await.unwrap();
    adapter.load_table(&fixtures::mixed_rows(), "d.mixed").await.unwrap();

    let rows = adapter.execute("SELECT * FROM d.mixed").await.unwrap();
    assert_eq!(rows, fixtures::mixed_rows());
}

// =============================================================================
// SQL Generation Tests (No credentials required)
// =============================================================================

#[test]
fn test_bigquery_load_sql_covers_all_value_kinds() {
    let sql = BigQueryAdapter::load_table_sql(&fixtures::mixed_rows(), "`p.d`.t").unwrap();

    assert!(sql.starts_with("CREATE OR REPLACE TABLE `p.d`.t AS"));
    assert!(sql.contains("TRUE AS `flag`"));
    assert!(sql.contains(r"'o\'hara' AS `name`"));
    assert!(sql.contains(r#"JSON '["x"]' AS `tags`"#));
    assert!(sql.contains("CAST(NULL AS STRING) AS `missing`"));
}

#[test]
fn test_snowflake_load_sql_uses_first_row_types() {
    let rows = fixtures::points_rows();
    let create = SnowflakeAdapter::create_table_sql(&rows, "DB.TMP.points").unwrap();
    assert_eq!(
        create,
        "CREATE OR REPLACE TABLE DB.TMP.points (id NUMBER, label VARCHAR, x FLOAT);"
    );

    let inserts: Vec<String> = rows
        .iter()
        .map(|r| SnowflakeAdapter::insert_sql(r, "DB.TMP.points"))
        .collect();
    assert_eq!(inserts.len(), 3);
    assert_eq!(inserts[2], "INSERT INTO DB.TMP.points (id, label, x) VALUES (3, 'c', -3.0);");
}

// =============================================================================
// Live Warehouse Tests (credentials required)
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_bigquery_roundtrip_live() {
    if !has_bigquery_credentials() {
        eprintln!("Skipping: BigQuery credentials not available");
        return;
    }

    let session = Session::new(Config::from_env());
    let adapter = session.adapter(Provider::BigQuery).await.unwrap();
    let dest = session.workflows_temp(Provider::BigQuery).unwrap();
    let table = format!("{}._extpack_it_points", dest);

    adapter.load_table(&fixtures::points_rows(), &table).await.unwrap();
    let rows = adapter.execute(&format!("SELECT * FROM {} ORDER BY id", table)).await.unwrap();
    assert_eq!(rows, fixtures::points_rows());

    adapter.execute(&format!("DROP TABLE {}", table)).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_snowflake_roundtrip_live() {
    if !has_snowflake_credentials() {
        eprintln!("Skipping: Snowflake credentials not available");
        return;
    }

    let session = Session::new(Config::from_env());
    let adapter = session.adapter(Provider::Snowflake).await.unwrap();
    adapter.test_connection().await.unwrap();

    let dest = session.workflows_temp(Provider::Snowflake).unwrap();
    let table = format!("{}._extpack_it_points", dest);
    adapter.load_table(&fixtures::single_row(), &table).await.unwrap();

    let rows = adapter.execute(&format!("SELECT * FROM {}", table)).await.unwrap();
    assert_eq!(rows.len(), 1);

    adapter.execute(&format!("DROP TABLE {}", table)).await.unwrap();
}
