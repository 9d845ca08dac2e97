//! Warehouse adapter trait for running extension SQL

use extpack_core::{Provider, Row};

/// Errors that can occur when talking to a warehouse
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Error connecting to {provider}: {message}")]
    Connection { provider: Provider, message: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Failed to load table {table}: {message}")]
    LoadError { table: String, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Uniform capability set over BigQuery and Snowflake.
///
/// Every call completes before it returns; callers await them one at a time.
#[async_trait::async_trait]
pub trait WarehouseAdapter: Send + Sync {
    /// Get the adapter name (e.g., "BigQuery", "Snowflake")
    fn name(&self) -> &'static str;

    /// Warehouse dialect this adapter speaks
    fn provider(&self) -> Provider;

    /// Run arbitrary SQL, DDL or DML and return its rows (empty for statements)
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, WarehouseError>;

    /// Create or replace `table` with a schema derived from `rows` and insert them
    ///
    /// `table` is fully qualified in the adapter's dialect.
    async fn load_table(&self, rows: &[Row], table: &str) -> Result<(), WarehouseError>;

    /// Test the connection to the warehouse
    async fn test_connection(&self) -> Result<(), WarehouseError> {
        self.execute("SELECT 1").await.map(|_| ())
    }
}

/// Column names in first-row order, extended by any later-seen keys
pub(crate) fn column_names(rows: &[Row]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_error_names_provider() {
        let err = WarehouseError::Connection {
            provider: Provider::Snowflake,
            message: "bad password".to_string(),
        };
        assert_eq!(err.to_string(), "Error connecting to Snowflake: bad password");
    }

    #[test]
    fn column_names_keep_first_seen_order() {
        let rows: Vec<Row> = vec![
            json!({"b": 1, "a": 2}).as_object().unwrap().clone(),
            json!({"a": 3, "c": 4}).as_object().unwrap().clone(),
        ];
        assert_eq!(column_names(&rows), vec!["b", "a", "c"]);
    }
}
