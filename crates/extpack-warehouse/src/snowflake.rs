//! Snowflake warehouse adapter
//!
//! Statements are executed directly through the Snowflake SQL API. Result
//! sets arrive as Arrow record batches and are converted to JSON rows.
//!
//! ## Authentication
//!
//! Username/password authentication, matching the `SF_USER` and
//! `SF_PASSWORD` configuration keys.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let adapter = SnowflakeAdapter::builder()
//!     .with_password("xy12345.us-east-1", "username", "password")
//!     .with_warehouse("COMPUTE_WH")
//!     .with_role("ANALYST")
//!     .build()?;
//! ```

use crate::adapter::{column_names, WarehouseAdapter, WarehouseError};
use extpack_core::literal::scalar_literal;
use extpack_core::{Provider, Row};
use serde_json::Value;

#[cfg(feature = "snowflake")]
use snowflake_api::{QueryResult, SnowflakeApi};

/// Builder for SnowflakeAdapter
pub struct SnowflakeAdapterBuilder {
    account: String,
    username: String,
    password: String,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
    schema: Option<String>,
}

impl SnowflakeAdapterBuilder {
    /// Create new builder with password authentication
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            password: password.into(),
            warehouse: None,
            role: None,
            database: None,
            schema: None,
        }
    }

    /// Set the warehouse to use
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Set the role to use
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the default database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the default schema
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Build the adapter
    #[cfg(feature = "snowflake")]
    pub fn build(self) -> Result<SnowflakeAdapter, WarehouseError> {
        let connection_error = |e: snowflake_api::SnowflakeApiError| WarehouseError::Connection {
            provider: Provider::Snowflake,
            message: e.to_string(),
        };

        let api = SnowflakeApi::with_password_auth(
            &self.account,
            self.warehouse.as_deref(),
            self.database.as_deref(),
            self.schema.as_deref(),
            &self.username,
            self.role.as_deref(),
            &self.password,
        )
        .map_err(connection_error)?;

        Ok(SnowflakeAdapter {
            api,
            account: self.account,
        })
    }

    /// Build without snowflake feature
    #[cfg(not(feature = "snowflake"))]
    pub fn build(self) -> Result<SnowflakeAdapter, WarehouseError> {
        Err(WarehouseError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string(),
        ))
    }
}

/// Snowflake warehouse adapter
pub struct SnowflakeAdapter {
    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,

    account: String,
}

impl SnowflakeAdapter {
    /// Builder pattern entry point
    pub fn builder() -> SnowflakeAdapterBuilderInit {
        SnowflakeAdapterBuilderInit
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Column type inferred from a sample value
    pub fn infer_column_type(value: &Value) -> &'static str {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => "NUMBER",
            Value::Number(_) => "FLOAT",
            Value::String(_) => "VARCHAR",
            _ => "VARCHAR",
        }
    }

    /// `CREATE OR REPLACE TABLE` sized to the first row
    pub fn create_table_sql(rows: &[Row], table: &str) -> Result<String, WarehouseError> {
        let first = rows.first().ok_or_else(|| WarehouseError::LoadError {
            table: table.to_string(),
            message: "no rows to load".to_string(),
        })?;

        let columns: Vec<String> = first
            .iter()
            .map(|(name, value)| format!("{} {}", name, Self::infer_column_type(value)))
            .collect();

        Ok(format!("CREATE OR REPLACE TABLE {} ({});", table, columns.join(", ")))
    }

    /// One INSERT statement per row
    pub fn insert_sql(row: &Row, table: &str) -> String {
        let names: Vec<&str> = row.keys().map(String::as_str).collect();
        let values: Vec<String> = row.values().map(scalar_literal).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            table,
            names.join(", "),
            values.join(", ")
        )
    }

    /// Rows of a JSON-format result (`rowset` is an array of arrays)
    pub fn rows_from_json(rowset: &Value, field_names: &[String]) -> Vec<Row> {
        rowset
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_array)
                    .map(|cells| {
                        field_names
                            .iter()
                            .cloned()
                            .zip(cells.iter().cloned())
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rows of an Arrow-format result
    #[cfg(feature = "snowflake")]
    fn rows_from_batches(
        batches: &[arrow_array::RecordBatch],
    ) -> Result<Vec<Row>, WarehouseError> {
        // Keep NULL cells as explicit keys so every row has the full column set
        let mut writer = arrow_json::WriterBuilder::new()
            .with_explicit_nulls(true)
            .build::<_, arrow_json::writer::JsonArray>(Vec::new());
        let refs: Vec<&arrow_array::RecordBatch> = batches.iter().collect();
        writer
            .write_batches(&refs)
            .and_then(|_| writer.finish())
            .map_err(|e| WarehouseError::InvalidResponse(format!("Failed to decode Arrow result: {}", e)))?;

        let bytes = writer.into_inner();
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| WarehouseError::InvalidResponse(format!("Failed to decode Arrow result: {}", e)))
    }
}

/// Empty struct for builder pattern initialization
pub struct SnowflakeAdapterBuilderInit;

impl SnowflakeAdapterBuilderInit {
    pub fn with_password(
        self,
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SnowflakeAdapterBuilder {
        SnowflakeAdapterBuilder::with_password(account, username, password)
    }
}

#[async_trait::async_trait]
impl WarehouseAdapter for SnowflakeAdapter {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    fn provider(&self) -> Provider {
        Provider::Snowflake
    }

    #[cfg(feature = "snowflake")]
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, WarehouseError> {
        let result = self.api.exec(sql).await.map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("does not exist") {
                WarehouseError::TableNotFound(err_str)
            } else {
                WarehouseError::QueryError(err_str)
            }
        })?;

        match result {
            QueryResult::Arrow(batches) => Self::rows_from_batches(&batches),
            QueryResult::Json(json) => {
                let names: Vec<String> = json.schema.iter().map(|f| f.name.clone()).collect();
                Ok(Self::rows_from_json(&json.value, &names))
            }
            QueryResult::Empty => Ok(Vec::new()),
        }
    }

    #[cfg(not(feature = "snowflake"))]
    async fn execute(&self, _sql: &str) -> Result<Vec<Row>, WarehouseError> {
        Err(WarehouseError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string(),
        ))
    }

    async fn load_table(&self, rows: &[Row], table: &str) -> Result<(), WarehouseError> {
        let load_error = |e: WarehouseError| WarehouseError::LoadError {
            table: table.to_string(),
            message: e.to_string(),
        };

        self.execute(&Self::create_table_sql(rows, table)?)
            .await
            .map_err(load_error)?;

        // Columns come from the first row; later rows must use the same keys
        let columns = column_names(&rows[..1]);
        for row in rows {
            if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(c)) {
                tracing::warn!(table, "Row keys differ from the first row; insert may fail");
            }
            self.execute(&Self::insert_sql(row, table))
                .await
                .map_err(load_error)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_type_inference() {
        assert_eq!(SnowflakeAdapter::infer_column_type(&json!(3)), "NUMBER");
        assert_eq!(SnowflakeAdapter::infer_column_type(&json!(3.25)), "FLOAT");
        assert_eq!(SnowflakeAdapter::infer_column_type(&json!("x")), "VARCHAR");
        assert_eq!(SnowflakeAdapter::infer_column_type(&json!(true)), "VARCHAR");
        assert_eq!(SnowflakeAdapter::infer_column_type(&json!(null)), "VARCHAR");
    }

    #[test]
    fn test_create_table_sql() {
        let rows = vec![row(json!({"id": 1, "name": "a", "w": 0.5}))];
        assert_eq!(
            SnowflakeAdapter::create_table_sql(&rows, "DB.TMP._test_buffer_points").unwrap(),
            "CREATE OR REPLACE TABLE DB.TMP._test_buffer_points (id NUMBER, name VARCHAR, w FLOAT);"
        );
    }

    #[test]
    fn test_insert_sql_escapes_values() {
        let r = row(json!({"id": 1, "name": "o'hara", "note": null}));
        assert_eq!(
            SnowflakeAdapter::insert_sql(&r, "DB.TMP.t"),
            r"INSERT INTO DB.TMP.t (id, name, note) VALUES (1, 'o\'hara', NULL);"
        );
    }

    #[test]
    fn test_rows_from_json() {
        let names = vec!["A".to_string(), "B".to_string()];
        let rows = SnowflakeAdapter::rows_from_json(&json!([["1", "x"], ["2", null]]), &names);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("A"), Some(&json!("2")));
        assert_eq!(rows[1].get("B"), Some(&Value::Null));
    }

    #[test]
    fn test_empty_load_rejected() {
        assert!(SnowflakeAdapter::create_table_sql(&[], "t").is_err());
    }

    #[test]
    fn test_builder_collects_session_settings() {
        let builder = SnowflakeAdapter::builder()
            .with_password("xy12345", "user", "pass")
            .with_warehouse("WH")
            .with_role("ROLE")
            .with_database("DB")
            .with_schema("TMP");

        assert_eq!(builder.account, "xy12345");
        assert_eq!(builder.username, "user");
        assert_eq!(builder.password, "pass");
        assert_eq!(builder.warehouse.as_deref(), Some("WH"));
        assert_eq!(builder.role.as_deref(), Some("ROLE"));
        assert_eq!(builder.database.as_deref(), Some("DB"));
        assert_eq!(builder.schema.as_deref(), Some("TMP"));
    }

    #[test]
    #[cfg(feature = "snowflake")]
    fn test_rows_from_batches_keeps_nulls() {
        use arrow_array::{ArrayRef, Int64Array, RecordBatch, StringArray};
        use std::sync::Arc;

        let batch = RecordBatch::try_from_iter(vec![
            ("ID", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            ("NAME", Arc::new(StringArray::from(vec![Some("a"), None])) as ArrayRef),
        ])
        .unwrap();

        let rows = SnowflakeAdapter::rows_from_batches(&[batch]).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], row(json!({"ID": 1, "NAME": "a"})));
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[1].get("NAME"), Some(&Value::Null));
    }

    #[test]
    #[cfg(not(feature = "snowflake"))]
    fn test_build_requires_feature() {
        let result = SnowflakeAdapter::builder()
            .with_password("account", "user", "pass")
            .build();
        assert!(matches!(result, Err(WarehouseError::ConfigError(_))));
    }
}
