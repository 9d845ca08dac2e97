//! BigQuery warehouse adapter
//!
//! Statements run as query jobs; the adapter polls `getQueryResults` until
//! the job reports completion and pages through any remaining rows.
//!
//! ## Authentication
//!
//! 1. Service account JSON file (`GOOGLE_APPLICATION_CREDENTIALS`)
//! 2. Application Default Credentials (ADC)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let adapter = BigQueryAdapter::with_adc("my-project").await?;
//! let rows = adapter.execute("SELECT 1 AS one").await?;
//! ```
//!
//! Table loads use `CREATE OR REPLACE TABLE ... AS SELECT * FROM UNNEST([...])`
//! so BigQuery infers column types from the literal values.

use crate::adapter::{column_names, WarehouseAdapter, WarehouseError};
use extpack_core::literal::{quote_string, scalar_literal};
use extpack_core::{Provider, Row};
use serde_json::Value;

#[cfg(feature = "bigquery")]
use gcp_bigquery_client::{
    model::get_query_results_parameters::GetQueryResultsParameters,
    model::query_request::QueryRequest, model::query_response::QueryResponse,
    Client as BigQueryClient,
};

/// BigQuery warehouse adapter
pub struct BigQueryAdapter {
    /// Project ID jobs are billed to
    project_id: String,

    /// BigQuery client (only available with bigquery feature)
    #[cfg(feature = "bigquery")]
    client: BigQueryClient,
}

impl BigQueryAdapter {
    /// Create a new BigQuery adapter using Application Default Credentials (ADC)
    ///
    /// ADC automatically detects credentials from:
    /// - GOOGLE_APPLICATION_CREDENTIALS environment variable
    /// - gcloud CLI default credentials
    /// - GCE/GKE metadata service
    #[cfg(feature = "bigquery")]
    pub async fn with_adc(project_id: impl Into<String>) -> Result<Self, WarehouseError> {
        let project_id = project_id.into();

        let client = BigQueryClient::from_application_default_credentials()
            .await
            .map_err(|e| WarehouseError::Connection {
                provider: Provider::BigQuery,
                message: format!(
                    "{}. Ensure GOOGLE_APPLICATION_CREDENTIALS is set or run \
                     'gcloud auth application-default login'",
                    e
                ),
            })?;

        Ok(Self { project_id, client })
    }

    /// Create adapter without bigquery feature (returns error)
    #[cfg(not(feature = "bigquery"))]
    pub async fn with_adc(project_id: impl Into<String>) -> Result<Self, WarehouseError> {
        let _ = project_id.into();
        Err(not_compiled())
    }

    /// Create a new BigQuery adapter using a service account key file
    #[cfg(feature = "bigquery")]
    pub async fn from_service_account_file(
        project_id: impl Into<String>,
        key_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, WarehouseError> {
        let project_id = project_id.into();
        let key_path_str = key_path.as_ref().to_string_lossy().to_string();

        let client = BigQueryClient::from_service_account_key_file(&key_path_str)
            .await
            .map_err(|e| WarehouseError::Connection {
                provider: Provider::BigQuery,
                message: format!("failed to read service account key file '{}': {}", key_path_str, e),
            })?;

        Ok(Self { project_id, client })
    }

    /// Create adapter without bigquery feature (returns error)
    #[cfg(not(feature = "bigquery"))]
    pub async fn from_service_account_file(
        project_id: impl Into<String>,
        _key_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, WarehouseError> {
        let _ = project_id.into();
        Err(not_compiled())
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Convert a REST cell value to a plain JSON value using its column type.
    ///
    /// The REST API returns every scalar as a string.
    pub fn normalize_value(field_type: &str, value: Value) -> Value {
        let Value::String(text) = &value else {
            return value;
        };

        match field_type.to_uppercase().as_str() {
            "INTEGER" | "INT64" => text.parse::<i64>().map(Value::from).unwrap_or(value),
            "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(value),
            "BOOLEAN" | "BOOL" => match text.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => value,
            },
            _ => value,
        }
    }

    /// BigQuery type for a column, taken from its first non-null value
    fn column_type(rows: &[Row], column: &str) -> &'static str {
        let first = rows
            .iter()
            .filter_map(|r| r.get(column))
            .find(|v| !v.is_null());

        match first {
            Some(Value::Bool(_)) => "BOOL",
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => "INT64",
            Some(Value::Number(_)) => "FLOAT64",
            Some(Value::Array(_)) | Some(Value::Object(_)) => "JSON",
            _ => "STRING",
        }
    }

    fn literal(value: &Value, column_type: &str) -> String {
        match value {
            Value::Null => format!("CAST(NULL AS {})", column_type),
            Value::Array(_) | Value::Object(_) => format!("JSON {}", quote_string(&value.to_string())),
            scalar => scalar_literal(scalar),
        }
    }

    /// Statement replacing `table` with the given rows
    pub fn load_table_sql(rows: &[Row], table: &str) -> Result<String, WarehouseError> {
        if rows.is_empty() {
            return Err(WarehouseError::LoadError {
                table: table.to_string(),
                message: "no rows to load".to_string(),
            });
        }

        let columns = column_names(rows);
        let types: Vec<&str> = columns.iter().map(|c| Self::column_type(rows, c)).collect();

        let structs: Vec<String> = rows
            .iter()
            .map(|row| {
                let fields: Vec<String> = columns
                    .iter()
                    .zip(&types)
                    .map(|(column, ty)| {
                        let value = row.get(column).unwrap_or(&Value::Null);
                        format!("{} AS `{}`", Self::literal(value, ty), column)
                    })
                    .collect();
                format!("STRUCT({})", fields.join(", "))
            })
            .collect();

        Ok(format!(
            "CREATE OR REPLACE TABLE {} AS\nSELECT * FROM UNNEST([\n    {}\n]);",
            table,
            structs.join(",\n    ")
        ))
    }

    #[cfg(feature = "bigquery")]
    fn rows_from_response(response: &QueryResponse) -> Vec<Row> {
        let fields = response
            .schema
            .as_ref()
            .and_then(|s| s.fields.clone())
            .unwrap_or_default();

        response
            .rows
            .iter()
            .flatten()
            .map(|table_row| {
                let cells = table_row.columns.as_deref().unwrap_or(&[]);
                fields
                    .iter()
                    .zip(cells)
                    .map(|(field, cell)| {
                        let field_type = format!("{:?}", field.r#type);
                        let value = cell.value.clone().unwrap_or(Value::Null);
                        (field.name.clone(), Self::normalize_value(&field_type, value))
                    })
                    .collect()
            })
            .collect()
    }

    #[cfg(feature = "bigquery")]
    async fn fetch_page(
        &self,
        job_id: &str,
        location: Option<String>,
        page_token: Option<String>,
    ) -> Result<QueryResponse, WarehouseError> {
        let params = GetQueryResultsParameters {
            location,
            page_token,
            ..Default::default()
        };

        self.client
            .job()
            .get_query_results(&self.project_id, job_id, params)
            .await
            .map(QueryResponse::from)
            .map_err(|e| WarehouseError::QueryError(e.to_string()))
    }
}

#[cfg(not(feature = "bigquery"))]
fn not_compiled() -> WarehouseError {
    WarehouseError::ConfigError(
        "BigQuery support not compiled. Rebuild with: cargo build --features bigquery".to_string(),
    )
}

#[async_trait::async_trait]
impl WarehouseAdapter for BigQueryAdapter {
    fn name(&self) -> &'static str {
        "BigQuery"
    }

    fn provider(&self) -> Provider {
        Provider::BigQuery
    }

    #[cfg(feature = "bigquery")]
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, WarehouseError> {
        tracing::debug!(project = %self.project_id, "Submitting BigQuery job");

        let mut response = self
            .client
            .job()
            .query(&self.project_id, QueryRequest::new(sql.to_string()))
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("Not found") {
                    WarehouseError::TableNotFound(err_str)
                } else {
                    WarehouseError::QueryError(err_str)
                }
            })?;

        let job_reference = response.job_reference.clone();
        let job_id = job_reference.as_ref().and_then(|r| r.job_id.clone());
        let location = job_reference.as_ref().and_then(|r| r.location.clone());

        while !response.job_complete.unwrap_or(true) {
            let job_id = job_id.as_deref().ok_or_else(|| {
                WarehouseError::InvalidResponse("incomplete job without a job reference".to_string())
            })?;
            tracing::debug!(job_id, "Waiting for BigQuery job");
            response = self.fetch_page(job_id, location.clone(), None).await?;
        }

        let mut rows = Self::rows_from_response(&response);
        let mut page_token = response.page_token.clone();
        while let (Some(token), Some(job_id)) = (page_token.take(), job_id.as_deref()) {
            let page = self.fetch_page(job_id, location.clone(), Some(token)).await?;
            rows.extend(Self::rows_from_response(&page));
            page_token = page.page_token;
        }

        Ok(rows)
    }

    #[cfg(not(feature = "bigquery"))]
    async fn execute(&self, _sql: &str) -> Result<Vec<Row>, WarehouseError> {
        Err(not_compiled())
    }

    async fn load_table(&self, rows: &[Row], table: &str) -> Result<(), WarehouseError> {
        let sql = Self::load_table_sql(rows, table)?;
        self.execute(&sql).await.map_err(|e| WarehouseError::LoadError {
            table: table.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn normalizes_rest_strings_by_type() {
        assert_eq!(BigQueryAdapter::normalize_value("Int64", json!("42")), json!(42));
        assert_eq!(BigQueryAdapter::normalize_value("INTEGER", json!("-1")), json!(-1));
        assert_eq!(BigQueryAdapter::normalize_value("Float64", json!("1.5")), json!(1.5));
        assert_eq!(BigQueryAdapter::normalize_value("Bool", json!("true")), json!(true));
        assert_eq!(BigQueryAdapter::normalize_value("String", json!("42")), json!("42"));
        assert_eq!(BigQueryAdapter::normalize_value("Int64", Value::Null), Value::Null);
    }

    #[test]
    fn load_sql_infers_types_from_literals() {
        let data = rows(json!([
            {"id": 1, "name": "a", "score": null},
            {"id": 2, "name": "it's", "score": 0.5},
        ]));
        let sql = BigQueryAdapter::load_table_sql(&data, "`p.d`._test_buffer_points").unwrap();

        assert_eq!(
            sql,
            "CREATE OR REPLACE TABLE `p.d`._test_buffer_points AS\n\
             SELECT * FROM UNNEST([\n    \
             STRUCT(1 AS `id`, 'a' AS `name`, CAST(NULL AS FLOAT64) AS `score`),\n    \
             STRUCT(2 AS `id`, 'it\\'s' AS `name`, 0.5 AS `score`)\n]);"
        );
    }

    #[test]
    fn load_sql_fills_missing_columns_with_nulls() {
        let data = rows(json!([{"a": true}, {"b": {"k": 1}}]));
        let sql = BigQueryAdapter::load_table_sql(&data, "t").unwrap();
        assert!(sql.contains("STRUCT(TRUE AS `a`, CAST(NULL AS JSON) AS `b`)"));
        assert!(sql.contains(r#"STRUCT(CAST(NULL AS BOOL) AS `a`, JSON '{"k":1}' AS `b`)"#));
    }

    #[test]
    fn empty_load_is_rejected() {
        let err = BigQueryAdapter::load_table_sql(&[], "t").unwrap_err();
        assert!(matches!(err, WarehouseError::LoadError { .. }));
    }

    #[tokio::test]
    #[cfg(not(feature = "bigquery"))]
    async fn adapter_requires_feature() {
        let result = BigQueryAdapter::with_adc("my-project").await;
        assert!(matches!(result, Err(WarehouseError::ConfigError(_))));
    }
}
