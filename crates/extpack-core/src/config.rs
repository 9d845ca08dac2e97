//! Warehouse configuration from environment variables
//!
//! Values are read once at startup (after `.env` has been loaded by the CLI).
//! Each provider section is optional; it is only required when that
//! provider is actually used.

use crate::metadata::Provider;

/// BigQuery settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigQueryConfig {
    /// Project holding the test dataset
    pub project: String,

    /// Dataset used as the default destination
    pub dataset: String,

    /// Optional service account key file (ADC is used otherwise)
    pub credentials_file: Option<String>,
}

impl BigQueryConfig {
    /// Default destination, quoted for BigQuery SQL
    pub fn workflows_temp(&self) -> String {
        format!("`{}.{}`", self.project, self.dataset)
    }
}

/// Snowflake settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnowflakeConfig {
    pub account: String,
    pub user: String,
    pub password: String,

    /// Database holding the test schema
    pub database: String,

    /// Schema used as the default destination
    pub schema: String,

    pub warehouse: Option<String>,
    pub role: Option<String>,
}

impl SnowflakeConfig {
    /// Default destination as `DATABASE.SCHEMA`
    pub fn workflows_temp(&self) -> String {
        format!("{}.{}", self.database, self.schema)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub bigquery: Option<BigQueryConfig>,
    pub snowflake: Option<SnowflakeConfig>,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let bigquery = match (get("BQ_TEST_PROJECT"), get("BQ_TEST_DATASET")) {
            (Some(project), Some(dataset)) => Some(BigQueryConfig {
                project,
                dataset,
                credentials_file: get("GOOGLE_APPLICATION_CREDENTIALS"),
            }),
            _ => None,
        };

        let snowflake = match (
            get("SF_ACCOUNT"),
            get("SF_USER"),
            get("SF_PASSWORD"),
            get("SF_TEST_DATABASE"),
            get("SF_TEST_SCHEMA"),
        ) {
            (Some(account), Some(user), Some(password), Some(database), Some(schema)) => {
                Some(SnowflakeConfig {
                    account,
                    user,
                    password,
                    database,
                    schema,
                    warehouse: get("SF_WAREHOUSE"),
                    role: get("SF_ROLE"),
                })
            }
            _ => None,
        };

        Self { bigquery, snowflake }
    }

    pub fn bigquery(&self) -> Result<&BigQueryConfig, ConfigError> {
        self.bigquery
            .as_ref()
            .ok_or(ConfigError::MissingVar(Provider::BigQuery, "BQ_TEST_PROJECT, BQ_TEST_DATASET"))
    }

    pub fn snowflake(&self) -> Result<&SnowflakeConfig, ConfigError> {
        self.snowflake.as_ref().ok_or(ConfigError::MissingVar(
            Provider::Snowflake,
            "SF_ACCOUNT, SF_USER, SF_PASSWORD, SF_TEST_DATABASE, SF_TEST_SCHEMA",
        ))
    }

    /// Default test destination for a provider
    pub fn workflows_temp(&self, provider: Provider) -> Result<String, ConfigError> {
        match provider {
            Provider::BigQuery => Ok(self.bigquery()?.workflows_temp()),
            Provider::Snowflake => Ok(self.snowflake()?.workflows_temp()),
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not configured: set {1}")]
    MissingVar(Provider, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_has_no_providers() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert!(matches!(
            config.workflows_temp(Provider::BigQuery),
            Err(ConfigError::MissingVar(Provider::BigQuery, _))
        ));
    }

    #[test]
    fn bigquery_destination_is_backquoted() {
        let config = Config::from_lookup(lookup(&[
            ("BQ_TEST_PROJECT", "my-project"),
            ("BQ_TEST_DATASET", "tmp"),
        ]));
        assert_eq!(config.workflows_temp(Provider::BigQuery).unwrap(), "`my-project.tmp`");
        assert_eq!(config.bigquery().unwrap().credentials_file, None);
    }

    #[test]
    fn snowflake_requires_all_connection_vars() {
        let partial = Config::from_lookup(lookup(&[
            ("SF_ACCOUNT", "xy123"),
            ("SF_USER", "me"),
            ("SF_TEST_DATABASE", "DB"),
            ("SF_TEST_SCHEMA", "TMP"),
        ]));
        assert!(partial.snowflake.is_none());

        let full = Config::from_lookup(lookup(&[
            ("SF_ACCOUNT", "xy123"),
            ("SF_USER", "me"),
            ("SF_PASSWORD", "secret"),
            ("SF_TEST_DATABASE", "DB"),
            ("SF_TEST_SCHEMA", "TMP"),
            ("SF_ROLE", "DEV"),
        ]));
        let sf = full.snowflake().unwrap();
        assert_eq!(sf.workflows_temp(), "DB.TMP");
        assert_eq!(sf.role.as_deref(), Some("DEV"));
        assert_eq!(sf.warehouse, None);
    }

    #[test]
    fn empty_values_count_as_missing() {
        let config = Config::from_lookup(lookup(&[
            ("BQ_TEST_PROJECT", ""),
            ("BQ_TEST_DATASET", "tmp"),
        ]));
        assert!(config.bigquery.is_none());
    }
}
