//! Warehouse session context
//!
//! Holds the configuration and at most one connection per provider. A
//! connection is opened the first time an adapter for its provider is
//! requested and lives until the session is dropped.

use crate::adapter::{WarehouseAdapter, WarehouseError};
use crate::bigquery::BigQueryAdapter;
use crate::snowflake::SnowflakeAdapter;
use extpack_core::{Config, Provider};
use tokio::sync::OnceCell;

pub struct Session {
    config: Config,
    bigquery: OnceCell<Box<dyn WarehouseAdapter>>,
    snowflake: OnceCell<Box<dyn WarehouseAdapter>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            bigquery: OnceCell::new(),
            snowflake: OnceCell::new(),
        }
    }

    /// Install a ready-made adapter for its provider
    pub fn with_adapter(mut self, adapter: Box<dyn WarehouseAdapter>) -> Self {
        match adapter.provider() {
            Provider::BigQuery => self.bigquery = OnceCell::from(adapter),
            Provider::Snowflake => self.snowflake = OnceCell::from(adapter),
        }
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Default test destination for a provider
    pub fn workflows_temp(&self, provider: Provider) -> Result<String, WarehouseError> {
        self.config
            .workflows_temp(provider)
            .map_err(|e| WarehouseError::ConfigError(e.to_string()))
    }

    /// Adapter for `provider`, connecting on first use
    pub async fn adapter(&self, provider: Provider) -> Result<&dyn WarehouseAdapter, WarehouseError> {
        let cell = match provider {
            Provider::BigQuery => &self.bigquery,
            Provider::Snowflake => &self.snowflake,
        };

        let adapter = cell.get_or_try_init(|| connect(&self.config, provider)).await?;
        Ok(adapter.as_ref())
    }
}

async fn connect(config: &Config, provider: Provider) -> Result<Box<dyn WarehouseAdapter>, WarehouseError> {
    tracing::info!(%provider, "Connecting to warehouse");

    match provider {
        Provider::BigQuery => {
            let bq = config
                .bigquery()
                .map_err(|e| WarehouseError::ConfigError(e.to_string()))?;

            let adapter = match &bq.credentials_file {
                Some(path) => BigQueryAdapter::from_service_account_file(&bq.project, path).await?,
                None => BigQueryAdapter::with_adc(&bq.project).await?,
            };
            Ok(Box::new(adapter))
        }
        Provider::Snowflake => {
            let sf = config
                .snowflake()
                .map_err(|e| WarehouseError::ConfigError(e.to_string()))?;

            let mut builder = SnowflakeAdapter::builder()
                .with_password(&sf.account, &sf.user, &sf.password)
                .with_database(&sf.database)
                .with_schema(&sf.schema);
            if let Some(warehouse) = &sf.warehouse {
                builder = builder.with_warehouse(warehouse);
            }
            if let Some(role) = &sf.role {
                builder = builder.with_role(role);
            }
            Ok(Box::new(builder.build()?))
        }
    }
}
