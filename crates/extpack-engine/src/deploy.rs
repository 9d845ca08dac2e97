//! Extension deployment
//!
//! Assembles the install script, points it at a destination and runs it as
//! a single statement through the warehouse adapter.

use extpack_core::{Extension, ExtensionLayout, Provider};
use extpack_sql::{build_script, substitute_destination, AssembleError};
use extpack_warehouse::{WarehouseAdapter, WarehouseError};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

/// Destination as it must appear in SQL for `provider`
///
/// BigQuery dataset paths contain a project id that may hold dashes, so
/// user-supplied destinations are wrapped in backticks.
pub fn format_destination(provider: Provider, destination: &str) -> String {
    match provider {
        Provider::BigQuery => format!("`{}`", destination.trim_matches('`')),
        Provider::Snowflake => destination.to_string(),
    }
}

/// Runs install scripts against one warehouse
pub struct Deployer<'a> {
    adapter: &'a dyn WarehouseAdapter,
}

impl<'a> Deployer<'a> {
    pub fn new(adapter: &'a dyn WarehouseAdapter) -> Self {
        Self { adapter }
    }

    /// Install `extension` into `destination`, replacing any previous install
    ///
    /// `destination` must already be formatted for the provider.
    pub async fn deploy(
        &self,
        extension: &Extension,
        layout: &ExtensionLayout,
        destination: &str,
    ) -> Result<(), DeployError> {
        tracing::info!(
            extension = %extension.name,
            warehouse = %extension.provider,
            destination,
            "Deploying extension"
        );

        let script = substitute_destination(&build_script(extension, layout)?, destination);
        tracing::debug!("{}", script);

        self.adapter.execute(&script).await?;

        tracing::info!(extension = %extension.name, "Extension deployed");
        Ok(())
    }
}
