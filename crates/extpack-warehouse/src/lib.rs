//! Warehouse adapters for deploying and exercising extensions
//!
//! This crate hides the differences between BigQuery and Snowflake behind
//! the [`WarehouseAdapter`] trait: executing SQL, loading tables from rows,
//! and reading rows back as plain JSON values.
//!
//! ## Features
//!
//! Enable warehouse support via Cargo features:
//! - `bigquery` - Google BigQuery support
//! - `snowflake` - Snowflake support
//! - `all-warehouses` - All warehouse adapters
//!
//! ## Example
//!
//! ```rust,ignore
//! use extpack_warehouse::{Session, WarehouseAdapter};
//!
//! let session = Session::new(Config::from_env());
//! let adapter = session.adapter(Provider::BigQuery).await?;
//! let rows = adapter.execute("SELECT 1 AS one").await?;
//! ```

pub mod adapter;
pub mod bigquery;
pub mod snowflake;
pub mod mock;
pub mod session;

pub use adapter::{WarehouseAdapter, WarehouseError};
pub use bigquery::BigQueryAdapter;
pub use snowflake::{SnowflakeAdapter, SnowflakeAdapterBuilder};
pub use mock::{MockAdapter, MockCall};
pub use session::Session;
