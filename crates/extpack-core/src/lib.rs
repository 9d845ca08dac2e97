//! extpack core
//!
//! Domain model shared by every extpack crate: extension metadata,
//! test cases, warehouse rows, SQL literals and environment configuration.

pub mod metadata;
pub mod literal;
pub mod row;
pub mod loader;
pub mod config;

pub use metadata::{Extension, Component, Parameter, ParamType, Provider, TestCase};
pub use row::{Row, OutputTables, canonical_json, rows_match};
pub use loader::{ExtensionLayout, LoadError};
pub use config::{Config, BigQueryConfig, SnowflakeConfig, ConfigError};

/// Token standing in for the destination dataset/schema in procedure SQL
pub const WORKFLOWS_TEMP_PLACEHOLDER: &str = "@@workflows_temp@@";

/// Registry table tracking installed extensions
pub const EXTENSIONS_TABLENAME: &str = "WORKFLOWS_EXTENSIONS";
