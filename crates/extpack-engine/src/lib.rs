//! extpack engine - Extension workflows
//!
//! This crate implements the operations behind each CLI action:
//! - Deploying an extension to a warehouse
//! - Running and capturing fixture-based procedure tests
//! - Statically checking procedures against metadata
//! - Packaging an extension for distribution

pub mod deploy;
pub mod fixture;
pub mod checker;
pub mod package;

pub use deploy::{Deployer, DeployError, format_destination};
pub use fixture::{FixtureEngine, FixtureError, ProcedureCall, RunMode, RunReport};
pub use checker::{check_component, check_extension, compatible_types, CheckError};
pub use package::{package, write_package, PackageError};
