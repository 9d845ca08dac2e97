//! SQL generation for extension deployment
//!
//! This crate handles:
//! - Reading stored procedure signatures from their definitions
//! - Assembling the install script that registers an extension
//! - Substituting the deployment destination into generated SQL

pub mod signature;
pub mod assembler;

pub use signature::{ProcedureSignature, ProcedureParam, SignatureError};
pub use assembler::{build_script, render_script, registered_procedures, substitute_destination, AssembleError};
