//! Static consistency checks between metadata and procedure definitions
//!
//! Verifies, for every component, that its procedure is defined under the
//! destination placeholder with the declared name, and that the parameter
//! list matches the metadata: same names in the same order (inputs, outputs,
//! then `dry_run`) and SQL types compatible with each logical type.

use extpack_core::{Component, Extension, ExtensionLayout, LoadError, ParamType, Provider, WORKFLOWS_TEMP_PLACEHOLDER};
use extpack_sql::{ProcedureSignature, SignatureError};

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Procedure '@@workflows_temp@@.{procedure}' not found in component '{component}'")]
    ProcedureNotFound { procedure: String, component: String },

    #[error("Invalid signature of procedure '@@workflows_temp@@.{procedure}' in component '{component}': {source}")]
    Signature {
        procedure: String,
        component: String,
        #[source]
        source: SignatureError,
    },

    #[error("Parameters in procedure '@@workflows_temp@@.{procedure}' do not match with metadata in component '{component}'")]
    ParameterNames {
        procedure: String,
        component: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Parameter types in procedure '@@workflows_temp@@.{procedure}' do not match with metadata in component '{component}'")]
    ParameterType {
        procedure: String,
        component: String,
        parameter: String,
        found: String,
    },

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// SQL types accepted for a logical parameter type
pub fn compatible_types(provider: Provider, param_type: ParamType) -> &'static [&'static str] {
    match (provider, param_type) {
        (Provider::BigQuery, ParamType::Number) => &["INT64", "FLOAT64"],
        (Provider::BigQuery, ParamType::Boolean) => &["BOOL", "BOOLEAN"],
        (Provider::BigQuery, _) => &["STRING"],
        (Provider::Snowflake, ParamType::Number) => &["INTEGER", "FLOAT"],
        (Provider::Snowflake, ParamType::Boolean) => &["BOOL", "BOOLEAN"],
        (Provider::Snowflake, _) => &["STRING", "VARCHAR"],
    }
}

/// Check one component against its procedure definition
pub fn check_component(provider: Provider, component: &Component, sql: &str) -> Result<(), CheckError> {
    let procedure = component.procedure_name.clone();

    let declaration = format!(
        "CREATE OR REPLACE PROCEDURE {}.{}",
        WORKFLOWS_TEMP_PLACEHOLDER, component.procedure_name
    );
    if !sql.contains(&declaration) {
        return Err(CheckError::ProcedureNotFound {
            procedure,
            component: component.name.clone(),
        });
    }

    let signature = ProcedureSignature::parse(sql).map_err(|source| CheckError::Signature {
        procedure: procedure.clone(),
        component: component.name.clone(),
        source,
    })?;

    let expected: Vec<String> = component
        .procedure_parameter_names()
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    let found: Vec<String> = signature.param_names().into_iter().map(str::to_string).collect();
    if expected != found {
        return Err(CheckError::ParameterNames {
            procedure,
            component: component.name.clone(),
            expected,
            found,
        });
    }

    for (param, logical) in signature.params.iter().zip(component.procedure_parameter_types()) {
        if !compatible_types(provider, logical).contains(&param.data_type.as_str()) {
            return Err(CheckError::ParameterType {
                procedure,
                component: component.name.clone(),
                parameter: param.name.clone(),
                found: param.data_type.clone(),
            });
        }
    }

    Ok(())
}

/// Check every component, stopping at the first problem
pub fn check_extension(extension: &Extension, layout: &ExtensionLayout) -> Result<(), CheckError> {
    for component in &extension.components {
        let sql = layout.read_procedure(&component.name)?;
        check_component(extension.provider, component, &sql)?;
        tracing::debug!(component = %component.name, "Component checked");
    }
    Ok(())
}
