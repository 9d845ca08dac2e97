//! Deployment script assembly
//!
//! Builds the single SQL script that installs an extension:
//! 1. create the registry table if needed
//! 2. drop the procedures registered by a previous install and forget it
//! 3. create every component procedure, in metadata order
//! 4. register the extension with its metadata and procedure list
//!
//! The destination dataset/schema is written as
//! [`WORKFLOWS_TEMP_PLACEHOLDER`] and replaced with
//! [`substitute_destination`] right before execution. Packaged scripts keep
//! the placeholder.

use crate::signature::{ProcedureSignature, SignatureError};
use extpack_core::{
    Extension, ExtensionLayout, LoadError, Provider, EXTENSIONS_TABLENAME,
    WORKFLOWS_TEMP_PLACEHOLDER,
};
use extpack_core::literal::quote_string;

/// Errors raised while assembling a deployment script
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Invalid procedure in component '{component}': {source}")]
    Signature {
        component: String,
        #[source]
        source: SignatureError,
    },

    #[error("Failed to serialize extension metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Read every component's procedure SQL and assemble the install script
pub fn build_script(extension: &Extension, layout: &ExtensionLayout) -> Result<String, AssembleError> {
    let procedures = extension
        .components
        .iter()
        .map(|c| layout.read_procedure(&c.name))
        .collect::<Result<Vec<_>, _>>()?;

    render_script(extension, &procedures)
}

/// Assemble the install script from procedure definitions given in
/// component order
pub fn render_script(extension: &Extension, procedures: &[String]) -> Result<String, AssembleError> {
    let registered = registered_procedures(extension, procedures)?;
    let metadata = quote_string(&extension.to_json()?);
    let name = quote_string(&extension.name);
    let registry = format!("{}.{}", WORKFLOWS_TEMP_PLACEHOLDER, EXTENSIONS_TABLENAME);

    let mut code = String::new();
    for sql in procedures {
        code.push('\n');
        code.push_str(sql);
    }

    let script = match extension.provider {
        Provider::BigQuery => bigquery_script(&registry, &name, &metadata, &code, &registered),
        Provider::Snowflake => snowflake_script(&registry, &name, &metadata, &code, &registered),
    };

    tracing::debug!(
        extension = %extension.name,
        provider = %extension.provider,
        procedures = procedures.len(),
        "Assembled deployment script"
    );

    Ok(script)
}

/// Procedure list stored in the registry row
///
/// BigQuery drops procedures by name, so bare names are joined with `,`.
/// Snowflake needs full signatures to drop an overloaded procedure, so each
/// `NAME(TYPE,...)` is read from that component's own definition and the
/// signatures are joined with `;`.
pub fn registered_procedures(extension: &Extension, procedures: &[String]) -> Result<String, AssembleError> {
    match extension.provider {
        Provider::BigQuery => Ok(extension
            .components
            .iter()
            .map(|c| c.procedure_name.as_str())
            .collect::<Vec<_>>()
            .join(",")),
        Provider::Snowflake => {
            let mut signatures = Vec::with_capacity(extension.components.len());
            for (component, sql) in extension.components.iter().zip(procedures) {
                let signature =
                    ProcedureSignature::parse(sql).map_err(|source| AssembleError::Signature {
                        component: component.name.clone(),
                        source,
                    })?;
                signatures.push(signature.render(&component.procedure_name));
            }
            Ok(signatures.join(";"))
        }
    }
}

/// Replace every destination placeholder in `sql`
pub fn substitute_destination(sql: &str, destination: &str) -> String {
    sql.replace(WORKFLOWS_TEMP_PLACEHOLDER, destination)
}

fn bigquery_script(registry: &str, name: &str, metadata: &str, code: &str, registered: &str) -> String {
    format!(
        r#"
DECLARE procedures ARRAY <STRING>;
DECLARE i INT64 DEFAULT 0;

CREATE TABLE IF NOT EXISTS {registry} (
    name STRING,
    metadata STRING,
    procedures STRING
);

-- remove procedures from previous installations

SET procedures = ARRAY(
    SELECT procedures
    FROM {registry}
    WHERE name = {name}
);
LOOP
    SET i = i + 1;
    IF i > ARRAY_LENGTH(procedures) THEN
        LEAVE;
    END IF;
    EXECUTE IMMEDIATE 'DROP PROCEDURE {placeholder}.' || procedures[ORDINAL(i)];
END LOOP;

DELETE FROM {registry}
WHERE name = {name};

-- create procedures
{code}

-- add to extensions table

INSERT INTO {registry} (name, metadata, procedures)
VALUES ({name}, {metadata}, {registered});
"#,
        placeholder = WORKFLOWS_TEMP_PLACEHOLDER,
        registered = quote_string(registered),
    )
}

fn snowflake_script(registry: &str, name: &str, metadata: &str, code: &str, registered: &str) -> String {
    format!(
        r#"
DECLARE
    procedures STRING;
BEGIN
    CREATE TABLE IF NOT EXISTS {registry} (
        name STRING,
        metadata STRING,
        procedures STRING
    );

    -- remove procedures from previous installations

    procedures := (
        SELECT procedures
        FROM {registry}
        WHERE name = {name}
    );

    BEGIN
        EXECUTE IMMEDIATE 'DROP PROCEDURE IF EXISTS {placeholder}.'
            || REPLACE(:procedures, ';', ';DROP PROCEDURE IF EXISTS {placeholder}.');
    EXCEPTION
        WHEN OTHER THEN
            NULL;
    END;

    DELETE FROM {registry}
    WHERE name = {name};

    -- create procedures
    {code}

    -- add to extensions table

    INSERT INTO {registry} (name, metadata, procedures)
    VALUES ({name}, {metadata}, {registered});
END;
"#,
        placeholder = WORKFLOWS_TEMP_PLACEHOLDER,
        registered = quote_string(registered),
    )
}
