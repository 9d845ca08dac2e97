//! Stored procedure signature extraction
//!
//! Procedure definitions are not parsed into an AST. The signature is taken
//! from the first parenthesised parameter list that follows
//! `CREATE OR REPLACE PROCEDURE`, which is all the registry and the checker
//! need.

use regex::Regex;
use std::sync::OnceLock;

/// Errors raised while reading a procedure signature
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("No CREATE OR REPLACE PROCEDURE statement found")]
    NoProcedure,

    #[error("Malformed procedure parameter '{0}'")]
    MalformedParameter(String),
}

/// One declared procedure parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureParam {
    /// Lower-cased parameter name
    pub name: String,

    /// Upper-cased SQL type
    pub data_type: String,
}

/// Name and parameter list of a `CREATE OR REPLACE PROCEDURE` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureSignature {
    /// Procedure name as written, including any qualifier
    pub name: String,

    pub params: Vec<ProcedureParam>,
}

fn signature_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)CREATE OR REPLACE PROCEDURE\s+([^\s(]+)\s*\(([^()]*)\)")
            .expect("Invalid procedure signature regex")
    })
}

impl ProcedureSignature {
    /// Extract the signature of the first procedure defined in `sql`
    pub fn parse(sql: &str) -> Result<Self, SignatureError> {
        let captures = signature_regex()
            .captures(sql)
            .ok_or(SignatureError::NoProcedure)?;

        let name = captures[1].to_string();
        let list = captures[2].trim();

        let params = if list.is_empty() {
            Vec::new()
        } else {
            list.split(',')
                .map(parse_param)
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self { name, params })
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn param_types(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.data_type.as_str()).collect()
    }

    /// `NAME(TYPE,TYPE)` form used by `DROP PROCEDURE` on Snowflake
    pub fn render(&self, procedure_name: &str) -> String {
        format!("{}({})", procedure_name, self.param_types().join(","))
    }
}

fn parse_param(raw: &str) -> Result<ProcedureParam, SignatureError> {
    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(name), Some(data_type)) => Ok(ProcedureParam {
            name: name.to_lowercase(),
            data_type: data_type.to_uppercase(),
        }),
        _ => Err(SignatureError::MalformedParameter(raw.trim().to_string())),
    }
}
