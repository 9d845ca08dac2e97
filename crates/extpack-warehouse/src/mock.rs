//! Mock warehouse adapter for testing
//!
//! An in-memory stand-in for a warehouse. It is useful for:
//! - Unit testing the fixture engine without credentials
//! - Asserting on the exact SQL a command sends
//! - Simulating connection and table-load failures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use extpack_warehouse::{MockAdapter, WarehouseAdapter};
//!
//! let adapter = MockAdapter::new();
//! adapter
//!     .add_procedure("BUFFER", |call| Ok(vec![vec![row_from(call.arg_text(0))]]))
//!     .await;
//!
//! adapter.execute("CALL tmp.BUFFER('a', 't_out', false);").await?;
//! let rows = adapter.execute("SELECT * FROM t_out").await?;
//! ```
//!
//! ## Procedures
//!
//! `CALL` statements are routed to handlers registered by procedure name.
//! A handler returns one row set per output table; the mock stores them in
//! the tables named by the call's `._table_` arguments, in order.

use crate::adapter::{WarehouseAdapter, WarehouseError};
use extpack_core::{Provider, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A parsed `CALL` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Procedure name without its destination prefix
    pub procedure: String,

    /// Raw argument literals, in order
    pub args: Vec<String>,
}

impl MockCall {
    /// Parse `CALL dest.PROC(arg, ...)`
    pub fn parse(sql: &str) -> Option<Self> {
        let body = strip_prefix_ci(sql.trim(), "CALL ")?;
        let open = body.find('(')?;
        let close = body.rfind(')')?;
        if close < open {
            return None;
        }

        let qualified = body[..open].trim();
        let procedure = qualified.rsplit('.').next()?.trim().to_string();
        let args = split_args(&body[open + 1..close]);

        Some(Self { procedure, args })
    }

    /// Argument `index` with surrounding quotes and escapes removed
    pub fn arg_text(&self, index: usize) -> Option<String> {
        self.args.get(index).map(|a| unquote(a))
    }

    /// Output tables named by the call (`'<dest>._table_<hex>'` arguments)
    pub fn output_tables(&self) -> Vec<String> {
        self.args
            .iter()
            .filter(|a| a.starts_with('\'') && a.contains("._table_"))
            .map(|a| unquote(a))
            .collect()
    }
}

type ProcedureHandler = Arc<dyn Fn(&MockCall) -> Result<Vec<Vec<Row>>, WarehouseError> + Send + Sync>;

/// Mock warehouse adapter for testing
pub struct MockAdapter {
    /// Tables by the exact name used in SQL
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,

    /// Every statement passed to `execute`, in order
    statements: Arc<RwLock<Vec<String>>>,

    /// Procedure handlers by unqualified name
    procedures: Arc<RwLock<HashMap<String, ProcedureHandler>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulate failing table loads
    fail_loads: bool,

    provider: Provider,
}

impl MockAdapter {
    /// Create a new mock adapter with no tables or procedures
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            statements: Arc::new(RwLock::new(Vec::new())),
            procedures: Arc::new(RwLock::new(HashMap::new())),
            fail_connection: false,
            fail_loads: false,
            provider: Provider::BigQuery,
        }
    }

    /// Report a different provider from `provider()`
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Configure to fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure every `load_table` call to fail
    pub fn with_load_failure(mut self) -> Self {
        self.fail_loads = true;
        self
    }

    /// Register a procedure handler
    pub async fn add_procedure<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&MockCall) -> Result<Vec<Vec<Row>>, WarehouseError> + Send + Sync + 'static,
    {
        self.procedures
            .write()
            .await
            .insert(name.into(), Arc::new(handler));
    }

    /// Seed a table directly
    pub async fn add_table(&self, name: impl Into<String>, rows: Vec<Row>) {
        self.tables.write().await.insert(name.into(), rows);
    }

    /// Rows of a table, if it exists
    pub async fn table(&self, name: &str) -> Option<Vec<Row>> {
        self.tables.read().await.get(name).cloned()
    }

    /// Names of all tables currently held
    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// All statements executed so far
    pub async fn statements(&self) -> Vec<String> {
        self.statements.read().await.clone()
    }

    /// Executed statements starting with `prefix` (case-insensitive)
    pub async fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.statements
            .read()
            .await
            .iter()
            .filter(|s| strip_prefix_ci(s.trim(), prefix).is_some())
            .cloned()
            .collect()
    }

    async fn call(&self, call: MockCall) -> Result<(), WarehouseError> {
        let handler = self
            .procedures
            .read()
            .await
            .get(&call.procedure)
            .cloned()
            .ok_or_else(|| WarehouseError::QueryError(format!("Procedure {} not found", call.procedure)))?;

        let results = handler(&call)?;
        let outputs = call.output_tables();
        if results.len() != outputs.len() {
            return Err(WarehouseError::QueryError(format!(
                "Procedure {} produced {} tables for {} outputs",
                call.procedure,
                results.len(),
                outputs.len()
            )));
        }

        let mut tables = self.tables.write().await;
        for (name, rows) in outputs.into_iter().zip(results) {
            tables.insert(name, rows);
        }
        Ok(())
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WarehouseAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>, WarehouseError> {
        if self.fail_connection {
            return Err(WarehouseError::Connection {
                provider: self.provider,
                message: "Simulated connection failure".to_string(),
            });
        }

        self.statements.write().await.push(sql.to_string());
        let trimmed = sql.trim();

        if let Some(rest) = strip_prefix_ci(trimmed, "SELECT * FROM ") {
            let table = rest.trim().trim_end_matches(';').trim();
            return self
                .tables
                .read()
                .await
                .get(table)
                .cloned()
                .ok_or_else(|| WarehouseError::TableNotFound(table.to_string()));
        }

        if strip_prefix_ci(trimmed, "CALL ").is_some() {
            let call = MockCall::parse(trimmed)
                .ok_or_else(|| WarehouseError::QueryError(format!("Malformed CALL: {}", trimmed)))?;
            self.call(call).await?;
        }

        Ok(Vec::new())
    }

    async fn load_table(&self, rows: &[Row], table: &str) -> Result<(), WarehouseError> {
        if self.fail_loads {
            return Err(WarehouseError::LoadError {
                table: table.to_string(),
                message: "Simulated load failure".to_string(),
            });
        }

        self.tables
            .write()
            .await
            .insert(table.to_string(), rows.to_vec());
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), WarehouseError> {
        if self.fail_connection {
            return Err(WarehouseError::Connection {
                provider: self.provider,
                message: "Simulated connection failure".to_string(),
            });
        }
        Ok(())
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Split a CALL argument list on commas outside single-quoted strings
fn split_args(list: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in list.chars() {
        if in_string {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '\'' => {
                in_string = true;
                current.push(ch);
            }
            ',' => args.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(ch),
        }
    }

    let last = current.trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last.to_string());
    }
    args
}

fn unquote(literal: &str) -> String {
    let Some(inner) = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
    else {
        return literal.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_call_statements() {
        let call = MockCall::parse(
            "CALL `p.d`.BUFFER(\n  '`p.d`._test_buffer_points','a, b',10,null,'`p.d`._table_ab12',false\n);",
        )
        .unwrap();
        assert_eq!(call.procedure, "BUFFER");
        assert_eq!(call.args.len(), 6);
        assert_eq!(call.arg_text(1).as_deref(), Some("a, b"));
        assert_eq!(call.args[2], "10");
        assert_eq!(call.output_tables(), vec!["`p.d`._table_ab12"]);
    }

    #[test]
    fn unquote_handles_escapes() {
        assert_eq!(unquote(r"'it\'s'"), "it's");
        assert_eq!(unquote("10"), "10");
    }

    #[test]
    fn empty_argument_list() {
        let call = MockCall::parse("CALL x.P()").unwrap();
        assert!(call.args.is_empty());
    }

    #[tokio::test]
    async fn call_writes_output_tables() {
        let adapter = MockAdapter::new();
        adapter
            .add_procedure("ECHO", |call| {
                let value = call.arg_text(0).unwrap_or_default();
                Ok(vec![vec![json!({"v": value}).as_object().unwrap().clone()]])
            })
            .await;

        adapter
            .execute("CALL d.ECHO('hello', 'd._table_1', false);")
            .await
            .unwrap();

        let rows = adapter.execute("SELECT * FROM d._table_1").await.unwrap();
        assert_eq!(rows[0].get("v"), Some(&json!("hello")));
    }

    #[tokio::test]
    async fn unknown_procedure_fails() {
        let adapter = MockAdapter::new();
        let result = adapter.execute("CALL d.NOPE(false)").await;
        assert!(matches!(result, Err(WarehouseError::QueryError(_))));
    }

    #[tokio::test]
    async fn missing_table_fails() {
        let adapter = MockAdapter::new();
        let result = adapter.execute("SELECT * FROM d.nothing").await;
        assert!(matches!(result, Err(WarehouseError::TableNotFound(ref t)) if t == "d.nothing"));
    }
}
