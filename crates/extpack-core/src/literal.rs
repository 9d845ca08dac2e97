//! SQL literal rendering shared by both dialects

use serde_json::Value;

/// Single-quoted string literal with backslash escaping
///
/// Both BigQuery and Snowflake accept `\'` and `\\` inside quoted strings.
pub fn quote_string(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Render a JSON value as a SQL literal.
///
/// Nested arrays and objects become their JSON text as a string literal;
/// dialect-specific wrappers are applied by the adapters.
pub fn scalar_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_string(s),
        nested => quote_string(&nested.to_string()),
    }
}
