//! Warehouse rows and order-independent comparison

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One result row: column name to value, in column order
pub type Row = Map<String, Value>;

/// Output parameter name to the rows of its table
pub type OutputTables = BTreeMap<String, Vec<Row>>;

/// Serialize a value with object keys sorted at every level.
///
/// Two rows holding the same columns and values serialize identically
/// regardless of column order.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> =
                map.iter().map(|(k, v)| (k, canonical_json(v))).collect();
            let body: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        scalar => scalar.to_string(),
    }
}

fn canonical_row(row: &Row) -> String {
    canonical_json(&Value::Object(row.clone()))
}

/// Compare two row sets ignoring row order
pub fn rows_match(expected: &[Row], actual: &[Row]) -> bool {
    if expected.len() != actual.len() {
        return false;
    }

    let mut left: Vec<String> = expected.iter().map(canonical_row).collect();
    let mut right: Vec<String> = actual.iter().map(canonical_row).collect();
    left.sort();
    right.sort();
    left == right
}
