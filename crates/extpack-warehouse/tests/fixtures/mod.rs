//! Test fixtures for warehouse adapter integration tests
//!
//! Reusable row sets shaped like the input tables extension tests upload.

use extpack_core::Row;
use serde_json::{json, Value};

fn rows(value: Value) -> Vec<Row> {
    value
        .as_array()
        .expect("fixture must be an array")
        .iter()
        .map(|v| v.as_object().expect("fixture rows must be objects").clone())
        .collect()
}

/// A small points table
///
/// One integer key, a string label and a float coordinate per row.
pub fn points_rows() -> Vec<Row> {
    rows(json!([
        {"id": 1, "label": "a", "x": 0.5},
        {"id": 2, "label": "b", "x": 1.25},
        {"id": 3, "label": "c", "x": -3.0},
    ]))
}

/// Rows exercising every JSON value kind
pub fn mixed_rows() -> Vec<Row> {
    rows(json!([
        {"flag": true, "count": 10, "ratio": 0.1, "name": "o'hara", "tags": ["x"], "missing": null},
        {"flag": false, "count": 0, "ratio": 1.0, "name": "", "tags": [], "missing": null},
    ]))
}

/// A single row
pub fn single_row() -> Vec<Row> {
    rows(json!([{"id": 42}]))
}
