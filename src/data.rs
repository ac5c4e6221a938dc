//! # Tabular Data Source
//!
//! The renderer only needs two things from row data: how many rows there are
//! and the text at `(row, column)`. That contract is the [`DataSource`] trait.
//!
//! [`Rows`] is the in-memory implementation used by the CLI and the server.
//! It loads from JSON, either a bare array of objects or an object with
//! explicit `headers` (which keeps column order stable):
//!
//! ```json
//! [{"Name": "Ada Lovelace", "Badge Number": "17"}]
//! {"headers": ["Name", "Badge Number"], "rows": [{"Name": "Ada", "Badge Number": "17"}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::BadgeError;

/// One entity's data: column name → text.
pub type Row = HashMap<String, String>;

/// Read contract consumed by the badge renderer.
pub trait DataSource {
    fn row_count(&self) -> usize;

    /// Text at `(row, column)`. Unknown columns yield an empty string.
    fn value_at(&self, row: usize, column: &str) -> &str;
}

/// A single ad-hoc row, e.g. values typed into a manual-entry form.
pub struct SingleRow<'a>(pub &'a Row);

impl DataSource for SingleRow<'_> {
    fn row_count(&self) -> usize {
        1
    }

    fn value_at(&self, _row: usize, column: &str) -> &str {
        self.0.get(column).map(String::as_str).unwrap_or("")
    }
}

/// A search hit: row index plus the row itself.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit<'a> {
    pub index: usize,
    pub row: &'a Row,
}

/// Ordered rows with their column headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rows {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    Table {
        #[serde(default)]
        headers: Vec<String>,
        rows: Vec<serde_json::Map<String, Value>>,
    },
    List(Vec<serde_json::Map<String, Value>>),
}

/// Stringify a JSON scalar the way a spreadsheet cell would read.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a row from a JSON object, stringifying scalar values.
pub fn row_from_object(raw: serde_json::Map<String, Value>) -> Row {
    raw.into_iter()
        .map(|(key, value)| {
            let text = cell_text(&value);
            (key, text)
        })
        .collect()
}

impl DataSource for Rows {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn value_at(&self, row: usize, column: &str) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl Rows {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Parse rows from JSON bytes (array of objects, or `{headers, rows}`).
    pub fn from_json(bytes: &[u8]) -> Result<Self, BadgeError> {
        let doc: RowsDocument = serde_json::from_slice(bytes)
            .map_err(|e| BadgeError::Data(format!("Invalid row data: {}", e)))?;

        let (mut headers, raw_rows) = match doc {
            RowsDocument::Table { headers, rows } => (headers, rows),
            RowsDocument::List(rows) => (Vec::new(), rows),
        };

        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            for key in raw.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
            rows.push(row_from_object(raw));
        }

        Ok(Self { headers, rows })
    }

    pub fn load(path: &Path) -> Result<Self, BadgeError> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    pub fn to_json(&self) -> Result<String, BadgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_loaded(&self) -> bool {
        !self.headers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Append a row. Missing headers are filled with empty strings; if no
    /// headers exist yet they are adopted from the row's keys.
    pub fn append(&mut self, mut row: Row) -> usize {
        if self.headers.is_empty() {
            let mut keys: Vec<String> = row.keys().cloned().collect();
            keys.sort();
            self.headers = keys;
        }
        for header in &self.headers {
            row.entry(header.clone()).or_default();
        }
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Merge `values` into an existing row.
    pub fn update(&mut self, index: usize, values: Row) -> Result<&Row, BadgeError> {
        let row = self
            .rows
            .get_mut(index)
            .ok_or_else(|| BadgeError::Data(format!("Row index {} out of range", index)))?;
        row.extend(values);
        Ok(row)
    }

    pub fn remove(&mut self, index: usize) -> Result<Row, BadgeError> {
        if index >= self.rows.len() {
            return Err(BadgeError::Data(format!("Row index {} out of range", index)));
        }
        Ok(self.rows.remove(index))
    }

    /// Rows where any value contains `query` (case-insensitive).
    pub fn search(&self, query: &str) -> Vec<SearchHit<'_>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.values().any(|v| v.to_lowercase().contains(&needle)))
            .map(|(index, row)| SearchHit { index, row })
            .collect()
    }

    /// One more than the largest integer found in `column` (1 if none).
    pub fn next_number(&self, column: &str) -> i64 {
        let max = self
            .rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter_map(|v| v.trim().parse::<i64>().ok())
            .fold(0, i64::max);
        max + 1
    }
}
