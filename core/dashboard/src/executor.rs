//! FILENAME: core/dashboard/src/executor.rs
//! Query executor boundary: SQL in, column names and rows out.

use metrics_engine::{CellValue, Dataset};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Failure reported by the executor (network, SQL error, timeout, ...).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ExecutorError {
    pub message: String,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        ExecutorError {
            message: message.into(),
        }
    }
}

// ============================================================================
// QUERY RESULT
// ============================================================================

/// A result set as returned by the executor.
///
/// Deserializes from the usual response shapes: columns given as plain names
/// or as `{"name": ...}` objects, rows under either `rows` or `data`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub columns: Vec<String>,
    #[serde(default, alias = "data", deserialize_with = "deserialize_rows")]
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnSpec {
    Name(String),
    Described { name: String },
}

fn deserialize_columns<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let specs: Option<Vec<ColumnSpec>> = Option::deserialize(deserializer)?;
    Ok(specs
        .unwrap_or_default()
        .into_iter()
        .map(|spec| match spec {
            ColumnSpec::Name(name) => name,
            ColumnSpec::Described { name } => name,
        })
        .collect())
}

fn deserialize_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<CellValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        QueryResult { columns, rows }
    }

    /// A result without columns carries nothing to display.
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Classifies the columns and lays the rows out against them.
    pub fn into_dataset(self) -> Dataset {
        Dataset::from_result(self.columns, self.rows)
    }
}

// ============================================================================
// EXECUTOR INTERFACE
// ============================================================================

/// Runs SQL against a named database.
pub trait QueryExecutor {
    fn execute(&mut self, sql: &str, database: &str) -> Result<QueryResult, ExecutorError>;
}

impl<F> QueryExecutor for F
where
    F: FnMut(&str, &str) -> Result<QueryResult, ExecutorError>,
{
    fn execute(&mut self, sql: &str, database: &str) -> Result<QueryResult, ExecutorError> {
        self(sql, database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_named_columns_and_data_rows() {
        let json = r#"{
            "columns": [{"name": "manager__dim"}, "score__metric__pct"],
            "data": [["A", 2.5], ["B", null]]
        }"#;
        let result: QueryResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.columns, vec!["manager__dim", "score__metric__pct"]);
        assert_eq!(result.rows[0], vec![CellValue::from("A"), CellValue::Number(2.5)]);
        assert_eq!(result.rows[1][1], CellValue::Null);
    }

    #[test]
    fn test_missing_columns_means_no_data() {
        let result: QueryResult = serde_json::from_str(r#"{"columns": null, "rows": null}"#).unwrap();
        assert!(!result.has_columns());
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_into_dataset_classifies_columns() {
        let result = QueryResult::new(
            vec!["team__dim".to_string(), "headcount__count__sum".to_string()],
            vec![vec!["X".into(), 4.into()]],
        );
        let dataset = result.into_dataset();
        assert_eq!(dataset.schema.dimension_count(), 1);
        assert_eq!(dataset.schema.default_count_column(), None);
        assert_eq!(dataset.rows.len(), 1);
    }

    #[test]
    fn test_closures_are_executors() {
        let mut calls = Vec::new();
        let mut executor = |sql: &str, db: &str| {
            calls.push(format!("{}@{}", sql, db));
            Ok::<_, ExecutorError>(QueryResult::default())
        };
        executor.execute("SELECT 1", "trino").unwrap();
        drop(executor);
        assert_eq!(calls, vec!["SELECT 1@trino"]);
    }
}
