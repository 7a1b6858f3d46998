//! FILENAME: core/metrics-engine/src/schema.rs
//! Column Classifier - semantic schema inferred from column names.
//!
//! The SQL author encodes the role of every result column in its name:
//!
//! ```text
//! <name>__<kind>__<agg1>[-<agg2>...]
//!
//! manager__dim                        dimension
//! avg_score__metric__sum-avg-max      colour-coded metric, SUM by default
//! salary__metricbignumber__sum        big number metric
//! ranking__metricrank__max            rank metric
//! employee_count__count__sum          count metric (PCT weight)
//! notes                               plain text
//! ```
//!
//! Names are parsed exactly once per result set into `ColumnDescriptor`s;
//! every later stage works on the typed descriptors.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::value::CellValue;

/// Separator between the name, kind and aggregation segments.
pub const COLUMN_DELIMITER: &str = "__";

/// Separator between aggregation codes in the third segment.
pub const AGGREGATION_SEPARATOR: char = '-';

/// Clean-name fragment identifying the default PCT weight column.
pub const DEFAULT_COUNT_FRAGMENT: &str = "employee_count";

// ============================================================================
// AGGREGATION
// ============================================================================

/// Reduction applied to a metric when dimensions are collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AggregationKind {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    /// Weighted average, weighted by the designated count metric.
    Pct,
    /// Unrecognised code. Reduces like `Avg`.
    Other(String),
}

impl AggregationKind {
    pub fn parse(code: &str) -> Self {
        match code.to_uppercase().as_str() {
            "SUM" => AggregationKind::Sum,
            "AVG" => AggregationKind::Avg,
            "COUNT" => AggregationKind::Count,
            "MIN" => AggregationKind::Min,
            "MAX" => AggregationKind::Max,
            "PCT" => AggregationKind::Pct,
            other => AggregationKind::Other(other.to_string()),
        }
    }

    /// Upper-case code as shown to the user.
    pub fn code(&self) -> &str {
        match self {
            AggregationKind::Sum => "SUM",
            AggregationKind::Avg => "AVG",
            AggregationKind::Count => "COUNT",
            AggregationKind::Min => "MIN",
            AggregationKind::Max => "MAX",
            AggregationKind::Pct => "PCT",
            AggregationKind::Other(code) => code,
        }
    }
}

impl Default for AggregationKind {
    fn default() -> Self {
        AggregationKind::Avg
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for AggregationKind {
    fn from(code: String) -> Self {
        AggregationKind::parse(&code)
    }
}

impl From<AggregationKind> for String {
    fn from(kind: AggregationKind) -> Self {
        kind.code().to_string()
    }
}

static DEFAULT_AGGREGATION: AggregationKind = AggregationKind::Avg;

// ============================================================================
// COLUMN DESCRIPTOR
// ============================================================================

/// Semantic role encoded in the second name segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// `dim`: grouping/label column.
    Dimension,
    /// `metric`: colour-coded metric.
    Metric,
    /// `metricbignumber`: metric rendered as a big number with a gradient.
    BigNumber,
    /// `metricrank`: rank metric, no colour coding.
    Rank,
    /// `count`: count metric, no colour coding.
    Count,
    /// Missing or unknown tag. Never aggregated, range-filtered or sorted.
    Text,
}

impl ColumnKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "dim" => ColumnKind::Dimension,
            "metric" => ColumnKind::Metric,
            "metricbignumber" => ColumnKind::BigNumber,
            "metricrank" => ColumnKind::Rank,
            "count" => ColumnKind::Count,
            _ => ColumnKind::Text,
        }
    }
}

/// Typed description of one result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// The fully encoded column name, as returned by the query.
    pub full_name: String,
    /// First name segment.
    pub clean_name: String,
    /// `clean_name` with underscores shown as spaces.
    pub display_name: String,
    /// Raw second segment, or `"text"` when absent.
    pub type_tag: String,
    pub kind: ColumnKind,
    /// Available aggregations, upper-cased. The first one is the primary.
    aggregations: SmallVec<[AggregationKind; 4]>,
}

impl ColumnDescriptor {
    pub fn is_dimension(&self) -> bool {
        self.kind == ColumnKind::Dimension
    }

    pub fn is_metric(&self) -> bool {
        matches!(
            self.kind,
            ColumnKind::Metric | ColumnKind::BigNumber | ColumnKind::Rank | ColumnKind::Count
        )
    }

    pub fn has_color_coding(&self) -> bool {
        matches!(self.kind, ColumnKind::Metric | ColumnKind::BigNumber)
    }

    pub fn is_big_number(&self) -> bool {
        self.kind == ColumnKind::BigNumber
    }

    pub fn is_rank(&self) -> bool {
        self.kind == ColumnKind::Rank
    }

    /// The primary (default) aggregation.
    pub fn aggregation_type(&self) -> &AggregationKind {
        self.aggregations.first().unwrap_or(&DEFAULT_AGGREGATION)
    }

    pub fn available_aggregations(&self) -> &[AggregationKind] {
        &self.aggregations
    }

    pub fn supports_aggregation(&self, kind: &AggregationKind) -> bool {
        self.aggregations.contains(kind)
    }
}

/// Parses a column name into its descriptor. Pure and total: malformed
/// segments degrade to `text` / `AVG`.
pub fn classify_column(name: &str) -> ColumnDescriptor {
    let mut segments = name.split(COLUMN_DELIMITER);
    let clean_name = segments.next().unwrap_or_default();
    let type_segment = segments.next().filter(|s| !s.is_empty());
    let aggregation_segment = segments.next().filter(|s| !s.is_empty());

    let mut aggregations: SmallVec<[AggregationKind; 4]> = aggregation_segment
        .map(|spec| {
            spec.split(AGGREGATION_SEPARATOR)
                .filter(|code| !code.is_empty())
                .map(AggregationKind::parse)
                .collect()
        })
        .unwrap_or_default();
    if aggregations.is_empty() {
        aggregations = smallvec![AggregationKind::Avg];
    }

    let type_tag = type_segment.unwrap_or("text");

    ColumnDescriptor {
        full_name: name.to_string(),
        clean_name: clean_name.to_string(),
        display_name: clean_name.replace('_', " "),
        type_tag: type_tag.to_string(),
        kind: ColumnKind::from_tag(type_tag),
        aggregations,
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Column descriptors of one result set, in result order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<ColumnDescriptor>,
    positions: FxHashMap<String, usize>,
}

impl Schema {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns: Vec<ColumnDescriptor> =
            names.into_iter().map(|n| classify_column(n.as_ref())).collect();

        let mut positions = FxHashMap::default();
        for (idx, column) in columns.iter().enumerate() {
            // Duplicate names resolve to their first occurrence.
            positions.entry(column.full_name.clone()).or_insert(idx);
        }

        Schema { columns, positions }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.position(name).map(|idx| &self.columns[idx])
    }

    pub fn column_at(&self, idx: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(idx)
    }

    /// Dimension columns with their positions.
    pub fn dimensions(&self) -> impl Iterator<Item = (usize, &ColumnDescriptor)> + '_ {
        self.columns.iter().enumerate().filter(|(_, c)| c.is_dimension())
    }

    /// Metric columns with their positions.
    pub fn metrics(&self) -> impl Iterator<Item = (usize, &ColumnDescriptor)> + '_ {
        self.columns.iter().enumerate().filter(|(_, c)| c.is_metric())
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions().count()
    }

    /// Position of a named metric column, if the name is a metric.
    pub fn metric_position(&self, name: &str) -> Option<usize> {
        self.position(name).filter(|&idx| self.columns[idx].is_metric())
    }

    /// Position of a named dimension column, if the name is a dimension.
    pub fn dimension_position(&self, name: &str) -> Option<usize> {
        self.position(name).filter(|&idx| self.columns[idx].is_dimension())
    }

    /// The conventional PCT weight column: a `count` metric with primary
    /// aggregation SUM whose name contains `employee_count`.
    pub fn default_count_column(&self) -> Option<usize> {
        self.columns.iter().position(|c| {
            c.kind == ColumnKind::Count
                && *c.aggregation_type() == AggregationKind::Sum
                && c.clean_name.contains(DEFAULT_COUNT_FRAGMENT)
        })
    }

    /// Resolves the PCT weight column. An explicitly designated metric wins;
    /// an unknown or non-metric designation falls back to the convention.
    pub fn resolve_count_column(&self, designated: Option<&str>) -> Option<usize> {
        match designated.and_then(|name| self.metric_position(name)) {
            Some(idx) => Some(idx),
            None => {
                if let Some(name) = designated {
                    log::debug!("designated count column '{}' is not a metric, using default", name);
                }
                self.default_count_column()
            }
        }
    }
}

// ============================================================================
// ROWS
// ============================================================================

static NULL_CELL: CellValue = CellValue::Null;

/// One result row, values indexed by column position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<CellValue>,
}

impl Row {
    pub fn new(values: Vec<CellValue>) -> Self {
        Row { values }
    }

    /// Value at a column position; missing positions read as null.
    pub fn get(&self, idx: usize) -> &CellValue {
        self.values.get(idx).unwrap_or(&NULL_CELL)
    }
}

/// A classified result set: the schema plus its rows.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Projects positional executor output into rows of the schema's width.
    /// Short rows are padded with nulls, long rows truncated.
    pub fn from_result(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let schema = Schema::from_names(&columns);
        let width = schema.len();
        let rows = rows
            .into_iter()
            .map(|mut values| {
                values.resize(width, CellValue::Null);
                Row::new(values)
            })
            .collect();
        Dataset { schema, rows }
    }

    /// Value of a named column in a row of this dataset.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> &'a CellValue {
        match self.schema.position(column) {
            Some(idx) => row.get(idx),
            None => &NULL_CELL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_full_convention() {
        let col = classify_column("avg_score__metric__sum-avg-max");
        assert_eq!(col.clean_name, "avg_score");
        assert_eq!(col.display_name, "avg score");
        assert_eq!(col.kind, ColumnKind::Metric);
        assert!(col.is_metric());
        assert!(col.has_color_coding());
        assert!(!col.is_dimension());
        assert_eq!(*col.aggregation_type(), AggregationKind::Sum);
        assert_eq!(
            col.available_aggregations(),
            &[AggregationKind::Sum, AggregationKind::Avg, AggregationKind::Max]
        );
    }

    #[test]
    fn test_classify_edge_cases() {
        let plain = classify_column("x");
        assert_eq!(plain.kind, ColumnKind::Text);
        assert_eq!(plain.type_tag, "text");
        assert!(!plain.is_dimension() && !plain.is_metric());
        assert_eq!(*plain.aggregation_type(), AggregationKind::Avg);

        let trailing = classify_column("x__");
        assert_eq!(trailing.kind, ColumnKind::Text);
        assert_eq!(trailing.clean_name, "x");

        let dim = classify_column("x__dim__");
        assert!(dim.is_dimension());
        assert_eq!(dim.available_aggregations(), &[AggregationKind::Avg]);

        let unknown = classify_column("x__hidden__sum");
        assert_eq!(unknown.kind, ColumnKind::Text);
        assert_eq!(unknown.type_tag, "hidden");
    }

    #[test]
    fn test_classify_is_pure() {
        for name in ["x", "x__", "x__dim__", "x__metric__sum-avg-max", "a__b__c__d", ""] {
            assert_eq!(classify_column(name), classify_column(name));
        }
    }

    #[test]
    fn test_metric_kinds() {
        assert!(classify_column("s__metricbignumber__sum").is_big_number());
        assert!(classify_column("s__metricbignumber__sum").has_color_coding());
        assert!(classify_column("r__metricrank__max").is_rank());
        assert!(!classify_column("r__metricrank__max").has_color_coding());
        let count = classify_column("employee_count__count__sum");
        assert!(count.is_metric());
        assert!(!count.has_color_coding());
    }

    #[test]
    fn test_unknown_aggregation_code_is_kept() {
        let col = classify_column("m__metric__median-sum");
        assert_eq!(*col.aggregation_type(), AggregationKind::Other("MEDIAN".to_string()));
        assert_eq!(col.available_aggregations()[1], AggregationKind::Sum);
    }

    #[test]
    fn test_default_count_column() {
        let schema = Schema::from_names([
            "manager__dim",
            "employee_count__count__sum",
            "score__metric__pct",
        ]);
        assert_eq!(schema.default_count_column(), Some(1));

        let avg_count = Schema::from_names(["employee_count__count__avg"]);
        assert_eq!(avg_count.default_count_column(), None);
    }

    #[test]
    fn test_designated_count_column() {
        let schema = Schema::from_names([
            "team__dim",
            "employee_count__count__sum",
            "heads__count__sum",
        ]);
        assert_eq!(schema.resolve_count_column(Some("heads__count__sum")), Some(2));
        assert_eq!(schema.resolve_count_column(Some("team__dim")), Some(1));
        assert_eq!(schema.resolve_count_column(None), Some(1));
    }

    #[test]
    fn test_dataset_projection_pads_and_truncates() {
        let dataset = Dataset::from_result(
            vec!["a__dim".to_string(), "b__metric__sum".to_string()],
            vec![
                vec![CellValue::from("x")],
                vec![CellValue::from("y"), CellValue::from(2), CellValue::from(99)],
            ],
        );
        assert_eq!(dataset.rows[0].values, vec![CellValue::from("x"), CellValue::Null]);
        assert_eq!(dataset.rows[1].values.len(), 2);
        assert_eq!(*dataset.value(&dataset.rows[1], "b__metric__sum"), CellValue::Number(2.0));
        assert_eq!(*dataset.value(&dataset.rows[1], "missing"), CellValue::Null);
    }

    #[test]
    fn test_aggregation_kind_serde() {
        let json = serde_json::to_string(&AggregationKind::Pct).unwrap();
        assert_eq!(json, "\"PCT\"");
        let back: AggregationKind = serde_json::from_str("\"max\"").unwrap();
        assert_eq!(back, AggregationKind::Max);
    }
}
