//! FILENAME: core/metrics-engine/src/view.rs
//! Display helpers - the data-side decisions behind the rendered card.
//!
//! Rendering itself lives with the frontend; this module answers the
//! questions it asks: which columns to show, which colour a metric gets,
//! how dimension values are listed next to a filter, and which bounds a
//! range slider spans.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::definition::PipelineConfig;
use crate::filter::FilterTerms;
use crate::schema::{Row, Schema};
use crate::value::CellValue;

// ============================================================================
// COLUMN SELECTION
// ============================================================================

/// Grouped dimensions in selection order, then visible metrics in schema
/// order.
pub fn displayed_columns(schema: &Schema, config: &PipelineConfig) -> Vec<usize> {
    let mut columns: Vec<usize> = Vec::new();
    for name in &config.selected_dimensions {
        if let Some(idx) = schema.dimension_position(name) {
            if !columns.contains(&idx) {
                columns.push(idx);
            }
        }
    }

    columns.extend(
        schema
            .metrics()
            .filter(|(_, c)| config.visible_columns.iter().any(|v| *v == c.full_name))
            .map(|(idx, _)| idx),
    );
    columns
}

// ============================================================================
// COLOUR CODING
// ============================================================================

/// Thresholds for colour-coded metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub red: f64,
    pub yellow: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds { red: 2.2, yellow: 4.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricColor {
    Red,
    Yellow,
    Green,
    Neutral,
}

pub fn metric_color(value: &CellValue, thresholds: &Thresholds) -> MetricColor {
    match value.as_number() {
        None => MetricColor::Neutral,
        Some(v) if v < thresholds.red => MetricColor::Red,
        Some(v) if v < thresholds.yellow => MetricColor::Yellow,
        Some(_) => MetricColor::Green,
    }
}

/// Position of a big-number value within the column's `(min, max)`, in
/// `0.0..=1.0`. A degenerate range yields the midpoint.
pub fn big_number_intensity(value: f64, bounds: (f64, f64)) -> f64 {
    let (min, max) = bounds;
    let range = max - min;
    if range > 0.0 {
        (value - min) / range
    } else {
        0.5
    }
}

// ============================================================================
// RANGE BOUNDS
// ============================================================================

/// `(min, max)` over the numeric values of a column, or `None` when the
/// column has no numeric value in these rows.
pub fn metric_bounds(rows: &[Row], column: usize) -> Option<(f64, f64)> {
    rows.iter()
        .filter_map(|row| row.get(column).as_number())
        .fold(None, |bounds, v| match bounds {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

// ============================================================================
// DIMENSION VALUE LISTING
// ============================================================================

/// Distinct values of a dimension ordered for the filter panel: values
/// matched by the include text first, then the rest, excluded values last.
/// Each part is sorted; null and empty values are skipped.
pub fn dimension_value_listing(rows: &[Row], column: usize, include: &str, exclude: &str) -> Vec<String> {
    let distinct: BTreeSet<String> = rows
        .iter()
        .map(|row| row.get(column).to_text())
        .filter(|text| !text.is_empty())
        .map(|text| text.into_owned())
        .collect();

    let include = FilterTerms::parse(include);
    let exclude = FilterTerms::parse(exclude);

    let mut matched = Vec::new();
    let mut rest = Vec::new();
    let mut excluded = Vec::new();

    for value in distinct {
        if exclude.matches(&value) {
            excluded.push(value);
        } else if !include.is_empty() && include.matches(&value) {
            matched.push(value);
        } else {
            rest.push(value);
        }
    }

    matched.extend(rest);
    matched.extend(excluded);
    matched
}
