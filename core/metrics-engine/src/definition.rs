//! FILENAME: core/metrics-engine/src/definition.rs
//! Pipeline Definition - The serializable configuration.
//!
//! `PipelineConfig` holds everything the user can change about a metrics
//! card: grouping, visible columns, dimension filters, metric ranges and
//! sorting. It is:
//! - Serializable with the same key names saved views have always used
//! - Passed by reference into the pure pipeline
//! - Mutated only through the methods below, which keep its invariants

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{AggregationKind, ColumnDescriptor, Schema};

/// Inclusive `[min, max]` bounds of a metric range filter.
pub type MetricRange = (f64, f64);

// ============================================================================
// SORT DIRECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Asc
    }
}

// ============================================================================
// DIMENSION FILTER VIEW
// ============================================================================

/// Borrowed view of one dimension's filter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionFilter<'a> {
    pub include: &'a str,
    pub exclude: &'a str,
    pub enabled: bool,
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

/// The complete, serializable state of one metrics view.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Dimensions used as the GROUP BY key, in selection order.
    pub selected_dimensions: Vec<String>,

    /// Metrics shown in the table (selected dimensions always show).
    pub visible_columns: Vec<String>,

    /// Include text per dimension: comma-separated substrings, OR-ed.
    pub dimension_filters: BTreeMap<String, String>,

    /// Exclude text per dimension: comma-separated substrings, OR-ed.
    pub dimension_excludes: BTreeMap<String, String>,

    /// Whether a dimension's include/exclude text is in effect.
    pub enabled_filters: BTreeMap<String, bool>,

    /// Range filters applied to raw rows before aggregation.
    pub metric_ranges: BTreeMap<String, MetricRange>,

    /// Range filters applied to aggregated rows.
    pub agg_metric_ranges: BTreeMap<String, MetricRange>,

    /// Sort priority, first entry is the primary key.
    pub sort_columns: Vec<String>,

    pub sort_orders: BTreeMap<String, SortDirection>,

    /// Explicit PCT weight column. Falls back to the `employee_count`
    /// convention when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_column: Option<String>,

    /// Per-metric choice among the column's available aggregations.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metric_aggregations: BTreeMap<String, AggregationKind>,
}

impl PipelineConfig {
    /// Default configuration for a freshly fetched result: group by the
    /// first dimension and show the first `visible_metrics` metrics.
    pub fn defaults_for(schema: &Schema, visible_metrics: usize) -> Self {
        PipelineConfig {
            selected_dimensions: schema
                .dimensions()
                .take(1)
                .map(|(_, c)| c.full_name.clone())
                .collect(),
            visible_columns: schema
                .metrics()
                .take(visible_metrics)
                .map(|(_, c)| c.full_name.clone())
                .collect(),
            ..PipelineConfig::default()
        }
    }

    // ------------------------------------------------------------------------
    // Grouping and visibility
    // ------------------------------------------------------------------------

    /// Adds or removes a dimension from the grouping key.
    pub fn toggle_dimension(&mut self, dimension: &str) {
        toggle_membership(&mut self.selected_dimensions, dimension);
    }

    pub fn toggle_column_visibility(&mut self, column: &str) {
        toggle_membership(&mut self.visible_columns, column);
    }

    // ------------------------------------------------------------------------
    // Dimension filters
    // ------------------------------------------------------------------------

    pub fn dimension_filter(&self, dimension: &str) -> DimensionFilter<'_> {
        DimensionFilter {
            include: self.dimension_filters.get(dimension).map_or("", String::as_str),
            exclude: self.dimension_excludes.get(dimension).map_or("", String::as_str),
            enabled: self.is_filter_enabled(dimension),
        }
    }

    pub fn is_filter_enabled(&self, dimension: &str) -> bool {
        self.enabled_filters.get(dimension).copied().unwrap_or(false)
    }

    pub fn set_include_filter(&mut self, dimension: &str, text: impl Into<String>) {
        self.dimension_filters.insert(dimension.to_string(), text.into());
    }

    pub fn set_exclude_filter(&mut self, dimension: &str, text: impl Into<String>) {
        self.dimension_excludes.insert(dimension.to_string(), text.into());
    }

    /// Flips a dimension filter on or off. Turning it off also drops the
    /// stored include/exclude text so it cannot silently come back.
    pub fn toggle_filter_enabled(&mut self, dimension: &str) {
        let enabled = !self.is_filter_enabled(dimension);
        self.enabled_filters.insert(dimension.to_string(), enabled);
        if !enabled {
            self.dimension_filters.remove(dimension);
            self.dimension_excludes.remove(dimension);
        }
    }

    /// Names of all dimensions that carry any filter text.
    pub fn filtered_dimensions(&self) -> impl Iterator<Item = &str> + '_ {
        let mut names: Vec<&str> = self
            .dimension_filters
            .keys()
            .chain(self.dimension_excludes.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter()
    }

    // ------------------------------------------------------------------------
    // Metric ranges
    // ------------------------------------------------------------------------

    pub fn set_metric_range(&mut self, metric: &str, range: MetricRange) {
        self.metric_ranges.insert(metric.to_string(), range);
    }

    pub fn clear_metric_range(&mut self, metric: &str) {
        self.metric_ranges.remove(metric);
    }

    pub fn set_agg_metric_range(&mut self, metric: &str, range: MetricRange) {
        self.agg_metric_ranges.insert(metric.to_string(), range);
    }

    pub fn clear_agg_metric_range(&mut self, metric: &str) {
        self.agg_metric_ranges.remove(metric);
    }

    /// Drops all filter text and ranges. Grouping, visibility, enabled
    /// flags and sorting are kept.
    pub fn clear_filters(&mut self) {
        self.dimension_filters.clear();
        self.dimension_excludes.clear();
        self.metric_ranges.clear();
        self.agg_metric_ranges.clear();
    }

    // ------------------------------------------------------------------------
    // Sorting
    // ------------------------------------------------------------------------

    pub fn sort_direction(&self, column: &str) -> SortDirection {
        self.sort_orders.get(column).copied().unwrap_or_default()
    }

    /// Sort toggle for a column header. Only metrics are sortable; anything
    /// else is a no-op and returns false. A column already in the sort list
    /// flips direction in place; a new one is appended ascending.
    pub fn toggle_sort(&mut self, schema: &Schema, column: &str) -> bool {
        if schema.metric_position(column).is_none() {
            return false;
        }

        if self.sort_columns.iter().any(|c| c == column) {
            let flipped = self.sort_direction(column).flipped();
            self.sort_orders.insert(column.to_string(), flipped);
        } else {
            self.sort_columns.push(column.to_string());
            self.sort_orders.insert(column.to_string(), SortDirection::Asc);
        }
        true
    }

    pub fn clear_sort(&mut self) {
        self.sort_columns.clear();
        self.sort_orders.clear();
    }

    // ------------------------------------------------------------------------
    // Aggregation choice
    // ------------------------------------------------------------------------

    /// Chooses one of a metric's available aggregations. Returns false (and
    /// changes nothing) when the column is not a metric or does not offer it.
    pub fn set_metric_aggregation(
        &mut self,
        schema: &Schema,
        metric: &str,
        kind: AggregationKind,
    ) -> bool {
        match schema.column(metric) {
            Some(column) if column.is_metric() && column.supports_aggregation(&kind) => {
                self.metric_aggregations.insert(metric.to_string(), kind);
                true
            }
            _ => false,
        }
    }

    /// Aggregation in effect for a column: the user's choice when it is one
    /// of the available ones, the primary aggregation otherwise.
    pub fn aggregation_for<'a>(&'a self, column: &'a ColumnDescriptor) -> &'a AggregationKind {
        match self.metric_aggregations.get(&column.full_name) {
            Some(kind) if column.supports_aggregation(kind) => kind,
            _ => column.aggregation_type(),
        }
    }

    /// Number of active filters, as shown on the filter summary badge.
    pub fn active_filter_count(&self) -> usize {
        let non_blank = |text: &&String| !text.trim().is_empty();
        self.dimension_filters.values().filter(non_blank).count()
            + self.dimension_excludes.values().filter(non_blank).count()
            + self.metric_ranges.len()
            + self.agg_metric_ranges.len()
    }
}

fn toggle_membership(list: &mut Vec<String>, name: &str) {
    if let Some(pos) = list.iter().position(|n| n == name) {
        list.remove(pos);
    } else {
        list.push(name.to_string());
    }
}
