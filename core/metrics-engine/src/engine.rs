//! FILENAME: core/metrics-engine/src/engine.rs
//! Pipeline Engine - composes the stages into the displayed result.
//!
//! This module takes a `PipelineConfig` (what the user asked for) and the
//! raw rows of one result set and produces a `PipelineOutput` (what is
//! displayed). The run is pure: the same rows and config always produce
//! the same output.
//!
//! Algorithm:
//! 1. Dimension filters on raw rows
//! 2. Metric range filters on raw rows
//! 3. Re-aggregation by the selected dimensions
//! 4. Metric range filters on aggregated rows
//! 5. Multi-column sort
//! 6. Funnel counts over the intermediate results

use crate::aggregate::{aggregate_rows, Grouping};
use crate::definition::PipelineConfig;
use crate::filter::{apply_dimension_filters, apply_range_filters};
use crate::funnel::FilterFunnel;
use crate::schema::{Row, Schema};
use crate::sort::sort_rows;
use crate::value::CellValue;
use crate::view::displayed_columns;

/// The displayed result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Final rows, full schema width, in display order.
    pub rows: Vec<Row>,
    /// Column positions to show: grouped dimensions, then visible metrics.
    pub displayed_columns: Vec<usize>,
    pub funnel: FilterFunnel,
}

impl PipelineOutput {
    /// Rows reduced to the displayed columns.
    pub fn projected(&self) -> Vec<Vec<&CellValue>> {
        self.rows
            .iter()
            .map(|row| self.displayed_columns.iter().map(|&idx| row.get(idx)).collect())
            .collect()
    }

    /// Names of the displayed columns.
    pub fn column_names<'s>(&self, schema: &'s Schema) -> Vec<&'s str> {
        self.displayed_columns
            .iter()
            .filter_map(|&idx| schema.column_at(idx))
            .map(|c| c.full_name.as_str())
            .collect()
    }
}

// ============================================================================
// PIPELINE CALCULATOR
// ============================================================================

/// Runs the stages for one schema/config pair.
pub struct PipelineCalculator<'a> {
    schema: &'a Schema,
    config: &'a PipelineConfig,
    grouping: Grouping,
}

impl<'a> PipelineCalculator<'a> {
    pub fn new(schema: &'a Schema, config: &'a PipelineConfig) -> Self {
        PipelineCalculator {
            schema,
            config,
            grouping: Grouping::resolve(schema, config),
        }
    }

    /// Raw rows after dimension and raw range filters.
    pub fn filter_raw(&self, raw: &[Row]) -> (usize, Vec<Row>) {
        let after_dims = apply_dimension_filters(self.schema, raw, self.config);
        let after_dim_count = after_dims.len();
        let after_facts = apply_range_filters(self.schema, &after_dims, &self.config.metric_ranges);
        (after_dim_count, after_facts)
    }

    /// Aggregated rows before the aggregated range filters. This is the data
    /// the aggregated range sliders take their bounds from.
    pub fn aggregate(&self, raw: &[Row]) -> Vec<Row> {
        let (_, filtered) = self.filter_raw(raw);
        aggregate_rows(self.schema, &filtered, self.config)
    }

    /// Executes every stage and returns the displayed result.
    pub fn calculate(&self, raw: &[Row]) -> PipelineOutput {
        // Step 1 + 2: raw filters
        let (after_dim_filters, filtered) = self.filter_raw(raw);

        // Step 3: re-aggregation
        let aggregated = aggregate_rows(self.schema, &filtered, self.config);

        // Step 4: aggregated range filters
        let aggregated = apply_range_filters(self.schema, &aggregated, &self.config.agg_metric_ranges);

        // Step 5: sort
        let rows = sort_rows(self.schema, &aggregated, self.config);

        // Step 6: funnel
        let unit_column = if self.grouping.has_selection() {
            self.schema.resolve_count_column(self.config.count_column.as_deref())
        } else {
            None
        };
        let funnel = FilterFunnel::compute(
            raw.len(),
            after_dim_filters,
            filtered.len(),
            &rows,
            unit_column,
        );

        log::debug!(
            "pipeline: {} raw, {} after dims, {} after facts, {} displayed",
            raw.len(),
            after_dim_filters,
            filtered.len(),
            rows.len()
        );

        PipelineOutput {
            rows,
            displayed_columns: displayed_columns(self.schema, self.config),
            funnel,
        }
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Runs the full pipeline over a result set.
/// This is the main entry point of the engine.
pub fn run_pipeline(schema: &Schema, raw: &[Row], config: &PipelineConfig) -> PipelineOutput {
    PipelineCalculator::new(schema, config).calculate(raw)
}
