//! FILENAME: core/metrics-engine/src/funnel.rs
//! Funnel Analytics - how much data survives each pipeline stage.

use serde::{Deserialize, Serialize};

use crate::schema::Row;

/// Row/unit counts after each stage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterFunnel {
    /// Raw rows.
    pub total: usize,
    /// Raw rows left after dimension filters.
    pub after_dim_filters: usize,
    /// Raw rows left after dimension filters and raw range filters.
    pub after_fact_filters: usize,
    /// Final stage: the summed count metric over the displayed rows when a
    /// count metric exists and something is grouped, the displayed row
    /// count otherwise.
    pub after_agg_filters: f64,
}

impl FilterFunnel {
    /// Builds the funnel from stage sizes and the finally displayed rows.
    /// `count_column` is only given when the unit count applies.
    pub fn compute(
        total: usize,
        after_dim_filters: usize,
        after_fact_filters: usize,
        displayed: &[Row],
        count_column: Option<usize>,
    ) -> Self {
        let after_agg_filters = match count_column {
            Some(column) => displayed
                .iter()
                .map(|row| row.get(column).as_number().unwrap_or(0.0))
                .sum(),
            None => displayed.len() as f64,
        };

        FilterFunnel {
            total,
            after_dim_filters,
            after_fact_filters,
            after_agg_filters,
        }
    }

    pub fn dim_filter_pct(&self) -> f64 {
        stage_pct(self.after_dim_filters as f64, self.total as f64)
    }

    pub fn fact_filter_pct(&self) -> f64 {
        stage_pct(self.after_fact_filters as f64, self.after_dim_filters as f64)
    }

    pub fn agg_filter_pct(&self) -> f64 {
        stage_pct(self.after_agg_filters, self.after_fact_filters as f64)
    }

    /// Final stage relative to the raw row count.
    pub fn total_pct(&self) -> f64 {
        stage_pct(self.after_agg_filters, self.total as f64)
    }

    /// Share of raw rows that survive the raw-row filters.
    pub fn filter_ratio(&self) -> f64 {
        stage_pct(self.after_fact_filters as f64, self.total as f64)
    }
}

fn stage_pct(count: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        100.0
    } else {
        count / previous * 100.0
    }
}
