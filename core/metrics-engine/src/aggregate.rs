//! FILENAME: core/metrics-engine/src/aggregate.rs
//! Aggregation Stage - re-aggregates raw rows when dimensions are hidden.
//!
//! Algorithm:
//! 1. Resolve the grouping key from the selected dimensions. If it covers
//!    every dimension the stage is the identity.
//! 2. Single pass over the rows: find or create the group (structural key,
//!    first-appearance order), collect distinct values of collapsed
//!    dimensions, and feed every metric into its accumulator.
//! 3. Emit one row per group: grouped dimensions keep their value, collapsed
//!    dimensions become a sorted ", "-joined list, metrics are reduced.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::definition::PipelineConfig;
use crate::schema::{AggregationKind, Row, Schema};
use crate::value::{CellValue, OrderedFloat};

/// Separator for the rollup of collapsed dimension values.
pub const ROLLUP_SEPARATOR: &str = ", ";

// ============================================================================
// GROUPING
// ============================================================================

/// The resolved GROUP BY key for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    /// Positions of the selected dimension columns, in selection order.
    pub selected: SmallVec<[usize; 4]>,
    /// Positions of dimension columns not in the key.
    pub collapsed: SmallVec<[usize; 4]>,
}

impl Grouping {
    /// Resolves selected dimension names against the schema. Unknown names,
    /// non-dimensions and duplicates are dropped.
    pub fn resolve(schema: &Schema, config: &PipelineConfig) -> Self {
        let mut selected: SmallVec<[usize; 4]> = SmallVec::new();
        for name in &config.selected_dimensions {
            match schema.dimension_position(name) {
                Some(idx) if !selected.contains(&idx) => selected.push(idx),
                Some(_) => {}
                None => log::debug!("ignoring unknown grouping dimension '{}'", name),
            }
        }

        let collapsed = schema
            .dimensions()
            .map(|(idx, _)| idx)
            .filter(|idx| !selected.contains(idx))
            .collect();

        Grouping { selected, collapsed }
    }

    /// No dimension is collapsed, so aggregation cannot lose information.
    pub fn is_identity(&self) -> bool {
        self.collapsed.is_empty()
    }

    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }
}

/// Hashable form of a grouping value. Structural, so values containing any
/// delimiter can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyValue {
    Null,
    Number(OrderedFloat),
    Text(String),
}

impl From<&CellValue> for KeyValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Null => KeyValue::Null,
            CellValue::Number(n) => KeyValue::Number(OrderedFloat(*n)),
            CellValue::Text(s) => KeyValue::Text(s.clone()),
        }
    }
}

type GroupKey = SmallVec<[KeyValue; 4]>;

// ============================================================================
// METRIC ACCUMULATOR
// ============================================================================

/// Running state for one metric within one group. Every field is a
/// commutative reduction, so the result does not depend on row order.
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    pub sum: f64,
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Σ(value × weight) over rows where both are numeric.
    pub weighted_sum: f64,
    /// Σ(weight) over the same rows.
    pub weight_total: f64,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a numeric value and, when known, the row's weight.
    pub fn add(&mut self, value: f64, weight: Option<f64>) {
        self.sum += value;
        self.count += 1;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));

        if let Some(weight) = weight {
            self.weighted_sum += value * weight;
            self.weight_total += weight;
        }
    }

    fn average(&self) -> f64 {
        self.sum / self.count as f64
    }

    /// Computes the final value. Null when no numeric value was seen.
    /// `weighted` says whether a weight column exists at all.
    pub fn compute(&self, aggregation: &AggregationKind, weighted: bool) -> CellValue {
        if self.count == 0 {
            return CellValue::Null;
        }

        let value = match aggregation {
            AggregationKind::Sum => self.sum,
            AggregationKind::Count => self.count as f64,
            AggregationKind::Min => self.min.unwrap_or(f64::NAN),
            AggregationKind::Max => self.max.unwrap_or(f64::NAN),
            AggregationKind::Pct if weighted && self.weight_total != 0.0 => {
                self.weighted_sum / self.weight_total
            }
            AggregationKind::Pct | AggregationKind::Avg | AggregationKind::Other(_) => {
                self.average()
            }
        };

        // inf + -inf
        if value.is_nan() {
            return CellValue::Null;
        }
        CellValue::Number(value)
    }
}

// ============================================================================
// GROUP STATE
// ============================================================================

struct GroupState {
    /// Values of the selected dimensions from the first row of the group.
    key_values: SmallVec<[CellValue; 4]>,
    /// Distinct non-empty values per collapsed dimension.
    rollups: Vec<BTreeSet<String>>,
    /// One accumulator per metric column.
    metrics: Vec<MetricAccumulator>,
}

impl GroupState {
    fn new(row: &Row, grouping: &Grouping, metric_count: usize) -> Self {
        GroupState {
            key_values: grouping.selected.iter().map(|&idx| row.get(idx).clone()).collect(),
            rollups: vec![BTreeSet::new(); grouping.collapsed.len()],
            metrics: vec![MetricAccumulator::new(); metric_count],
        }
    }
}

// ============================================================================
// AGGREGATION STAGE
// ============================================================================

/// Groups filtered raw rows by the selected dimensions and reduces every
/// metric with its effective aggregation.
pub fn aggregate_rows(schema: &Schema, rows: &[Row], config: &PipelineConfig) -> Vec<Row> {
    let grouping = Grouping::resolve(schema, config);
    if grouping.is_identity() {
        return rows.to_vec();
    }

    let metric_columns: Vec<usize> = schema.metrics().map(|(idx, _)| idx).collect();
    let count_column = schema.resolve_count_column(config.count_column.as_deref());

    let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut groups: Vec<GroupState> = Vec::new();

    for row in rows {
        let key: GroupKey = grouping.selected.iter().map(|&idx| KeyValue::from(row.get(idx))).collect();
        let group_idx = *index.entry(key).or_insert_with(|| {
            groups.push(GroupState::new(row, &grouping, metric_columns.len()));
            groups.len() - 1
        });
        let group = &mut groups[group_idx];

        for (slot, &column) in grouping.collapsed.iter().enumerate() {
            let text = row.get(column).to_text();
            if !text.is_empty() {
                group.rollups[slot].insert(text.into_owned());
            }
        }

        let weight = count_column.and_then(|idx| row.get(idx).as_number());
        for (slot, &column) in metric_columns.iter().enumerate() {
            if let Some(value) = row.get(column).as_number() {
                group.metrics[slot].add(value, weight);
            }
        }
    }

    log::debug!(
        "aggregated {} rows into {} groups by {} of {} dimensions",
        rows.len(),
        groups.len(),
        grouping.selected.len(),
        grouping.selected.len() + grouping.collapsed.len()
    );

    let weighted = count_column.is_some();
    groups
        .into_iter()
        .map(|group| {
            let mut values = vec![CellValue::Null; schema.len()];

            for (&column, value) in grouping.selected.iter().zip(group.key_values) {
                values[column] = value;
            }

            for (&column, distinct) in grouping.collapsed.iter().zip(&group.rollups) {
                let joined = distinct.iter().map(String::as_str).collect::<Vec<_>>().join(ROLLUP_SEPARATOR);
                values[column] = CellValue::Text(joined);
            }

            for (&column, accumulator) in metric_columns.iter().zip(&group.metrics) {
                let descriptor = &schema.columns()[column];
                values[column] = accumulator.compute(config.aggregation_for(descriptor), weighted);
            }

            Row::new(values)
        })
        .collect()
}
