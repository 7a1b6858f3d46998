//! FILENAME: core/metrics-engine/src/filter.rs
//! Filter stages.
//!
//! - Dimension filter: per-dimension include/exclude substring lists.
//!   OR within one list, AND across dimensions, exclude wins over include.
//! - Metric range filter: inclusive numeric bounds per metric, applied once
//!   to raw rows and once to aggregated rows. Non-numeric values pass.
//!
//! Both stages return a new row set and never touch their input.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::definition::{MetricRange, PipelineConfig};
use crate::schema::{Row, Schema};

// ============================================================================
// FILTER TERMS
// ============================================================================

/// Parsed comma-separated filter text: trimmed, lower-cased, blanks dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterTerms {
    terms: SmallVec<[String; 4]>,
}

impl FilterTerms {
    pub fn parse(text: &str) -> Self {
        FilterTerms {
            terms: text
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// True when any term is a substring of `value` (case-insensitive).
    pub fn matches(&self, value: &str) -> bool {
        let lowered = value.to_lowercase();
        self.matches_lowered(&lowered)
    }

    fn matches_lowered(&self, lowered: &str) -> bool {
        self.terms.iter().any(|t| lowered.contains(t.as_str()))
    }
}

// ============================================================================
// DIMENSION FILTER STAGE
// ============================================================================

/// A resolved, active filter on one dimension column.
#[derive(Debug, Clone)]
struct DimensionPredicate {
    column: usize,
    include: FilterTerms,
    exclude: FilterTerms,
}

impl DimensionPredicate {
    fn accepts(&self, row: &Row) -> bool {
        let lowered = row.get(self.column).to_text().to_lowercase();
        if self.exclude.matches_lowered(&lowered) {
            return false;
        }
        self.include.is_empty() || self.include.matches_lowered(&lowered)
    }
}

/// Collects the filters that are in effect: enabled, on a known dimension,
/// and with at least one non-blank term.
fn dimension_predicates(schema: &Schema, config: &PipelineConfig) -> Vec<DimensionPredicate> {
    let mut predicates = Vec::new();

    for name in config.filtered_dimensions() {
        let filter = config.dimension_filter(name);
        if !filter.enabled {
            continue;
        }

        let Some(column) = schema.dimension_position(name) else {
            log::debug!("ignoring filter on unknown dimension '{}'", name);
            continue;
        };

        let include = FilterTerms::parse(filter.include);
        let exclude = FilterTerms::parse(filter.exclude);
        if include.is_empty() && exclude.is_empty() {
            continue;
        }

        predicates.push(DimensionPredicate { column, include, exclude });
    }

    predicates
}

/// Applies the enabled dimension include/exclude filters to raw rows.
pub fn apply_dimension_filters(schema: &Schema, rows: &[Row], config: &PipelineConfig) -> Vec<Row> {
    let predicates = dimension_predicates(schema, config);
    if predicates.is_empty() {
        return rows.to_vec();
    }

    rows.iter()
        .filter(|row| predicates.iter().all(|p| p.accepts(row)))
        .cloned()
        .collect()
}

// ============================================================================
// METRIC RANGE FILTER STAGE
// ============================================================================

/// Applies inclusive range filters. A row whose value does not coerce to a
/// number always passes; ranges on unknown or non-metric columns are ignored.
pub fn apply_range_filters(
    schema: &Schema,
    rows: &[Row],
    ranges: &BTreeMap<String, MetricRange>,
) -> Vec<Row> {
    let active: Vec<(usize, MetricRange)> = ranges
        .iter()
        .filter_map(|(name, &range)| match schema.metric_position(name) {
            Some(column) => Some((column, range)),
            None => {
                log::debug!("ignoring range on non-metric column '{}'", name);
                None
            }
        })
        .collect();

    if active.is_empty() {
        return rows.to_vec();
    }

    rows.iter()
        .filter(|row| {
            active.iter().all(|&(column, (min, max))| match row.get(column).as_number() {
                Some(value) => min <= value && value <= max,
                None => true,
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;

    fn create_test_schema() -> Schema {
        Schema::from_names(["team__dim", "city__dim", "score__metric__avg", "note"])
    }

    fn row(team: &str, city: &str, score: CellValue) -> Row {
        Row::new(vec![team.into(), city.into(), score, CellValue::Null])
    }

    fn teams(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.get(0).to_text().into_owned()).collect()
    }

    fn enabled_config(dim: &str, include: &str, exclude: &str) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.toggle_filter_enabled(dim);
        config.set_include_filter(dim, include);
        config.set_exclude_filter(dim, exclude);
        config
    }

    #[test]
    fn test_filter_terms_parsing() {
        let terms = FilterTerms::parse(" Alpha , ,beta,");
        assert_eq!(terms.terms(), &["alpha".to_string(), "beta".to_string()]);
        assert!(terms.matches("The ALPHA team"));
        assert!(!terms.matches("gamma"));
        assert!(FilterTerms::parse(" , ").is_empty());
    }

    #[test]
    fn test_include_or_exclude_wins() {
        let schema = create_test_schema();
        let rows = vec![
            row("A", "x", 1.into()),
            row("B", "x", 1.into()),
            row("C", "x", 1.into()),
            row("AC", "x", 1.into()),
        ];
        let config = enabled_config("team__dim", "a,b", "c");

        let filtered = apply_dimension_filters(&schema, &rows, &config);
        assert_eq!(teams(&filtered), vec!["A", "B"]);
    }

    #[test]
    fn test_and_across_dimensions() {
        let schema = create_test_schema();
        let rows = vec![
            row("A", "Berlin", 1.into()),
            row("A", "Paris", 1.into()),
            row("B", "Berlin", 1.into()),
        ];
        let mut config = enabled_config("team__dim", "a", "");
        config.toggle_filter_enabled("city__dim");
        config.set_include_filter("city__dim", "berlin");

        let filtered = apply_dimension_filters(&schema, &rows, &config);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].get(1).to_text(), "Berlin");
    }

    #[test]
    fn test_disabled_filter_is_ignored() {
        let schema = create_test_schema();
        let rows = vec![row("A", "x", 1.into()), row("B", "x", 1.into())];
        let mut config = PipelineConfig::default();
        config.set_include_filter("team__dim", "a");

        assert_eq!(apply_dimension_filters(&schema, &rows, &config).len(), 2);
    }

    #[test]
    fn test_empty_inputs_pass_through() {
        let schema = create_test_schema();
        let config = enabled_config("team__dim", " , ", "");
        let rows = vec![row("A", "x", 1.into())];
        assert_eq!(apply_dimension_filters(&schema, &rows, &config), rows);
        assert!(apply_dimension_filters(&schema, &[], &config).is_empty());
    }

    #[test]
    fn test_null_dimension_matches_nothing() {
        let schema = create_test_schema();
        let rows = vec![Row::new(vec![CellValue::Null, "x".into(), 1.into(), CellValue::Null])];
        let config = enabled_config("team__dim", "a", "");
        assert!(apply_dimension_filters(&schema, &rows, &config).is_empty());

        let exclude_only = enabled_config("team__dim", "", "a");
        assert_eq!(apply_dimension_filters(&schema, &rows, &exclude_only).len(), 1);
    }

    #[test]
    fn test_filter_on_text_column_is_ignored() {
        let schema = create_test_schema();
        let rows = vec![row("A", "x", 1.into())];
        let config = enabled_config("note", "zzz", "");
        assert_eq!(apply_dimension_filters(&schema, &rows, &config).len(), 1);
    }

    #[test]
    fn test_range_filter_bounds_inclusive() {
        let schema = create_test_schema();
        let rows = vec![
            row("A", "x", 1.into()),
            row("B", "x", 2.into()),
            row("C", "x", 3.into()),
            row("D", "x", 4.into()),
        ];
        let mut ranges = BTreeMap::new();
        ranges.insert("score__metric__avg".to_string(), (2.0, 3.0));

        let filtered = apply_range_filters(&schema, &rows, &ranges);
        assert_eq!(teams(&filtered), vec!["B", "C"]);
    }

    #[test]
    fn test_range_filter_passes_non_numeric() {
        let schema = create_test_schema();
        let rows = vec![
            row("A", "x", CellValue::Null),
            row("B", "x", "n/a".into()),
            row("C", "x", "".into()),
            row("D", "x", 100.into()),
        ];
        let mut ranges = BTreeMap::new();
        ranges.insert("score__metric__avg".to_string(), (0.0, 10.0));

        let filtered = apply_range_filters(&schema, &rows, &ranges);
        assert_eq!(teams(&filtered), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_range_on_dimension_is_ignored() {
        let schema = create_test_schema();
        let rows = vec![row("5", "x", 1.into())];
        let mut ranges = BTreeMap::new();
        ranges.insert("team__dim".to_string(), (10.0, 20.0));
        assert_eq!(apply_range_filters(&schema, &rows, &ranges).len(), 1);
    }
}
