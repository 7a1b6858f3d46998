//! FILENAME: core/metrics-engine/src/sort.rs
//! Sort Stage - stable, prioritized multi-column sort.

use std::cmp::Ordering;

use crate::definition::{PipelineConfig, SortDirection};
use crate::schema::{Row, Schema};
use crate::value::CellValue;

/// Resolves the configured sort list to `(position, direction)` pairs.
/// Only metric columns are sortable; duplicates keep their first priority.
pub fn sort_keys(schema: &Schema, config: &PipelineConfig) -> Vec<(usize, SortDirection)> {
    let mut keys: Vec<(usize, SortDirection)> = Vec::new();
    for name in &config.sort_columns {
        match schema.metric_position(name) {
            Some(idx) if keys.iter().all(|&(k, _)| k != idx) => {
                keys.push((idx, config.sort_direction(name)));
            }
            Some(_) => {}
            None => log::debug!("ignoring sort on non-metric column '{}'", name),
        }
    }
    keys
}

/// Sort class of a cell. Numbers come before non-numeric text; nulls are
/// handled separately so they stay last in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SortClass {
    Number,
    Text,
}

/// Compares two cells for one sort key.
///
/// Nulls sort last in both directions. Otherwise numbers (including numeric
/// text) come before non-numeric text; numbers compare numerically and text
/// compares byte-wise. This is a total order for any mix of values.
pub fn compare_cells(a: &CellValue, b: &CellValue, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let classify = |cell: &CellValue| match cell.as_number() {
        Some(n) => (SortClass::Number, Some(n)),
        None => (SortClass::Text, None),
    };
    let (class_a, num_a) = classify(a);
    let (class_b, num_b) = classify(b);

    let ordering = class_a.cmp(&class_b).then_with(|| match (num_a, num_b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_text().cmp(&b.to_text()),
    });

    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Returns the rows sorted by the configured keys. Equal rows keep their
/// input order.
pub fn sort_rows(schema: &Schema, rows: &[Row], config: &PipelineConfig) -> Vec<Row> {
    let keys = sort_keys(schema, config);
    let mut sorted = rows.to_vec();
    if keys.is_empty() {
        return sorted;
    }

    sorted.sort_by(|a, b| {
        keys.iter()
            .map(|&(column, direction)| compare_cells(a.get(column), b.get(column), direction))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: &str = "x__metric__avg";
    const Y: &str = "y__metric__avg";

    fn create_test_schema() -> Schema {
        Schema::from_names(["label__dim", X, Y])
    }

    fn row(label: &str, x: CellValue, y: CellValue) -> Row {
        Row::new(vec![label.into(), x, y])
    }

    fn sorted_by(columns: &[(&str, SortDirection)]) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        for &(name, direction) in columns {
            config.sort_columns.push(name.to_string());
            config.sort_orders.insert(name.to_string(), direction);
        }
        config
    }

    fn labels(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.get(0).to_text().into_owned()).collect()
    }

    #[test]
    fn test_nulls_last_in_both_directions() {
        let schema = create_test_schema();
        let rows = vec![
            row("null", CellValue::Null, CellValue::Null),
            row("five", 5.into(), CellValue::Null),
            row("one", 1.into(), CellValue::Null),
        ];

        let asc = sort_rows(&schema, &rows, &sorted_by(&[(X, SortDirection::Asc)]));
        assert_eq!(labels(&asc), vec!["one", "five", "null"]);

        let desc = sort_rows(&schema, &rows, &sorted_by(&[(X, SortDirection::Desc)]));
        assert_eq!(labels(&desc), vec!["five", "one", "null"]);
    }

    #[test]
    fn test_secondary_key_breaks_ties() {
        let schema = create_test_schema();
        let rows = vec![
            row("a", 1.into(), 1.into()),
            row("b", 2.into(), 9.into()),
            row("c", 1.into(), 3.into()),
        ];
        let config = sorted_by(&[(X, SortDirection::Asc), (Y, SortDirection::Desc)]);
        assert_eq!(labels(&sort_rows(&schema, &rows, &config)), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let schema = create_test_schema();
        let rows = vec![
            row("first", 1.into(), CellValue::Null),
            row("second", 1.into(), CellValue::Null),
            row("third", 0.into(), CellValue::Null),
            row("fourth", 1.into(), CellValue::Null),
        ];
        let config = sorted_by(&[(X, SortDirection::Desc)]);
        assert_eq!(
            labels(&sort_rows(&schema, &rows, &config)),
            vec!["first", "second", "fourth", "third"]
        );
    }

    #[test]
    fn test_numeric_text_compares_numerically() {
        let schema = create_test_schema();
        let rows = vec![
            row("ten", "10".into(), CellValue::Null),
            row("nine", 9.into(), CellValue::Null),
        ];
        let config = sorted_by(&[(X, SortDirection::Asc)]);
        assert_eq!(labels(&sort_rows(&schema, &rows, &config)), vec!["nine", "ten"]);
    }

    #[test]
    fn test_numbers_before_text() {
        assert_eq!(
            compare_cells(&"b".into(), &"B".into(), SortDirection::Asc),
            Ordering::Greater
        );
        assert_eq!(
            compare_cells(&10.into(), &"abc".into(), SortDirection::Asc),
            Ordering::Less
        );
        // "10" < "1x" as text would contradict 2 < 10 and "1x" < "2".
        assert_eq!(
            compare_cells(&10.into(), &"1x".into(), SortDirection::Asc),
            Ordering::Less
        );
        assert_eq!(
            compare_cells(&"1x".into(), &2.into(), SortDirection::Asc),
            Ordering::Greater
        );
        assert_eq!(
            compare_cells(&"1x".into(), &CellValue::Null, SortDirection::Desc),
            Ordering::Less
        );
    }

    #[test]
    fn test_large_mixed_column_sorts_in_both_directions() {
        let schema = create_test_schema();
        for size in [21usize, 64, 150, 320] {
            let rows: Vec<Row> = (0..size)
                .map(|i| {
                    let n = (i * 7919 + 13) % 97;
                    let x = match i % 4 {
                        0 => CellValue::Number(n as f64),
                        1 => CellValue::Text(format!("{}x", n)),
                        2 => CellValue::Number((n % 5) as f64),
                        _ if i % 8 == 3 => CellValue::Null,
                        _ => CellValue::Text(n.to_string()),
                    };
                    row(&i.to_string(), x, CellValue::Null)
                })
                .collect();

            for direction in [SortDirection::Asc, SortDirection::Desc] {
                let sorted = sort_rows(&schema, &rows, &sorted_by(&[(X, direction)]));
                assert_eq!(sorted.len(), rows.len());

                for pair in sorted.windows(2) {
                    assert_ne!(
                        compare_cells(pair[0].get(1), pair[1].get(1), direction),
                        Ordering::Greater
                    );
                }

                let nulls_at = sorted.iter().position(|r| r.get(1).is_null());
                if let Some(first_null) = nulls_at {
                    assert!(sorted[first_null..].iter().all(|r| r.get(1).is_null()));
                }
            }
        }
    }

    #[test]
    fn test_dimension_sort_keys_are_ignored() {
        let schema = create_test_schema();
        let rows = vec![row("b", 1.into(), 1.into()), row("a", 2.into(), 2.into())];
        let config = sorted_by(&[("label__dim", SortDirection::Asc)]);
        assert_eq!(sort_rows(&schema, &rows, &config), rows);
        assert!(sort_keys(&schema, &config).is_empty());
    }

    #[test]
    fn test_missing_direction_defaults_to_ascending() {
        let schema = create_test_schema();
        let mut config = PipelineConfig::default();
        config.sort_columns.push(X.to_string());
        assert_eq!(sort_keys(&schema, &config), vec![(1, SortDirection::Asc)]);
    }
}
