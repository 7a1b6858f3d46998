//! FILENAME: core/metrics-engine/src/lib.rs
//! Dimensional metrics engine.
//!
//! Turns a flat query result whose column names follow the
//! `<name>__<kind>__<aggregations>` convention into the rows a metrics card
//! displays. It has no knowledge of SQL execution or rendering.
//!
//! Layers:
//! - `value`: scalar cells and the shared numeric/text coercion
//! - `schema`: column classifier, schema and rows (what the data IS)
//! - `definition`: serializable pipeline configuration (what the user WANTS)
//! - `filter`, `aggregate`, `sort`, `funnel`: the pipeline stages
//! - `engine`: stage composition (HOW we calculate)
//! - `view`: display-side helpers (WHAT we show)

pub mod value;
pub mod schema;
pub mod definition;
pub mod filter;
pub mod aggregate;
pub mod sort;
pub mod funnel;
pub mod engine;
pub mod view;

pub use value::CellValue;
pub use schema::{
    classify_column, AggregationKind, ColumnDescriptor, ColumnKind, Dataset, Row, Schema,
};
pub use definition::{DimensionFilter, MetricRange, PipelineConfig, SortDirection};
pub use filter::{apply_dimension_filters, apply_range_filters, FilterTerms};
pub use aggregate::{aggregate_rows, Grouping, MetricAccumulator};
pub use sort::{compare_cells, sort_rows};
pub use funnel::FilterFunnel;
pub use engine::{run_pipeline, PipelineCalculator, PipelineOutput};
pub use view::{
    big_number_intensity, dimension_value_listing, displayed_columns, metric_bounds,
    metric_color, MetricColor, Thresholds,
};
