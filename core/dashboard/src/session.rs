//! FILENAME: core/dashboard/src/session.rs
//! Metrics Session - one metrics card's lifecycle around the pure engine.
//!
//! The session owns the query executor, the card settings, the current SQL
//! text, the last successfully fetched dataset and the pipeline config. All
//! derived data is recomputed from those on demand through `view()`.
//!
//! Lifecycle:
//! 1. `run_query` / `run_edited_query` fetch a result and replace the dataset
//! 2. Mutations edit the config in place
//! 3. `view` runs the pipeline over the current dataset and config
//! 4. `save_view` / `load_view` move the config through a view store

use metrics_engine::{
    dimension_value_listing, metric_bounds, metric_color, AggregationKind, CellValue, Dataset,
    MetricColor, MetricRange, PipelineCalculator, PipelineConfig, PipelineOutput,
};
use persistence::{SavedView, ViewConfig, ViewId, ViewStore};

use crate::error::DashboardError;
use crate::executor::QueryExecutor;
use crate::settings::CardSettings;

/// Result of one `view()` call. `generation` identifies the fetch the rows
/// were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub generation: u64,
    pub columns: Vec<String>,
    pub output: PipelineOutput,
}

pub struct MetricsSession<E> {
    executor: E,
    settings: CardSettings,
    sql: String,
    dataset: Option<Dataset>,
    config: PipelineConfig,
    generation: u64,
}

impl<E: QueryExecutor> MetricsSession<E> {
    pub fn new(executor: E, settings: CardSettings, sql: impl Into<String>) -> Self {
        MetricsSession {
            executor,
            settings,
            sql: sql.into(),
            dataset: None,
            config: PipelineConfig::default(),
            generation: 0,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn settings(&self) -> &CardSettings {
        &self.settings
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// Number of successful fetches so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ========================================================================
    // QUERY EXECUTION
    // ========================================================================

    /// Runs the current SQL. On success the dataset is replaced and either
    /// `initial` or the defaults for the new schema become the config. An
    /// initial config without grouping, visible columns or count column
    /// takes those from the defaults. On failure the previous dataset and
    /// config stay in place.
    pub fn run_query(&mut self, initial: Option<PipelineConfig>) -> Result<&Dataset, DashboardError> {
        let dataset = self.fetch()?;
        let defaults = self.default_config(&dataset);
        self.config = match initial {
            Some(config) => complete_initial(config, defaults),
            None => defaults,
        };
        Ok(self.install(dataset))
    }

    /// Re-runs the current SQL keeping the config as it is.
    pub fn refresh(&mut self) -> Result<&Dataset, DashboardError> {
        let dataset = self.fetch()?;
        Ok(self.install(dataset))
    }

    /// Replaces the SQL text and runs it. The config always resets to the
    /// defaults of the new schema.
    pub fn run_edited_query(&mut self, sql: impl Into<String>) -> Result<&Dataset, DashboardError> {
        self.sql = sql.into();
        self.run_query(None)
    }

    fn fetch(&mut self) -> Result<Dataset, DashboardError> {
        let result = match self.executor.execute(&self.sql, &self.settings.database) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("query failed, keeping previous result: {}", e);
                return Err(e.into());
            }
        };

        if !result.has_columns() {
            log::warn!("query returned no columns, keeping previous result");
            return Err(DashboardError::NoData);
        }
        Ok(result.into_dataset())
    }

    fn install(&mut self, dataset: Dataset) -> &Dataset {
        self.generation += 1;
        log::info!(
            "loaded result #{}: {} columns, {} rows",
            self.generation,
            dataset.schema.len(),
            dataset.rows.len()
        );
        self.dataset.insert(dataset)
    }

    fn default_config(&self, dataset: &Dataset) -> PipelineConfig {
        let mut config = PipelineConfig::defaults_for(&dataset.schema, self.settings.visible_metrics);
        config.count_column = self.settings.count_column.clone();
        config
    }

    // ========================================================================
    // CONFIG MUTATIONS
    // ========================================================================

    pub fn toggle_dimension(&mut self, dimension: &str) {
        self.config.toggle_dimension(dimension);
    }

    pub fn toggle_column_visibility(&mut self, column: &str) {
        self.config.toggle_column_visibility(column);
    }

    pub fn set_include_filter(&mut self, dimension: &str, text: &str) {
        self.config.set_include_filter(dimension, text);
    }

    pub fn set_exclude_filter(&mut self, dimension: &str, text: &str) {
        self.config.set_exclude_filter(dimension, text);
    }

    /// Turning a filter off also clears its include and exclude text.
    pub fn toggle_filter_enabled(&mut self, dimension: &str) {
        self.config.toggle_filter_enabled(dimension);
    }

    pub fn set_metric_range(&mut self, metric: &str, range: MetricRange) {
        self.config.set_metric_range(metric, range);
    }

    pub fn clear_metric_range(&mut self, metric: &str) {
        self.config.clear_metric_range(metric);
    }

    pub fn set_agg_metric_range(&mut self, metric: &str, range: MetricRange) {
        self.config.set_agg_metric_range(metric, range);
    }

    pub fn clear_agg_metric_range(&mut self, metric: &str) {
        self.config.clear_agg_metric_range(metric);
    }

    /// Sort toggle for a column header. False when nothing is loaded or the
    /// column is not a metric.
    pub fn toggle_sort(&mut self, column: &str) -> bool {
        match &self.dataset {
            Some(dataset) => self.config.toggle_sort(&dataset.schema, column),
            None => false,
        }
    }

    pub fn clear_sort(&mut self) {
        self.config.clear_sort();
    }

    pub fn set_metric_aggregation(&mut self, metric: &str, kind: AggregationKind) -> bool {
        match &self.dataset {
            Some(dataset) => self.config.set_metric_aggregation(&dataset.schema, metric, kind),
            None => false,
        }
    }

    pub fn reset_filters(&mut self) {
        self.config.clear_filters();
    }

    // ========================================================================
    // DERIVED DATA
    // ========================================================================

    fn loaded(&self) -> Result<&Dataset, DashboardError> {
        self.dataset.as_ref().ok_or(DashboardError::NoDataset)
    }

    /// Runs the pipeline over the current dataset and config.
    pub fn view(&self) -> Result<SessionView, DashboardError> {
        let dataset = self.loaded()?;
        let output = PipelineCalculator::new(&dataset.schema, &self.config).calculate(&dataset.rows);
        let columns = output
            .column_names(&dataset.schema)
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(SessionView {
            generation: self.generation,
            columns,
            output,
        })
    }

    /// Slider bounds for a raw range filter: the metric's span over the
    /// whole dataset.
    pub fn raw_bounds(&self, metric: &str) -> Option<(f64, f64)> {
        let dataset = self.dataset.as_ref()?;
        let column = dataset.schema.metric_position(metric)?;
        metric_bounds(&dataset.rows, column)
    }

    /// Slider bounds for an aggregated range filter: the metric's span over
    /// the aggregated rows before any aggregated range applies.
    pub fn aggregated_bounds(&self, metric: &str) -> Option<(f64, f64)> {
        let dataset = self.dataset.as_ref()?;
        let column = dataset.schema.metric_position(metric)?;
        let aggregated = PipelineCalculator::new(&dataset.schema, &self.config).aggregate(&dataset.rows);
        metric_bounds(&aggregated, column)
    }

    /// Distinct values of a dimension, ordered for its filter panel.
    pub fn dimension_values(&self, dimension: &str) -> Vec<String> {
        let Some(dataset) = &self.dataset else {
            return Vec::new();
        };
        let Some(column) = dataset.schema.dimension_position(dimension) else {
            return Vec::new();
        };
        let filter = self.config.dimension_filter(dimension);
        dimension_value_listing(&dataset.rows, column, filter.include, filter.exclude)
    }

    /// Colour of a cell. `None` for columns without colour coding.
    pub fn color_for(&self, column: &str, value: &CellValue) -> Option<MetricColor> {
        let descriptor = self.dataset.as_ref()?.schema.column(column)?;
        if !descriptor.has_color_coding() {
            return None;
        }
        Some(metric_color(value, &self.settings.thresholds))
    }

    // ========================================================================
    // SAVED VIEWS
    // ========================================================================

    pub fn save_view<S: ViewStore>(
        &self,
        store: &mut S,
        name: &str,
        description: &str,
    ) -> Result<SavedView, DashboardError> {
        let config = ViewConfig {
            title: Some(self.settings.title.clone()).filter(|t| !t.is_empty()),
            thresholds: Some(self.settings.thresholds),
            pipeline: self.config.clone(),
        };
        Ok(store.save_view(name, description, &config)?)
    }

    /// Applies a saved view to the current dataset and returns the resulting
    /// view. The dataset is not re-fetched.
    pub fn load_view<S: ViewStore>(&mut self, store: &S, id: ViewId) -> Result<SessionView, DashboardError> {
        let saved = store.load_view(id)?;
        self.loaded()?;

        if let Some(title) = saved.config.title {
            self.settings.title = title;
        }
        if let Some(thresholds) = saved.config.thresholds {
            self.settings.thresholds = thresholds;
        }
        self.config = saved.config.pipeline;
        log::info!("applied saved view id={} name={}", saved.id, saved.name);
        self.view()
    }
}

fn complete_initial(mut config: PipelineConfig, defaults: PipelineConfig) -> PipelineConfig {
    if config.selected_dimensions.is_empty() {
        config.selected_dimensions = defaults.selected_dimensions;
    }
    if config.visible_columns.is_empty() {
        config.visible_columns = defaults.visible_columns;
    }
    if config.count_column.is_none() {
        config.count_column = defaults.count_column;
    }
    config
}
