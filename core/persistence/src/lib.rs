//! FILENAME: core/persistence/src/lib.rs
//! Saved view persistence.
//!
//! A saved view is the configuration blob of a metrics card: the pipeline
//! config plus card presentation settings. Stores treat it as opaque JSON,
//! so a view written by one producer loads unchanged in another.

mod error;
mod json_store;

pub use error::PersistenceError;
pub use json_store::JsonFileStore;

use std::collections::BTreeMap;

use metrics_engine::{PipelineConfig, Thresholds};
use serde::{Deserialize, Serialize};

/// Identifier of a saved view within a store.
pub type ViewId = u64;

// ============================================================================
// VIEW CONFIG
// ============================================================================

/// The stored configuration object. Pipeline keys sit at the top level next
/// to the card settings, the layout saved views have always had.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,

    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl ViewConfig {
    pub fn new(pipeline: PipelineConfig) -> Self {
        ViewConfig {
            title: None,
            thresholds: None,
            pipeline,
        }
    }
}

// ============================================================================
// SAVED VIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedView {
    pub id: ViewId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config: ViewConfig,
}

// ============================================================================
// STORE INTERFACE
// ============================================================================

/// Accepts and returns saved views.
pub trait ViewStore {
    fn save_view(
        &mut self,
        name: &str,
        description: &str,
        config: &ViewConfig,
    ) -> Result<SavedView, PersistenceError>;

    fn load_view(&self, id: ViewId) -> Result<SavedView, PersistenceError>;

    /// All views, ordered by id.
    fn list_views(&self) -> Result<Vec<SavedView>, PersistenceError>;

    fn delete_view(&mut self, id: ViewId) -> Result<(), PersistenceError>;
}

/// Trims and checks a view name. Blank names are rejected.
pub(crate) fn validate_name(name: &str) -> Result<String, PersistenceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PersistenceError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Keeps serialized views in memory. Views go through JSON on the way in and
/// out, exactly as they would through a remote store.
#[derive(Debug, Default)]
pub struct MemoryViewStore {
    views: BTreeMap<ViewId, String>,
    next_id: ViewId,
}

impl MemoryViewStore {
    pub fn new() -> Self {
        MemoryViewStore {
            views: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl ViewStore for MemoryViewStore {
    fn save_view(
        &mut self,
        name: &str,
        description: &str,
        config: &ViewConfig,
    ) -> Result<SavedView, PersistenceError> {
        let view = SavedView {
            id: self.next_id.max(1),
            name: validate_name(name)?,
            description: description.to_string(),
            config: config.clone(),
        };
        let json = serde_json::to_string(&view)?;

        self.views.insert(view.id, json);
        self.next_id = view.id + 1;
        log::info!("saved view id={} name={}", view.id, view.name);
        Ok(view)
    }

    fn load_view(&self, id: ViewId) -> Result<SavedView, PersistenceError> {
        let json = self.views.get(&id).ok_or(PersistenceError::ViewNotFound(id))?;
        Ok(serde_json::from_str(json)?)
    }

    fn list_views(&self) -> Result<Vec<SavedView>, PersistenceError> {
        self.views
            .values()
            .map(|json| serde_json::from_str(json).map_err(PersistenceError::from))
            .collect()
    }

    fn delete_view(&mut self, id: ViewId) -> Result<(), PersistenceError> {
        self.views
            .remove(&id)
            .map(|_| ())
            .ok_or(PersistenceError::ViewNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_engine::SortDirection;

    pub(crate) fn create_test_config() -> ViewConfig {
        let mut pipeline = PipelineConfig::default();
        pipeline.selected_dimensions.push("manager__dim".to_string());
        pipeline.visible_columns.push("score__metric__pct".to_string());
        pipeline.toggle_filter_enabled("manager__dim");
        pipeline.set_include_filter("manager__dim", "anna, bob");
        pipeline.set_metric_range("score__metric__pct", (1.5, 4.0));
        pipeline.sort_columns.push("score__metric__pct".to_string());
        pipeline.sort_orders.insert("score__metric__pct".to_string(), SortDirection::Desc);

        ViewConfig {
            title: Some("Managers".to_string()),
            thresholds: Some(Thresholds::default()),
            pipeline,
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryViewStore::new();
        let config = create_test_config();

        let saved = store.save_view(" Team view ", "weekly", &config).unwrap();
        assert_eq!(saved.id, 1);
        assert_eq!(saved.name, "Team view");

        let loaded = store.load_view(saved.id).unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.config.pipeline, config.pipeline);
    }

    #[test]
    fn test_memory_store_ids_and_delete() {
        let mut store = MemoryViewStore::new();
        let config = ViewConfig::default();
        let a = store.save_view("a", "", &config).unwrap();
        let b = store.save_view("b", "", &config).unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        store.delete_view(a.id).unwrap();
        let names: Vec<String> = store.list_views().unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["b"]);

        assert!(matches!(store.load_view(a.id), Err(PersistenceError::ViewNotFound(1))));
        assert!(matches!(store.delete_view(a.id), Err(PersistenceError::ViewNotFound(1))));
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let mut store = MemoryViewStore::new();
        let result = store.save_view("   ", "", &ViewConfig::default());
        assert!(matches!(result, Err(PersistenceError::InvalidName(_))));
        assert!(store.list_views().unwrap().is_empty());
    }

    #[test]
    fn test_config_layout_is_flat() {
        let json = serde_json::to_value(create_test_config()).unwrap();
        assert_eq!(json["title"], "Managers");
        assert_eq!(json["thresholds"]["red"], 2.2);
        assert_eq!(json["selectedDimensions"][0], "manager__dim");
        assert_eq!(json["dimensionFilters"]["manager__dim"], "anna, bob");
        assert_eq!(json["enabledFilters"]["manager__dim"], true);
        assert_eq!(json["sortOrders"]["score__metric__pct"], "desc");
    }

    #[test]
    fn test_loads_config_written_elsewhere() {
        let json = r#"{
            "title": "Climate",
            "thresholds": {"red": 2.2, "yellow": 4.0},
            "dimensionFilters": {"manager__dim": "ann"},
            "dimensionExcludes": {},
            "enabledFilters": {"manager__dim": true},
            "metricRanges": {},
            "aggMetricRanges": {"score__metric__pct": [2, 5]},
            "visibleColumns": ["score__metric__pct"],
            "selectedDimensions": ["manager__dim"],
            "sortColumns": ["score__metric__pct"],
            "sortOrders": {"score__metric__pct": "asc"}
        }"#;
        let config: ViewConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.title.as_deref(), Some("Climate"));
        assert_eq!(config.pipeline.agg_metric_ranges["score__metric__pct"], (2.0, 5.0));
        assert!(config.pipeline.is_filter_enabled("manager__dim"));
    }
}
