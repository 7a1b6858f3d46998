//! FILENAME: core/dashboard/src/settings.rs

use metrics_engine::Thresholds;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE: &str = "trino";
pub const DEFAULT_VISIBLE_METRICS: usize = 3;

/// Presentation settings of one metrics card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardSettings {
    pub title: String,
    /// Database the card's SQL runs against.
    pub database: String,
    pub thresholds: Thresholds,
    /// Metrics made visible when defaults are applied to a fresh result.
    pub visible_metrics: usize,
    /// Count column used for PCT weighting and the funnel unit count.
    /// Falls back to the `employee_count` convention when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_column: Option<String>,
}

impl Default for CardSettings {
    fn default() -> Self {
        CardSettings {
            title: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            thresholds: Thresholds::default(),
            visible_metrics: DEFAULT_VISIBLE_METRICS,
            count_column: None,
        }
    }
}

impl CardSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
