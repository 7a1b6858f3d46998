//! FILENAME: core/persistence/src/error.rs

use thiserror::Error;

use crate::ViewId;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("View not found: {0}")]
    ViewNotFound(ViewId),

    #[error("Invalid view name: {0:?}")]
    InvalidName(String),
}
