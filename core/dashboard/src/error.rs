//! FILENAME: core/dashboard/src/error.rs

use persistence::PersistenceError;
use thiserror::Error;

use crate::executor::ExecutorError;

#[derive(Error, Debug)]
pub enum DashboardError {
    /// The executor answered, but without any columns.
    #[error("No data returned from query")]
    NoData,

    /// The executor itself failed.
    #[error("Query execution failed: {0}")]
    Executor(#[from] ExecutorError),

    #[error("No query result loaded")]
    NoDataset,

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
