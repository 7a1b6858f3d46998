//! FILENAME: core/dashboard/src/lib.rs
//! Metrics card orchestration.
//!
//! Wires a query executor, card settings and a view store around the pure
//! metrics engine. The engine never performs I/O; everything stateful about
//! a card lives in `MetricsSession`.

mod error;
mod executor;
mod session;
mod settings;

pub use error::DashboardError;
pub use executor::{ExecutorError, QueryExecutor, QueryResult};
pub use session::{MetricsSession, SessionView};
pub use settings::{CardSettings, DEFAULT_DATABASE, DEFAULT_VISIBLE_METRICS};
