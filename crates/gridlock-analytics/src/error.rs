//! Error types for the analytics crate.

use gridlock_db::SinkError;

/// Errors that can occur while running a batch analysis.
///
/// Absence of data is never an error -- an empty window produces an
/// empty result. Only sink failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// Reading from or writing to the persistence sink failed.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}
