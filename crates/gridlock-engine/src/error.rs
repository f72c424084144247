//! Error types for engine startup.
//!
//! Startup failures are fatal by design: a simulation that cannot load
//! its configuration, reach its database, or seed its catalog must not
//! come up half-alive. Steady-state failures never use these types --
//! they are logged and survived at tick granularity.

use gridlock_db::SinkError;
use gridlock_sim::{CatalogError, ConfigError};

/// Errors that abort engine startup.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The analytics config section could not be parsed.
    #[error("analytics configuration error: {message}")]
    AnalyticsConfig {
        /// Explanation of the parse failure.
        message: String,
    },

    /// Route catalog generation failed.
    #[error("catalog error: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: CatalogError,
    },

    /// The persistence sink failed during startup.
    #[error("sink error: {source}")]
    Sink {
        /// The underlying sink error.
        #[from]
        source: SinkError,
    },
}
