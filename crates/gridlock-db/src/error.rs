//! Error types for the persistence layer.
//!
//! All errors are propagated via [`SinkError`], which wraps the underlying
//! [`sqlx`] errors with context about which operation failed. Callers in
//! the simulation loop treat these as isolated, loggable failures; only
//! startup code treats them as fatal.

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
