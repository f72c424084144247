//! Persistence layer for the Gridlock traffic simulation (`PostgreSQL`).
//!
//! The simulation core never talks to storage directly; it writes and
//! reads through the [`TrafficSink`] contract. This crate defines that
//! contract and its two implementations, plus the per-table store
//! operations the `PostgreSQL` sink is built from.
//!
//! # Architecture
//!
//! ```text
//! Scheduler tick                        Analytics sweep
//!     |                                     |
//!     +-- upsert_vehicle / append_sample    +-- fetch_recent_* / purge
//!     |                                     |
//!     v                                     v
//!             TrafficSink (trait)
//!             |                 |
//!     PostgresSink          MemorySink
//!     |-- RouteStore        (tests, db-less runs)
//!     |-- VehicleStore
//!     |-- TrafficStore
//!     +-- CongestionStore
//! ```
//!
//! # Modules
//!
//! - [`sink`] -- the `TrafficSink` contract
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`postgres_sink`] -- the production sink implementation
//! - [`route_store`] / [`vehicle_store`] / [`traffic_store`] /
//!   [`congestion_store`] -- per-table query operations
//! - [`memory`] -- in-process sink for tests
//! - [`error`] -- shared error type

pub mod congestion_store;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod postgres_sink;
pub mod route_store;
pub mod sink;
pub mod traffic_store;
pub mod vehicle_store;

// Re-export primary types for convenience.
pub use congestion_store::CongestionStore;
pub use error::SinkError;
pub use memory::MemorySink;
pub use postgres::{PostgresConfig, PostgresPool};
pub use postgres_sink::PostgresSink;
pub use route_store::RouteStore;
pub use sink::TrafficSink;
pub use traffic_store::TrafficStore;
pub use vehicle_store::VehicleStore;
