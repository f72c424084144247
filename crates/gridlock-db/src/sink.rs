//! The persistence contract consumed by the simulation and analytics.
//!
//! [`TrafficSink`] is the narrow seam between the in-memory simulation
//! and durable storage. The scheduler writes through it once per vehicle
//! per tick; the analytics read recent history back through it. Two
//! implementations exist:
//!
//! - [`PostgresSink`](crate::PostgresSink) -- the production store
//! - [`MemorySink`](crate::MemorySink) -- an in-process store for tests
//!   and database-less runs
//!
//! Every method returns an explicit [`SinkError`]; a sink never panics
//! into its caller. Whether a failure is fatal is the caller's decision:
//! the scheduler logs and continues, startup aborts.

use std::future::Future;

use chrono::Duration;
use gridlock_types::{
    CongestionObservation, CongestionPoint, PurgeSummary, Route, RouteSpeedStats,
    TrafficObservation, TrafficSample, Vehicle,
};

use crate::error::SinkError;

/// Write and read operations against the traffic store.
///
/// Methods return `Send` futures so a sink can be driven from the
/// scheduler's background task.
pub trait TrafficSink: Send + Sync {
    /// Insert or update the current state of a vehicle.
    ///
    /// Idempotent per vehicle identifier: repeated upserts of the same
    /// vehicle overwrite the mutable fields and nothing else.
    fn upsert_vehicle(
        &self,
        vehicle: &Vehicle,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Append one observation to the traffic time series.
    fn append_traffic_sample(
        &self,
        sample: &TrafficSample,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Bulk-insert the route catalog, ignoring routes already present.
    ///
    /// Called once at startup; a failure here is fatal to startup.
    fn insert_routes(
        &self,
        routes: &[Route],
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Append one detected congestion point.
    fn insert_congestion_point(
        &self,
        point: &CongestionPoint,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Fetch traffic samples recorded within the trailing window, joined
    /// with their route metadata, oldest first.
    ///
    /// An empty window is an empty result, not an error.
    fn fetch_recent_traffic(
        &self,
        since: Duration,
    ) -> impl Future<Output = Result<Vec<TrafficObservation>, SinkError>> + Send;

    /// Fetch congestion points detected within the trailing window,
    /// joined with their route names, newest first.
    fn fetch_recent_congestion(
        &self,
        since: Duration,
    ) -> impl Future<Output = Result<Vec<CongestionObservation>, SinkError>> + Send;

    /// Aggregate per-route speed statistics over the trailing window,
    /// slowest routes first. Routes without samples are omitted.
    fn fetch_route_statistics(
        &self,
        window: Duration,
    ) -> impl Future<Output = Result<Vec<RouteSpeedStats>, SinkError>> + Send;

    /// Delete traffic samples and congestion points older than `age`.
    fn purge_older_than(
        &self,
        age: Duration,
    ) -> impl Future<Output = Result<PurgeSummary, SinkError>> + Send;
}
