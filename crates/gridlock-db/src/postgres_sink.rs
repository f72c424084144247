//! The production [`TrafficSink`] backed by `PostgreSQL`.

use chrono::{Duration, Utc};
use gridlock_types::{
    CongestionObservation, CongestionPoint, PurgeSummary, Route, RouteSpeedStats,
    TrafficObservation, TrafficSample, Vehicle,
};

use crate::congestion_store::CongestionStore;
use crate::error::SinkError;
use crate::postgres::PostgresPool;
use crate::route_store::RouteStore;
use crate::sink::TrafficSink;
use crate::traffic_store::TrafficStore;
use crate::vehicle_store::VehicleStore;

/// [`TrafficSink`] implementation over a `PostgreSQL` pool.
///
/// Thin delegation layer: each contract method maps onto one of the
/// per-table stores. The sink is `Clone` (the pool is reference-counted)
/// so the scheduler and the analytics sweep can hold it concurrently.
#[derive(Clone)]
pub struct PostgresSink {
    pool: PostgresPool,
}

impl PostgresSink {
    /// Create a sink over an established connection pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// Return the underlying pool handle.
    pub const fn pool(&self) -> &PostgresPool {
        &self.pool
    }
}

impl TrafficSink for PostgresSink {
    async fn upsert_vehicle(&self, vehicle: &Vehicle) -> Result<(), SinkError> {
        VehicleStore::new(self.pool.pool()).upsert(vehicle).await
    }

    async fn append_traffic_sample(&self, sample: &TrafficSample) -> Result<(), SinkError> {
        TrafficStore::new(self.pool.pool()).append(sample).await
    }

    async fn insert_routes(&self, routes: &[Route]) -> Result<(), SinkError> {
        RouteStore::new(self.pool.pool()).insert_routes(routes).await
    }

    async fn insert_congestion_point(&self, point: &CongestionPoint) -> Result<(), SinkError> {
        CongestionStore::new(self.pool.pool()).insert(point).await
    }

    async fn fetch_recent_traffic(
        &self,
        since: Duration,
    ) -> Result<Vec<TrafficObservation>, SinkError> {
        let cutoff = Utc::now() - since;
        TrafficStore::new(self.pool.pool()).recent(cutoff).await
    }

    async fn fetch_recent_congestion(
        &self,
        since: Duration,
    ) -> Result<Vec<CongestionObservation>, SinkError> {
        let cutoff = Utc::now() - since;
        CongestionStore::new(self.pool.pool()).recent(cutoff).await
    }

    async fn fetch_route_statistics(
        &self,
        window: Duration,
    ) -> Result<Vec<RouteSpeedStats>, SinkError> {
        let cutoff = Utc::now() - window;
        RouteStore::new(self.pool.pool())
            .speed_statistics(cutoff)
            .await
    }

    async fn purge_older_than(&self, age: Duration) -> Result<PurgeSummary, SinkError> {
        let cutoff = Utc::now() - age;
        let traffic_deleted = TrafficStore::new(self.pool.pool())
            .purge_before(cutoff)
            .await?;
        let congestion_deleted = CongestionStore::new(self.pool.pool())
            .purge_before(cutoff)
            .await?;

        tracing::info!(
            traffic_deleted,
            congestion_deleted,
            "Purged aged traffic history"
        );

        Ok(PurgeSummary {
            traffic_deleted,
            congestion_deleted,
        })
    }
}
