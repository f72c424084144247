//! In-process [`TrafficSink`] for tests and database-less runs.
//!
//! [`MemorySink`] mirrors the `PostgreSQL` sink's observable semantics --
//! duplicate-ignoring route inserts, mutable-field-only vehicle upserts,
//! route-join reads that drop samples for unknown routes -- over plain
//! collections behind a [`tokio::sync::Mutex`]. Scheduler and analytics
//! tests run against it without any infrastructure.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use gridlock_types::{
    CongestionObservation, CongestionPoint, PurgeSummary, Route, RouteId, RouteSpeedStats,
    TrafficObservation, TrafficSample, Vehicle, VehicleId,
};
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::sink::TrafficSink;

/// Backing collections for [`MemorySink`].
#[derive(Debug, Default)]
struct MemoryState {
    /// Route catalog keyed by route ID.
    routes: BTreeMap<RouteId, Route>,
    /// Latest vehicle state keyed by vehicle ID.
    vehicles: BTreeMap<VehicleId, Vehicle>,
    /// Append-only traffic time series.
    samples: Vec<TrafficSample>,
    /// Append-only congestion history.
    congestion: Vec<CongestionPoint>,
}

/// An in-memory traffic sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vehicles currently stored.
    pub async fn vehicle_count(&self) -> usize {
        self.state.lock().await.vehicles.len()
    }

    /// Number of traffic samples currently stored.
    pub async fn sample_count(&self) -> usize {
        self.state.lock().await.samples.len()
    }

    /// Number of congestion points currently stored.
    pub async fn congestion_count(&self) -> usize {
        self.state.lock().await.congestion.len()
    }
}

impl TrafficSink for MemorySink {
    async fn upsert_vehicle(&self, vehicle: &Vehicle) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        state
            .vehicles
            .entry(vehicle.id)
            .and_modify(|existing| {
                existing.current_speed = vehicle.current_speed;
                existing.position = vehicle.position;
                existing.updated_at = vehicle.updated_at;
            })
            .or_insert_with(|| vehicle.clone());
        Ok(())
    }

    async fn append_traffic_sample(&self, sample: &TrafficSample) -> Result<(), SinkError> {
        self.state.lock().await.samples.push(sample.clone());
        Ok(())
    }

    async fn insert_routes(&self, routes: &[Route]) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        for route in routes {
            state.routes.entry(route.id).or_insert_with(|| route.clone());
        }
        Ok(())
    }

    async fn insert_congestion_point(&self, point: &CongestionPoint) -> Result<(), SinkError> {
        self.state.lock().await.congestion.push(point.clone());
        Ok(())
    }

    async fn fetch_recent_traffic(
        &self,
        since: Duration,
    ) -> Result<Vec<TrafficObservation>, SinkError> {
        let cutoff = Utc::now() - since;
        let state = self.state.lock().await;

        let mut observations: Vec<TrafficObservation> = state
            .samples
            .iter()
            .filter(|sample| sample.recorded_at >= cutoff)
            .filter_map(|sample| {
                state.routes.get(&sample.route_id).map(|route| TrafficObservation {
                    sample: sample.clone(),
                    route_name: route.name.clone(),
                    speed_limit: route.speed_limit,
                })
            })
            .collect();

        observations.sort_by_key(|obs| obs.sample.recorded_at);
        Ok(observations)
    }

    async fn fetch_recent_congestion(
        &self,
        since: Duration,
    ) -> Result<Vec<CongestionObservation>, SinkError> {
        let cutoff = Utc::now() - since;
        let state = self.state.lock().await;

        let mut observations: Vec<CongestionObservation> = state
            .congestion
            .iter()
            .filter(|point| point.detected_at >= cutoff)
            .filter_map(|point| {
                state.routes.get(&point.route_id).map(|route| CongestionObservation {
                    point: point.clone(),
                    route_name: route.name.clone(),
                })
            })
            .collect();

        observations.sort_by_key(|obs| std::cmp::Reverse(obs.point.detected_at));
        Ok(observations)
    }

    async fn fetch_route_statistics(
        &self,
        window: Duration,
    ) -> Result<Vec<RouteSpeedStats>, SinkError> {
        let cutoff = Utc::now() - window;
        let state = self.state.lock().await;

        let mut grouped: BTreeMap<RouteId, Vec<&TrafficSample>> = BTreeMap::new();
        for sample in state
            .samples
            .iter()
            .filter(|sample| sample.recorded_at >= cutoff)
        {
            grouped.entry(sample.route_id).or_default().push(sample);
        }

        let mut stats: Vec<RouteSpeedStats> = grouped
            .into_iter()
            .filter_map(|(route_id, samples)| {
                let route = state.routes.get(&route_id)?;
                let stats = speed_stats(route, &samples)?;
                Some(stats)
            })
            .collect();

        stats.sort_by(|a, b| {
            a.avg_speed
                .partial_cmp(&b.avg_speed)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(stats)
    }

    async fn purge_older_than(&self, age: Duration) -> Result<PurgeSummary, SinkError> {
        let cutoff = Utc::now() - age;
        let mut state = self.state.lock().await;

        let samples_before = state.samples.len();
        state.samples.retain(|sample| sample.recorded_at >= cutoff);
        let congestion_before = state.congestion.len();
        state.congestion.retain(|point| point.detected_at >= cutoff);

        Ok(PurgeSummary {
            traffic_deleted: saturating_count(samples_before, state.samples.len()),
            congestion_deleted: saturating_count(congestion_before, state.congestion.len()),
        })
    }
}

/// Aggregate speed statistics for one route's windowed samples.
fn speed_stats(route: &Route, samples: &[&TrafficSample]) -> Option<RouteSpeedStats> {
    let first = samples.first()?;
    let mut min_speed = first.speed;
    let mut max_speed = first.speed;
    let mut sum = 0.0;
    let mut vehicles: Vec<VehicleId> = Vec::new();

    for sample in samples {
        min_speed = min_speed.min(sample.speed);
        max_speed = max_speed.max(sample.speed);
        sum += sample.speed;
        if !vehicles.contains(&sample.vehicle_id) {
            vehicles.push(sample.vehicle_id);
        }
    }

    let count = samples.len();
    Some(RouteSpeedStats {
        route_id: route.id,
        route_name: route.name.clone(),
        speed_limit: route.speed_limit,
        avg_speed: sum / count as f64,
        min_speed,
        max_speed,
        sample_count: count as u64,
        distinct_vehicles: vehicles.len() as u64,
    })
}

/// Difference between two collection sizes as a `u64`.
fn saturating_count(before: usize, after: usize) -> u64 {
    u64::try_from(before.saturating_sub(after)).unwrap_or_default()
}
