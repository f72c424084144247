//! Core entity structs for the Gridlock traffic simulation.
//!
//! Covers the live simulation entities ([`Route`], [`Vehicle`]), the
//! persisted time-series record ([`TrafficSample`]), and the derived
//! analytic records ([`CongestionPoint`], [`TravelTimeSummary`],
//! [`RouteSpeedStats`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{CongestionLevel, VehicleClass};
use crate::geo::{self, Point};
use crate::ids::{RouteId, VehicleId};

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// A fixed straight-line route between two points on the map.
///
/// Routes are immutable after creation: the catalog is generated once at
/// startup and owned by the engine for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Unique route identifier.
    pub id: RouteId,
    /// Human-readable display name.
    pub name: String,
    /// Where vehicles enter the route.
    pub start: Point,
    /// Where vehicles leave the route.
    pub end: Point,
    /// Straight-line length in kilometers, derived from the endpoints.
    pub distance_km: f64,
    /// Posted speed limit in km/h.
    pub speed_limit: f64,
}

impl Route {
    /// Create a route, deriving its length from the endpoints.
    pub fn new(id: RouteId, name: impl Into<String>, start: Point, end: Point, speed_limit: f64) -> Self {
        Self {
            id,
            name: name.into(),
            start,
            end,
            distance_km: geo::units_to_km(start.distance_to(end)),
            speed_limit,
        }
    }

    /// Unit direction vector from start to end.
    ///
    /// `None` for a degenerate route whose endpoints coincide.
    pub fn heading(&self) -> Option<(f64, f64)> {
        self.start.direction_to(self.end)
    }
}

// ---------------------------------------------------------------------------
// Vehicle
// ---------------------------------------------------------------------------

/// A vehicle currently active in the simulation registry.
///
/// Invariant: `0 <= current_speed <= max_speed` at every tick. The
/// kinematics step clamps into that range and the congestion modulator
/// only ever scales speed down (with a positive floor), so the invariant
/// holds across all mutation paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Unique identifier while active.
    pub id: VehicleId,
    /// Vehicle category, fixed at spawn.
    pub class: VehicleClass,
    /// Current speed in km/h.
    pub current_speed: f64,
    /// Maximum speed in km/h this vehicle can reach.
    pub max_speed: f64,
    /// The route this vehicle travels.
    pub route_id: RouteId,
    /// Current position on the map.
    pub position: Point,
    /// When the vehicle state was last recomputed.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// TrafficSample
// ---------------------------------------------------------------------------

/// One time-series observation of a vehicle, as persisted by the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    /// The observed vehicle.
    pub vehicle_id: VehicleId,
    /// The route the vehicle was on.
    pub route_id: RouteId,
    /// Speed at observation time, km/h.
    pub speed: f64,
    /// Position at observation time.
    pub position: Point,
    /// Observation timestamp.
    pub recorded_at: DateTime<Utc>,
}

impl TrafficSample {
    /// Capture a sample from the vehicle's current state.
    pub fn of(vehicle: &Vehicle) -> Self {
        Self {
            vehicle_id: vehicle.id,
            route_id: vehicle.route_id,
            speed: vehicle.current_speed,
            position: vehicle.position,
            recorded_at: vehicle.updated_at,
        }
    }
}

/// A traffic sample joined with the metadata of its route.
///
/// This is the shape analytics consume: the raw sample plus the route
/// name and speed limit the persistence sink joins in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficObservation {
    /// The underlying time-series sample.
    pub sample: TrafficSample,
    /// Display name of the sample's route.
    pub route_name: String,
    /// Posted speed limit of the sample's route, km/h.
    pub speed_limit: f64,
}

// ---------------------------------------------------------------------------
// CongestionPoint
// ---------------------------------------------------------------------------

/// A congestion cell detected by the spatial congestion scan.
///
/// Immutable once produced; carries no back-reference to the vehicles
/// that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionPoint {
    /// The route whose samples produced this cell.
    pub route_id: RouteId,
    /// Geometric center of the congested grid cell.
    pub location: Point,
    /// Classified severity.
    pub level: CongestionLevel,
    /// Mean speed observed in the cell, km/h.
    pub average_speed: f64,
    /// Number of samples observed in the cell.
    pub vehicle_count: u32,
    /// When the detection ran.
    pub detected_at: DateTime<Utc>,
}

/// A congestion point joined with its route's display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionObservation {
    /// The stored congestion point.
    pub point: CongestionPoint,
    /// Display name of the point's route.
    pub route_name: String,
}

// ---------------------------------------------------------------------------
// TravelTimeSummary
// ---------------------------------------------------------------------------

/// Per-route aggregate of estimated travel times, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelTimeSummary {
    /// The summarized route.
    pub route_id: RouteId,
    /// Display name of the route.
    pub route_name: String,
    /// Mean estimated travel time across contributing vehicles.
    pub mean_minutes: f64,
    /// Fastest estimate.
    pub min_minutes: f64,
    /// Slowest estimate.
    pub max_minutes: f64,
    /// Population standard deviation of the estimates.
    pub std_dev_minutes: f64,
    /// Number of vehicles that contributed an estimate.
    pub sample_size: u32,
}

// ---------------------------------------------------------------------------
// RouteSpeedStats
// ---------------------------------------------------------------------------

/// Per-route speed aggregates over a sampling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpeedStats {
    /// The aggregated route.
    pub route_id: RouteId,
    /// Display name of the route.
    pub route_name: String,
    /// Posted speed limit, km/h.
    pub speed_limit: f64,
    /// Mean observed speed, km/h.
    pub avg_speed: f64,
    /// Slowest observed speed, km/h.
    pub min_speed: f64,
    /// Fastest observed speed, km/h.
    pub max_speed: f64,
    /// Total samples in the window.
    pub sample_count: u64,
    /// Distinct vehicles observed in the window.
    pub distinct_vehicles: u64,
}

/// Row counts removed by a retention purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    /// Rows deleted from the traffic time series.
    pub traffic_deleted: u64,
    /// Rows deleted from the congestion history.
    pub congestion_deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_distance_is_derived_in_km() {
        let route = Route::new(
            RouteId::new(),
            "Main Street",
            Point::new(0.0, 0.0),
            Point::new(300.0, 400.0),
            60.0,
        );
        // 500 units at 100 units/km.
        assert!((route.distance_km - 5.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_route_has_no_heading() {
        let p = Point::new(12.0, 34.0);
        let route = Route::new(RouteId::new(), "Loop", p, p, 50.0);
        assert!(route.heading().is_none());
        assert!(route.distance_km.abs() < f64::EPSILON);
    }

    #[test]
    fn sample_captures_vehicle_state() {
        let vehicle = Vehicle {
            id: VehicleId::new(),
            class: VehicleClass::Bus,
            current_speed: 42.0,
            max_speed: 80.0,
            route_id: RouteId::new(),
            position: Point::new(1.0, 2.0),
            updated_at: Utc::now(),
        };
        let sample = TrafficSample::of(&vehicle);
        assert_eq!(sample.vehicle_id, vehicle.id);
        assert_eq!(sample.route_id, vehicle.route_id);
        assert!((sample.speed - 42.0).abs() < f64::EPSILON);
        assert_eq!(sample.recorded_at, vehicle.updated_at);
    }
}
