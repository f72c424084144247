//! Travel-time estimation from recent traffic samples.
//!
//! For each vehicle the estimator reconstructs traveled distance as the
//! sum of straight-line hops between its consecutive samples, converts
//! it to kilometers through the shared position-unit scale, and divides
//! by the vehicle's mean speed. Per-route summaries aggregate the
//! per-vehicle estimates.
//!
//! Like the congestion scan, this is a stateless read-only batch.

use std::collections::BTreeMap;

use chrono::Duration;
use gridlock_db::TrafficSink;
use gridlock_types::{RouteId, TrafficObservation, TrafficSample, TravelTimeSummary, VehicleId, units_to_km};
use tracing::{info, warn};

use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;

/// Minimum samples a vehicle needs to contribute an estimate.
const MIN_SAMPLES: usize = 2;

/// Floor for reconstructed distance, guarding the division for
/// near-stationary vehicles.
const MIN_DISTANCE_KM: f64 = 0.1;

/// Estimate one vehicle's travel time in minutes.
///
/// Samples are ordered by time before distance reconstruction. Returns
/// `None` when the vehicle has fewer than two samples or a non-positive
/// mean speed.
pub fn estimate_vehicle_minutes(samples: &[&TrafficSample]) -> Option<f64> {
    if samples.len() < MIN_SAMPLES {
        return None;
    }

    let mut ordered: Vec<&TrafficSample> = samples.to_vec();
    ordered.sort_by_key(|sample| sample.recorded_at);

    let mean_speed = ordered.iter().map(|s| s.speed).sum::<f64>() / ordered.len() as f64;
    if mean_speed <= 0.0 {
        return None;
    }

    let mut distance_units = 0.0;
    for pair in ordered.windows(2) {
        if let [previous, current] = pair {
            distance_units += previous.position.distance_to(current.position);
        }
    }
    let distance_km = units_to_km(distance_units).max(MIN_DISTANCE_KM);

    Some(distance_km / mean_speed * 60.0)
}

/// Estimate travel times for every route in a batch of observations.
///
/// Pure core of the estimator: groups samples by route, then by vehicle,
/// and aggregates the per-vehicle estimates. Routes where no vehicle
/// qualifies are omitted from the result.
pub fn estimate_routes(observations: &[TrafficObservation]) -> Vec<TravelTimeSummary> {
    let mut by_route: BTreeMap<RouteId, (String, BTreeMap<VehicleId, Vec<&TrafficSample>>)> =
        BTreeMap::new();
    for obs in observations {
        let entry = by_route
            .entry(obs.sample.route_id)
            .or_insert_with(|| (obs.route_name.clone(), BTreeMap::new()));
        entry.1.entry(obs.sample.vehicle_id).or_default().push(&obs.sample);
    }

    let mut summaries = Vec::new();
    for (route_id, (route_name, vehicles)) in by_route {
        let estimates: Vec<f64> = vehicles
            .values()
            .filter_map(|samples| estimate_vehicle_minutes(samples))
            .collect();
        if let Some(summary) = summarize(route_id, route_name, &estimates) {
            summaries.push(summary);
        }
    }
    summaries
}

/// Fetch the configured window from the sink and estimate travel times.
///
/// An empty window is an empty result, not an error.
///
/// # Errors
///
/// Returns [`AnalyticsError::Sink`] if the traffic fetch fails.
pub async fn estimate_travel_times<S: TrafficSink>(
    sink: &S,
    config: &AnalyticsConfig,
) -> Result<Vec<TravelTimeSummary>, AnalyticsError> {
    let window = Duration::hours(config.travel_time_window_hours);
    let observations = sink.fetch_recent_traffic(window).await?;
    if observations.is_empty() {
        warn!("No traffic data available for travel time analysis");
        return Ok(Vec::new());
    }

    let summaries = estimate_routes(&observations);
    info!(routes = summaries.len(), "Travel time estimation completed");
    Ok(summaries)
}

/// Aggregate per-vehicle estimates into a route summary.
fn summarize(
    route_id: RouteId,
    route_name: String,
    estimates: &[f64],
) -> Option<TravelTimeSummary> {
    let first = estimates.first()?;
    let mut min_minutes = *first;
    let mut max_minutes = *first;
    let mut sum = 0.0;
    for estimate in estimates {
        min_minutes = min_minutes.min(*estimate);
        max_minutes = max_minutes.max(*estimate);
        sum += *estimate;
    }

    let count = estimates.len();
    let mean_minutes = sum / count as f64;
    let variance = estimates
        .iter()
        .map(|estimate| {
            let deviation = estimate - mean_minutes;
            deviation * deviation
        })
        .sum::<f64>()
        / count as f64;

    Some(TravelTimeSummary {
        route_id,
        route_name,
        mean_minutes,
        min_minutes,
        max_minutes,
        std_dev_minutes: variance.sqrt(),
        sample_size: u32::try_from(count).unwrap_or(u32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gridlock_types::Point;

    use super::*;

    fn sample_at(
        vehicle_id: VehicleId,
        route_id: RouteId,
        x: f64,
        speed: f64,
        offset_secs: i64,
    ) -> TrafficSample {
        TrafficSample {
            vehicle_id,
            route_id,
            speed,
            position: Point::new(x, 0.0),
            recorded_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn ten_km_at_sixty_kmh_is_ten_minutes() {
        let vehicle = VehicleId::new();
        let route = RouteId::new();
        // 1000 position units is 10 km.
        let a = sample_at(vehicle, route, 0.0, 60.0, 0);
        let b = sample_at(vehicle, route, 1000.0, 60.0, 60);
        let minutes = estimate_vehicle_minutes(&[&a, &b]);
        assert!(minutes.is_some());
        if let Some(minutes) = minutes {
            assert!((minutes - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn near_stationary_distance_is_floored() {
        let vehicle = VehicleId::new();
        let route = RouteId::new();
        // 1 position unit is 0.01 km, well under the 0.1 km floor.
        let a = sample_at(vehicle, route, 0.0, 60.0, 0);
        let b = sample_at(vehicle, route, 1.0, 60.0, 60);
        let minutes = estimate_vehicle_minutes(&[&a, &b]);
        if let Some(minutes) = minutes {
            assert!((minutes - 0.1).abs() < 1e-9);
        } else {
            assert!(minutes.is_some());
        }
    }

    #[test]
    fn out_of_order_samples_are_sorted_before_reconstruction() {
        let vehicle = VehicleId::new();
        let route = RouteId::new();
        let a = sample_at(vehicle, route, 0.0, 60.0, 0);
        let b = sample_at(vehicle, route, 500.0, 60.0, 60);
        let c = sample_at(vehicle, route, 1000.0, 60.0, 120);
        // Time order a-b-c walks 1000 units; the shuffled order would
        // double-count the middle hop.
        let minutes = estimate_vehicle_minutes(&[&b, &c, &a]);
        if let Some(minutes) = minutes {
            assert!((minutes - 10.0).abs() < 1e-9);
        } else {
            assert!(minutes.is_some());
        }
    }

    #[test]
    fn single_sample_or_stationary_vehicles_are_excluded() {
        let vehicle = VehicleId::new();
        let route = RouteId::new();
        let lone = sample_at(vehicle, route, 0.0, 60.0, 0);
        assert!(estimate_vehicle_minutes(&[&lone]).is_none());

        let parked_a = sample_at(vehicle, route, 0.0, 0.0, 0);
        let parked_b = sample_at(vehicle, route, 0.0, 0.0, 60);
        assert!(estimate_vehicle_minutes(&[&parked_a, &parked_b]).is_none());
    }

    #[test]
    fn route_summary_aggregates_vehicle_estimates() {
        let route = RouteId::new();
        let fast = VehicleId::new();
        let slow = VehicleId::new();
        let observations: Vec<TrafficObservation> = [
            // Fast vehicle: 10 km at 60 km/h -> 10 minutes.
            sample_at(fast, route, 0.0, 60.0, 0),
            sample_at(fast, route, 1000.0, 60.0, 60),
            // Slow vehicle: 10 km at 30 km/h -> 20 minutes.
            sample_at(slow, route, 0.0, 30.0, 0),
            sample_at(slow, route, 1000.0, 30.0, 60),
        ]
        .into_iter()
        .map(|sample| TrafficObservation {
            sample,
            route_name: String::from("Highway 1"),
            speed_limit: 100.0,
        })
        .collect();

        let summaries = estimate_routes(&observations);
        assert_eq!(summaries.len(), 1);
        let summary = summaries.first().cloned();
        if let Some(summary) = summary {
            assert_eq!(summary.sample_size, 2);
            assert!((summary.mean_minutes - 15.0).abs() < 1e-9);
            assert!((summary.min_minutes - 10.0).abs() < 1e-9);
            assert!((summary.max_minutes - 20.0).abs() < 1e-9);
            // Population standard deviation of {10, 20}.
            assert!((summary.std_dev_minutes - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn routes_without_qualifying_vehicles_are_omitted() {
        let route = RouteId::new();
        let vehicle = VehicleId::new();
        let observations = vec![TrafficObservation {
            sample: sample_at(vehicle, route, 0.0, 60.0, 0),
            route_name: String::from("Broadway"),
            speed_limit: 60.0,
        }];

        assert!(estimate_routes(&observations).is_empty());
    }

    #[tokio::test]
    async fn estimation_over_memory_sink() {
        use gridlock_db::MemorySink;
        use gridlock_types::Route;

        let sink = MemorySink::new();
        let route = Route::new(
            RouteId::new(),
            "Park Avenue",
            Point::new(0.0, 0.0),
            Point::new(1000.0, 0.0),
            80.0,
        );
        sink.insert_routes(&[route.clone()]).await.ok();

        let vehicle = VehicleId::new();
        for (x, offset) in [(0.0, 0i64), (500.0, 60), (1000.0, 120)] {
            sink.append_traffic_sample(&sample_at(vehicle, route.id, x, 60.0, offset))
                .await
                .ok();
        }

        let summaries = estimate_travel_times(&sink, &AnalyticsConfig::default())
            .await
            .unwrap_or_default();
        assert_eq!(summaries.len(), 1);
        assert_eq!(
            summaries.first().map(|s| s.route_name.clone()),
            Some(String::from("Park Avenue"))
        );
    }
}
