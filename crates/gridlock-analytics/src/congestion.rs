//! Spatial congestion detection over recent traffic samples.
//!
//! The detector partitions each route's recent samples into a square
//! grid aligned to the bounding box of the observed positions, then
//! classifies each sufficiently-populated cell by mean speed and sample
//! count. Classification is precedence-ordered: a cell that satisfies
//! both the `high` and `low` conditions reports only `high`.
//!
//! The scan is a stateless, read-only batch: it never touches live
//! simulation state and may run concurrently with the scheduler.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use gridlock_db::TrafficSink;
use gridlock_types::{CongestionLevel, CongestionPoint, Point, RouteId, TrafficSample};
use tracing::{debug, info, warn};

use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;

/// Classify a cell by mean speed and sample count.
///
/// Checks run in severity order -- `high`, then `medium`, then `low` --
/// and the first match wins. Returns `None` for cells too sparse to
/// classify, which emit nothing.
pub fn classify(config: &AnalyticsConfig, avg_speed: f64, count: u32) -> Option<CongestionLevel> {
    if avg_speed <= config.high_speed_threshold && count >= config.high_count {
        Some(CongestionLevel::High)
    } else if avg_speed <= config.medium_speed_threshold && count >= config.medium_count {
        Some(CongestionLevel::Medium)
    } else if count >= config.min_cell_vehicles {
        Some(CongestionLevel::Low)
    } else {
        None
    }
}

/// Scan one route's samples for congested grid cells.
///
/// Routes with fewer than `min_cell_vehicles` samples are skipped
/// entirely. Each emitted point sits at the geometric center of its
/// cell.
pub fn scan_route(
    config: &AnalyticsConfig,
    route_id: RouteId,
    samples: &[&TrafficSample],
    detected_at: DateTime<Utc>,
) -> Vec<CongestionPoint> {
    let min_samples = usize::try_from(config.min_cell_vehicles).unwrap_or(usize::MAX);
    if samples.len() < min_samples || config.cell_size <= 0.0 {
        return Vec::new();
    }

    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let mut min_x = first.position.x;
    let mut min_y = first.position.y;
    for sample in samples {
        min_x = min_x.min(sample.position.x);
        min_y = min_y.min(sample.position.y);
    }

    // Bucket samples into cells indexed from the bounding box's minimum
    // corner.
    let mut cells: BTreeMap<(i64, i64), Vec<f64>> = BTreeMap::new();
    for sample in samples {
        let ix = ((sample.position.x - min_x) / config.cell_size).floor() as i64;
        let iy = ((sample.position.y - min_y) / config.cell_size).floor() as i64;
        cells.entry((ix, iy)).or_default().push(sample.speed);
    }

    let mut points = Vec::new();
    for ((ix, iy), speeds) in cells {
        if speeds.len() < min_samples {
            continue;
        }
        let count = u32::try_from(speeds.len()).unwrap_or(u32::MAX);
        let avg_speed = speeds.iter().sum::<f64>() / speeds.len() as f64;

        let Some(level) = classify(config, avg_speed, count) else {
            continue;
        };

        let center = Point::new(
            (ix as f64 + 0.5).mul_add(config.cell_size, min_x),
            (iy as f64 + 0.5).mul_add(config.cell_size, min_y),
        );
        debug!(
            route = %route_id,
            level = %level,
            avg_speed,
            count,
            "Classified congested cell"
        );
        points.push(CongestionPoint {
            route_id,
            location: center,
            level,
            average_speed: avg_speed,
            vehicle_count: count,
            detected_at,
        });
    }

    points
}

/// Scan every route in a batch of joined observations.
///
/// Pure core of the detector: groups samples by route and delegates to
/// [`scan_route`].
pub fn scan_all(
    config: &AnalyticsConfig,
    samples: &[TrafficSample],
    detected_at: DateTime<Utc>,
) -> Vec<CongestionPoint> {
    let mut by_route: BTreeMap<RouteId, Vec<&TrafficSample>> = BTreeMap::new();
    for sample in samples {
        by_route.entry(sample.route_id).or_default().push(sample);
    }

    let mut points = Vec::new();
    for (route_id, route_samples) in by_route {
        points.extend(scan_route(config, route_id, &route_samples, detected_at));
    }
    points
}

/// Detect congestion over the sink's recent traffic and store the result.
///
/// Fetches the configured trailing window, runs the spatial scan, and
/// writes each detected point back through the sink. A failed point
/// write is logged and skipped; the rest of the batch continues. An
/// empty window is an empty result, not an error.
///
/// # Errors
///
/// Returns [`AnalyticsError::Sink`] if the traffic fetch itself fails.
pub async fn detect_congestion<S: TrafficSink>(
    sink: &S,
    config: &AnalyticsConfig,
) -> Result<Vec<CongestionPoint>, AnalyticsError> {
    let window = Duration::hours(config.congestion_window_hours);
    let observations = sink.fetch_recent_traffic(window).await?;
    if observations.is_empty() {
        warn!("No traffic data available for congestion analysis");
        return Ok(Vec::new());
    }

    let samples: Vec<TrafficSample> = observations
        .into_iter()
        .map(|obs| obs.sample)
        .collect();
    let points = scan_all(config, &samples, Utc::now());

    for point in &points {
        if let Err(error) = sink.insert_congestion_point(point).await {
            warn!(route = %point.route_id, %error, "Failed to store congestion point; skipping");
        }
    }

    info!(detected = points.len(), "Congestion detection completed");
    Ok(points)
}

#[cfg(test)]
mod tests {
    use gridlock_types::VehicleId;

    use super::*;

    fn make_sample(route_id: RouteId, x: f64, y: f64, speed: f64) -> TrafficSample {
        TrafficSample {
            vehicle_id: VehicleId::new(),
            route_id,
            speed,
            position: Point::new(x, y),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn classification_is_precedence_ordered() {
        let config = AnalyticsConfig::default();
        assert_eq!(classify(&config, 25.0, 12), Some(CongestionLevel::High));
        assert_eq!(classify(&config, 45.0, 8), Some(CongestionLevel::Medium));
        assert_eq!(classify(&config, 60.0, 5), Some(CongestionLevel::Low));
        assert_eq!(classify(&config, 10.0, 4), None);
        // Slow but sparse: misses `high` on count, lands on `medium`.
        assert_eq!(classify(&config, 25.0, 8), Some(CongestionLevel::Medium));
    }

    #[test]
    fn dense_slow_cell_emits_high_at_cell_center() {
        let config = AnalyticsConfig::default();
        let route_id = RouteId::new();
        let samples: Vec<TrafficSample> = (0..12)
            .map(|i| make_sample(route_id, 200.0 + f64::from(i), 300.0, 20.0))
            .collect();
        let refs: Vec<&TrafficSample> = samples.iter().collect();

        let points = scan_route(&config, route_id, &refs, Utc::now());
        assert_eq!(points.len(), 1);

        let point = points.first().cloned();
        if let Some(point) = point {
            assert_eq!(point.level, CongestionLevel::High);
            assert_eq!(point.vehicle_count, 12);
            // All samples fall in the first cell: center is the midpoint
            // of the cell's two boundary corners.
            assert!((point.location.x - 250.0).abs() < 1e-9);
            assert!((point.location.y - 350.0).abs() < 1e-9);
        }
    }

    #[test]
    fn sparse_route_is_skipped_entirely() {
        let config = AnalyticsConfig::default();
        let route_id = RouteId::new();
        let samples: Vec<TrafficSample> = (0..4)
            .map(|i| make_sample(route_id, f64::from(i), 0.0, 10.0))
            .collect();
        let refs: Vec<&TrafficSample> = samples.iter().collect();

        assert!(scan_route(&config, route_id, &refs, Utc::now()).is_empty());
    }

    #[test]
    fn distant_clusters_land_in_separate_cells() {
        let config = AnalyticsConfig::default();
        let route_id = RouteId::new();
        let mut samples = Vec::new();
        // Slow cluster near the origin, free-flowing cluster 500 units away.
        for i in 0..10 {
            samples.push(make_sample(route_id, 10.0 + f64::from(i), 10.0, 20.0));
        }
        for i in 0..6 {
            samples.push(make_sample(route_id, 510.0 + f64::from(i), 10.0, 90.0));
        }
        let refs: Vec<&TrafficSample> = samples.iter().collect();

        let points = scan_route(&config, route_id, &refs, Utc::now());
        assert_eq!(points.len(), 2);
        let levels: Vec<CongestionLevel> = points.iter().map(|p| p.level).collect();
        assert!(levels.contains(&CongestionLevel::High));
        assert!(levels.contains(&CongestionLevel::Low));
    }

    #[test]
    fn scan_all_separates_routes() {
        let config = AnalyticsConfig::default();
        let busy = RouteId::new();
        let quiet = RouteId::new();
        let mut samples = Vec::new();
        for i in 0..10 {
            samples.push(make_sample(busy, f64::from(i), 0.0, 25.0));
        }
        // Below the per-route minimum: contributes nothing.
        for i in 0..3 {
            samples.push(make_sample(quiet, f64::from(i), 0.0, 25.0));
        }

        let points = scan_all(&config, &samples, Utc::now());
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.route_id == busy));
    }

    #[tokio::test]
    async fn detect_over_memory_sink_stores_points() {
        use gridlock_db::MemorySink;
        use gridlock_types::Route;

        let config = AnalyticsConfig::default();
        let sink = MemorySink::new();
        let route = Route::new(
            RouteId::new(),
            "Main Street",
            Point::new(0.0, 0.0),
            Point::new(800.0, 0.0),
            60.0,
        );
        sink.insert_routes(&[route.clone()]).await.ok();
        for i in 0..12 {
            sink.append_traffic_sample(&make_sample(route.id, 100.0 + f64::from(i), 50.0, 18.0))
                .await
                .ok();
        }

        let points = detect_congestion(&sink, &config).await.unwrap_or_default();
        assert_eq!(points.len(), 1);
        assert_eq!(sink.congestion_count().await, 1);
    }

    #[tokio::test]
    async fn empty_window_is_an_empty_result() {
        use gridlock_db::MemorySink;

        let sink = MemorySink::new();
        let points = detect_congestion(&sink, &AnalyticsConfig::default()).await;
        assert!(matches!(points, Ok(ref p) if p.is_empty()));
    }
}
