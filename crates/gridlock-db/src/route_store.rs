//! Operations on the `routes` table.
//!
//! The route catalog is written exactly once at startup and is joined by
//! every read path afterwards, so inserts ignore duplicates and reads
//! treat a missing route as data to drop, not an error.

use chrono::{DateTime, Utc};
use gridlock_types::{Route, RouteSpeedStats};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::SinkError;

/// Operations on the `routes` table.
pub struct RouteStore<'a> {
    pool: &'a PgPool,
}

impl<'a> RouteStore<'a> {
    /// Create a new route store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Bulk-insert routes, ignoring any that already exist.
    ///
    /// Uses a single multi-row INSERT via UNNEST instead of one statement
    /// per route, reducing round-trips to `PostgreSQL` to one.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the insert fails.
    pub async fn insert_routes(&self, routes: &[Route]) -> Result<(), SinkError> {
        if routes.is_empty() {
            return Ok(());
        }

        let len = routes.len();
        let mut ids: Vec<Uuid> = Vec::with_capacity(len);
        let mut names = Vec::with_capacity(len);
        let mut start_xs = Vec::with_capacity(len);
        let mut start_ys = Vec::with_capacity(len);
        let mut end_xs = Vec::with_capacity(len);
        let mut end_ys = Vec::with_capacity(len);
        let mut distances = Vec::with_capacity(len);
        let mut speed_limits = Vec::with_capacity(len);

        for route in routes {
            ids.push(route.id.into_inner());
            names.push(route.name.clone());
            start_xs.push(route.start.x);
            start_ys.push(route.start.y);
            end_xs.push(route.end.x);
            end_ys.push(route.end.y);
            distances.push(route.distance_km);
            speed_limits.push(route.speed_limit);
        }

        sqlx::query(
            r"INSERT INTO routes (route_id, name, start_x, start_y, end_x, end_y, distance_km, speed_limit)
              SELECT * FROM UNNEST($1::UUID[], $2::TEXT[], $3::FLOAT8[], $4::FLOAT8[], $5::FLOAT8[], $6::FLOAT8[], $7::FLOAT8[], $8::FLOAT8[])
              ON CONFLICT (route_id) DO NOTHING",
        )
        .bind(&ids)
        .bind(&names)
        .bind(&start_xs)
        .bind(&start_ys)
        .bind(&end_xs)
        .bind(&end_ys)
        .bind(&distances)
        .bind(&speed_limits)
        .execute(self.pool)
        .await?;

        tracing::debug!(count = routes.len(), "Inserted routes (batch UNNEST)");
        Ok(())
    }

    /// Aggregate speed statistics per route for samples at or after
    /// `cutoff`, slowest routes first.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the query fails.
    pub async fn speed_statistics(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RouteSpeedStats>, SinkError> {
        let rows = sqlx::query_as::<_, RouteStatsRow>(
            r"SELECT r.route_id, r.name AS route_name, r.speed_limit,
                     AVG(ts.speed) AS avg_speed,
                     MIN(ts.speed) AS min_speed,
                     MAX(ts.speed) AS max_speed,
                     COUNT(*) AS sample_count,
                     COUNT(DISTINCT ts.vehicle_id) AS distinct_vehicles
              FROM routes r
              JOIN traffic_samples ts ON ts.route_id = r.route_id
              WHERE ts.recorded_at >= $1
              GROUP BY r.route_id, r.name, r.speed_limit
              ORDER BY avg_speed ASC",
        )
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(RouteStatsRow::into_stats).collect())
    }
}

/// A row from the per-route statistics aggregate.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RouteStatsRow {
    /// The aggregated route.
    route_id: Uuid,
    /// Display name of the route.
    route_name: String,
    /// Posted speed limit.
    speed_limit: f64,
    /// Mean observed speed.
    avg_speed: f64,
    /// Slowest observed speed.
    min_speed: f64,
    /// Fastest observed speed.
    max_speed: f64,
    /// Total samples in the window.
    sample_count: i64,
    /// Distinct vehicles in the window.
    distinct_vehicles: i64,
}

impl RouteStatsRow {
    /// Convert the database row into the shared stats type.
    fn into_stats(self) -> RouteSpeedStats {
        RouteSpeedStats {
            route_id: self.route_id.into(),
            route_name: self.route_name,
            speed_limit: self.speed_limit,
            avg_speed: self.avg_speed,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
            sample_count: u64::try_from(self.sample_count).unwrap_or_default(),
            distinct_vehicles: u64::try_from(self.distinct_vehicles).unwrap_or_default(),
        }
    }
}
