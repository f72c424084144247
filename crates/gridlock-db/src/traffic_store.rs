//! Operations on the `traffic_samples` time series.

use chrono::{DateTime, Utc};
use gridlock_types::{Point, TrafficObservation, TrafficSample};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::SinkError;

/// Operations on the `traffic_samples` table (append-only time series).
pub struct TrafficStore<'a> {
    pool: &'a PgPool,
}

impl<'a> TrafficStore<'a> {
    /// Create a new traffic store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append one observation to the time series.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the insert fails.
    pub async fn append(&self, sample: &TrafficSample) -> Result<(), SinkError> {
        sqlx::query(
            r"INSERT INTO traffic_samples (vehicle_id, route_id, speed, position_x, position_y, recorded_at)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(sample.vehicle_id.into_inner())
        .bind(sample.route_id.into_inner())
        .bind(sample.speed)
        .bind(sample.position.x)
        .bind(sample.position.y)
        .bind(sample.recorded_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Fetch samples recorded at or after `cutoff`, joined with route
    /// metadata, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the query fails.
    pub async fn recent(&self, cutoff: DateTime<Utc>) -> Result<Vec<TrafficObservation>, SinkError> {
        let rows = sqlx::query_as::<_, TrafficRow>(
            r"SELECT ts.vehicle_id, ts.route_id, ts.speed, ts.position_x, ts.position_y, ts.recorded_at,
                     r.name AS route_name, r.speed_limit
              FROM traffic_samples ts
              JOIN routes r ON ts.route_id = r.route_id
              WHERE ts.recorded_at >= $1
              ORDER BY ts.recorded_at ASC",
        )
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(TrafficRow::into_observation).collect())
    }

    /// Delete samples recorded before `cutoff`, returning the number of
    /// rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the delete fails.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SinkError> {
        let result = sqlx::query(r"DELETE FROM traffic_samples WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// A row from the `traffic_samples` / `routes` join.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TrafficRow {
    /// The observed vehicle.
    vehicle_id: Uuid,
    /// The route the sample belongs to.
    route_id: Uuid,
    /// Observed speed.
    speed: f64,
    /// Position x coordinate.
    position_x: f64,
    /// Position y coordinate.
    position_y: f64,
    /// Observation timestamp.
    recorded_at: DateTime<Utc>,
    /// Joined route display name.
    route_name: String,
    /// Joined route speed limit.
    speed_limit: f64,
}

impl TrafficRow {
    /// Convert the database row into the shared observation type.
    fn into_observation(self) -> TrafficObservation {
        TrafficObservation {
            sample: TrafficSample {
                vehicle_id: self.vehicle_id.into(),
                route_id: self.route_id.into(),
                speed: self.speed,
                position: Point::new(self.position_x, self.position_y),
                recorded_at: self.recorded_at,
            },
            route_name: self.route_name,
            speed_limit: self.speed_limit,
        }
    }
}
