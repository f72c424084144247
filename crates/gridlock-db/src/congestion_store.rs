//! Operations on the `congestion_points` table.

use chrono::{DateTime, Utc};
use gridlock_types::{CongestionLevel, CongestionObservation, CongestionPoint, Point};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::SinkError;

/// Operations on the `congestion_points` table (append-only analytics).
pub struct CongestionStore<'a> {
    pool: &'a PgPool,
}

impl<'a> CongestionStore<'a> {
    /// Create a new congestion store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append one detected congestion point.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the insert fails.
    pub async fn insert(&self, point: &CongestionPoint) -> Result<(), SinkError> {
        sqlx::query(
            r"INSERT INTO congestion_points (route_id, location_x, location_y, congestion_level, average_speed, vehicle_count, detected_at)
              VALUES ($1, $2, $3, $4::congestion_level, $5, $6, $7)",
        )
        .bind(point.route_id.into_inner())
        .bind(point.location.x)
        .bind(point.location.y)
        .bind(point.level.as_str())
        .bind(point.average_speed)
        .bind(i32::try_from(point.vehicle_count).unwrap_or(i32::MAX))
        .bind(point.detected_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Fetch congestion points detected at or after `cutoff`, joined with
    /// route names, newest first.
    ///
    /// Rows whose stored level no longer parses are dropped with a
    /// warning rather than failing the whole read.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the query fails.
    pub async fn recent(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CongestionObservation>, SinkError> {
        let rows = sqlx::query_as::<_, CongestionRow>(
            r"SELECT cp.route_id, cp.location_x, cp.location_y,
                     cp.congestion_level::TEXT AS congestion_level,
                     cp.average_speed, cp.vehicle_count, cp.detected_at,
                     r.name AS route_name
              FROM congestion_points cp
              JOIN routes r ON cp.route_id = r.route_id
              WHERE cp.detected_at >= $1
              ORDER BY cp.detected_at DESC",
        )
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(CongestionRow::into_observation)
            .collect())
    }

    /// Delete congestion points detected before `cutoff`, returning the
    /// number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the delete fails.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SinkError> {
        let result = sqlx::query(r"DELETE FROM congestion_points WHERE detected_at < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// A row from the `congestion_points` / `routes` join.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CongestionRow {
    /// The route the point belongs to.
    route_id: Uuid,
    /// Cell center x coordinate.
    location_x: f64,
    /// Cell center y coordinate.
    location_y: f64,
    /// Severity as text (cast from the `PostgreSQL` enum).
    congestion_level: String,
    /// Mean speed observed in the cell.
    average_speed: f64,
    /// Samples observed in the cell.
    vehicle_count: i32,
    /// Detection timestamp.
    detected_at: DateTime<Utc>,
    /// Joined route display name.
    route_name: String,
}

impl CongestionRow {
    /// Convert the database row into the shared observation type.
    fn into_observation(self) -> Option<CongestionObservation> {
        let Some(level) = parse_level(&self.congestion_level) else {
            tracing::warn!(
                level = self.congestion_level.as_str(),
                "Dropping congestion row with unknown level"
            );
            return None;
        };

        Some(CongestionObservation {
            point: CongestionPoint {
                route_id: self.route_id.into(),
                location: Point::new(self.location_x, self.location_y),
                level,
                average_speed: self.average_speed,
                vehicle_count: u32::try_from(self.vehicle_count).unwrap_or_default(),
                detected_at: self.detected_at,
            },
            route_name: self.route_name,
        })
    }
}

/// Parse a stored congestion level string.
fn parse_level(raw: &str) -> Option<CongestionLevel> {
    match raw {
        "low" => Some(CongestionLevel::Low),
        "medium" => Some(CongestionLevel::Medium),
        "high" => Some(CongestionLevel::High),
        _ => None,
    }
}
