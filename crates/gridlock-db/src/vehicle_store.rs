//! Operations on the `vehicles` table.

use gridlock_types::Vehicle;
use sqlx::PgPool;

use crate::error::SinkError;

/// Operations on the `vehicles` table (latest state per vehicle).
pub struct VehicleStore<'a> {
    pool: &'a PgPool,
}

impl<'a> VehicleStore<'a> {
    /// Create a new vehicle store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update the vehicle's current state.
    ///
    /// On conflict only the mutable fields change: speed, position, and
    /// the update timestamp. Class, max speed, and route are fixed for a
    /// vehicle's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the upsert fails.
    pub async fn upsert(&self, vehicle: &Vehicle) -> Result<(), SinkError> {
        sqlx::query(
            r"INSERT INTO vehicles (vehicle_id, vehicle_class, current_speed, max_speed, route_id, position_x, position_y, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
              ON CONFLICT (vehicle_id) DO UPDATE SET
                  current_speed = EXCLUDED.current_speed,
                  position_x = EXCLUDED.position_x,
                  position_y = EXCLUDED.position_y,
                  updated_at = EXCLUDED.updated_at",
        )
        .bind(vehicle.id.into_inner())
        .bind(vehicle.class.as_str())
        .bind(vehicle.current_speed)
        .bind(vehicle.max_speed)
        .bind(vehicle.route_id.into_inner())
        .bind(vehicle.position.x)
        .bind(vehicle.position.y)
        .bind(vehicle.updated_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
