//! Per-tick vehicle kinematics.
//!
//! Pure straight-line motion: each step moves a vehicle along its route's
//! direction by `current_speed x tick_hours`, converted from kilometers
//! to position units through [`UNITS_PER_KM`], then perturbs the speed by
//! a bounded uniform jitter and clamps it back into `[0, max_speed]`.
//!
//! All randomness comes through the caller-supplied [`Rng`], so a seeded
//! generator makes the step fully deterministic.

use chrono::{DateTime, Utc};
use gridlock_types::{Route, UNITS_PER_KM, Vehicle};
use rand::Rng;

/// Advance one vehicle along its route by one virtual time step.
///
/// Position is updated with the speed the vehicle entered the tick with;
/// the jitter applies to the speed it leaves the tick with. A degenerate
/// route (coincident endpoints) leaves the position unchanged.
///
/// Invariant on exit: `0 <= current_speed <= max_speed`.
pub fn advance(
    vehicle: &mut Vehicle,
    route: &Route,
    tick_hours: f64,
    speed_variation: f64,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) {
    let displacement_units = vehicle.current_speed * tick_hours * UNITS_PER_KM;
    if let Some(direction) = route.heading() {
        vehicle.position = vehicle.position.displaced(direction, displacement_units);
    }

    let bound = (vehicle.max_speed * speed_variation).abs();
    let jitter = rng.random_range(-bound..=bound);
    vehicle.current_speed = (vehicle.current_speed + jitter).clamp(0.0, vehicle.max_speed);

    vehicle.updated_at = now;
}

#[cfg(test)]
mod tests {
    use gridlock_types::{Point, RouteId, VehicleClass, VehicleId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn make_vehicle(route_id: RouteId, speed: f64, max_speed: f64) -> Vehicle {
        Vehicle {
            id: VehicleId::new(),
            class: VehicleClass::Car,
            current_speed: speed,
            max_speed,
            route_id,
            position: Point::new(0.0, 0.0),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn displacement_follows_route_direction() {
        // Route due east; 60 km/h for 0.1 h is 6 km = 600 position units.
        let route = Route::new(
            RouteId::new(),
            "Eastbound",
            Point::new(0.0, 0.0),
            Point::new(1000.0, 0.0),
            80.0,
        );
        let mut vehicle = make_vehicle(route.id, 60.0, 120.0);
        let mut rng = StdRng::seed_from_u64(9);

        advance(&mut vehicle, &route, 0.1, 0.0, Utc::now(), &mut rng);

        assert!((vehicle.position.x - 600.0).abs() < 1e-9);
        assert!(vehicle.position.y.abs() < 1e-9);
    }

    #[test]
    fn degenerate_route_leaves_position_unchanged() {
        let p = Point::new(250.0, 250.0);
        let route = Route::new(RouteId::new(), "Nowhere Loop", p, p, 50.0);
        let mut vehicle = make_vehicle(route.id, 60.0, 120.0);
        vehicle.position = Point::new(5.0, 5.0);
        let mut rng = StdRng::seed_from_u64(9);

        advance(&mut vehicle, &route, 0.1, 0.2, Utc::now(), &mut rng);

        assert!((vehicle.position.x - 5.0).abs() < f64::EPSILON);
        assert!((vehicle.position.y - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn speed_stays_within_bounds_over_many_steps() {
        let route = Route::new(
            RouteId::new(),
            "Jitter Lane",
            Point::new(0.0, 0.0),
            Point::new(1000.0, 1000.0),
            80.0,
        );
        let mut vehicle = make_vehicle(route.id, 100.0, 100.0);
        let mut rng = StdRng::seed_from_u64(1234);

        for _ in 0..500 {
            advance(&mut vehicle, &route, 0.1, 0.2, Utc::now(), &mut rng);
            assert!(vehicle.current_speed >= 0.0);
            assert!(vehicle.current_speed <= vehicle.max_speed);
        }
    }

    #[test]
    fn zero_variation_keeps_speed_constant() {
        let route = Route::new(
            RouteId::new(),
            "Cruise Control",
            Point::new(0.0, 0.0),
            Point::new(500.0, 0.0),
            80.0,
        );
        let mut vehicle = make_vehicle(route.id, 70.0, 120.0);
        let mut rng = StdRng::seed_from_u64(5);

        advance(&mut vehicle, &route, 0.1, 0.0, Utc::now(), &mut rng);
        assert!((vehicle.current_speed - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn update_timestamp_is_set() {
        let route = Route::new(
            RouteId::new(),
            "Clockwatch Way",
            Point::new(0.0, 0.0),
            Point::new(500.0, 0.0),
            80.0,
        );
        let mut vehicle = make_vehicle(route.id, 70.0, 120.0);
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();

        advance(&mut vehicle, &route, 0.1, 0.1, now, &mut rng);
        assert_eq!(vehicle.updated_at, now);
    }
}
