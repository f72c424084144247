//! Time-of-day congestion modulation.
//!
//! During configured rush-hour windows the spawn rate rises and a
//! congestion multiplier suppresses speeds; outside them the multiplier
//! is 1.0. The policy is evaluated once per tick from the wall-clock
//! hour the scheduler passes in -- it is process-wide, not per-vehicle
//! state.

use std::collections::BTreeMap;

use gridlock_types::{Vehicle, VehicleId};
use rand::Rng;

use crate::config::{PopulationConfig, RushHourConfig};

/// Whether the given hour-of-day falls inside any rush-hour window.
pub fn is_rush_hour(config: &RushHourConfig, hour: u32) -> bool {
    config.windows.iter().any(|window| window.contains(hour))
}

/// The per-route spawn probability in effect at the given hour.
pub fn effective_spawn_rate(
    population: &PopulationConfig,
    rush: &RushHourConfig,
    hour: u32,
) -> f64 {
    if is_rush_hour(rush, hour) {
        rush.spawn_rate
    } else {
        population.spawn_rate
    }
}

/// The speed multiplier in effect at the given hour.
pub fn congestion_factor(config: &RushHourConfig, hour: u32) -> f64 {
    if is_rush_hour(config, hour) {
        config.speed_factor
    } else {
        1.0
    }
}

/// Apply the congestion multiplier to a random subset of the registry.
///
/// Each vehicle independently has `slowdown_probability` of being
/// affected; an affected vehicle's speed is scaled by the active factor
/// and floored at the configured minimum so nothing fully stalls. The
/// floor never lifts a vehicle above its own maximum. Returns the number
/// of vehicles affected.
pub fn apply_slowdowns(
    registry: &mut BTreeMap<VehicleId, Vehicle>,
    config: &RushHourConfig,
    hour: u32,
    rng: &mut impl Rng,
) -> u32 {
    let factor = congestion_factor(config, hour);
    let probability = config.slowdown_probability.clamp(0.0, 1.0);
    let mut affected = 0u32;

    for vehicle in registry.values_mut() {
        if !rng.random_bool(probability) {
            continue;
        }
        vehicle.current_speed = (vehicle.current_speed * factor)
            .max(config.min_speed)
            .min(vehicle.max_speed);
        affected = affected.saturating_add(1);
    }

    affected
}
