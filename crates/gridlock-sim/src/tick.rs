//! The discrete simulation step.
//!
//! One tick runs three phases in order:
//!
//! 1. **Advance** -- every registered vehicle moves along its route and
//!    gets its speed re-drawn ([`advance_phase`]). The returned snapshots
//!    are what the scheduler persists, so the stored state is exactly the
//!    post-kinematics state.
//! 2. **Population** -- routes below their cap may spawn, finished or
//!    unlucky vehicles despawn.
//! 3. **Modulation** -- the rush-hour policy slows a random subset.
//!
//! Phases 2 and 3 are combined in [`control_phase`] so the scheduler can
//! release the state lock while it persists between the phases.
//! [`run_tick`] composes all three for in-process callers and tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gridlock_types::{Vehicle, VehicleClass, VehicleId};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::catalog::{CatalogError, RouteCatalog};
use crate::config::SimulationConfig;
use crate::{kinematics, population, rush_hour};

/// The complete in-memory state of the simulation.
///
/// Owned by the scheduler and mutated only on its worker task; external
/// callers reach it through the scheduler's synchronized accessors.
#[derive(Debug)]
pub struct SimulationState {
    /// Number of completed ticks.
    pub tick: u64,
    /// The immutable route catalog.
    pub catalog: RouteCatalog,
    /// The registry of currently active vehicles.
    pub vehicles: BTreeMap<VehicleId, Vehicle>,
    /// Seeded random source threaded through every stochastic step.
    pub rng: StdRng,
    /// The configuration the simulation was built with.
    pub config: SimulationConfig,
}

impl SimulationState {
    /// Build a fresh simulation state from configuration.
    ///
    /// Seeds the random source from `world.seed` and generates the route
    /// catalog with it, so two states built from the same configuration
    /// describe the same world.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if catalog generation fails.
    pub fn new(config: SimulationConfig) -> Result<Self, CatalogError> {
        let mut rng = StdRng::seed_from_u64(config.world.seed);
        let catalog = RouteCatalog::generate(&config.catalog, &mut rng)?;
        Ok(Self {
            tick: 0,
            catalog,
            vehicles: BTreeMap::new(),
            rng,
            config,
        })
    }

    /// Build a state from explicit parts (useful for testing).
    pub fn from_parts(
        config: SimulationConfig,
        catalog: RouteCatalog,
        vehicles: BTreeMap<VehicleId, Vehicle>,
        seed: u64,
    ) -> Self {
        Self {
            tick: 0,
            catalog,
            vehicles,
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Count active vehicles per class.
    pub fn class_counts(&self) -> BTreeMap<VehicleClass, u32> {
        let mut counts: BTreeMap<VehicleClass, u32> = BTreeMap::new();
        for vehicle in self.vehicles.values() {
            let entry = counts.entry(vehicle.class).or_default();
            *entry = entry.saturating_add(1);
        }
        counts
    }
}

/// What the population and modulation phases did.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlOutcome {
    /// Vehicles spawned this tick.
    pub spawned: u32,
    /// Vehicles despawned this tick.
    pub despawned: u32,
    /// Vehicles slowed by the congestion modulator this tick.
    pub slowed: u32,
    /// Vehicles active after the tick.
    pub active_vehicles: u32,
    /// Whether the rush-hour policy was active.
    pub rush_hour: bool,
}

/// Summary of one full tick.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick number that just completed.
    pub tick: u64,
    /// Post-kinematics snapshots of every active vehicle, in the state
    /// the sink should receive.
    pub updated: Vec<Vehicle>,
    /// Vehicles spawned this tick.
    pub spawned: u32,
    /// Vehicles despawned this tick.
    pub despawned: u32,
    /// Vehicles slowed by the congestion modulator this tick.
    pub slowed: u32,
    /// Vehicles active after the tick.
    pub active_vehicles: u32,
    /// Whether the rush-hour policy was active.
    pub rush_hour: bool,
}

/// Phase 1: advance every vehicle by one virtual time step.
///
/// Increments the tick counter and returns it together with a snapshot
/// of every vehicle for persistence. A vehicle whose route has vanished
/// is snapshotted unchanged; the population phase will remove it.
pub fn advance_phase(state: &mut SimulationState, now: DateTime<Utc>) -> (u64, Vec<Vehicle>) {
    state.tick = state.tick.saturating_add(1);
    let tick_hours = state.config.world.tick_hours;
    let variation = state.config.population.speed_variation;

    let mut updated = Vec::with_capacity(state.vehicles.len());
    for vehicle in state.vehicles.values_mut() {
        if let Some(route) = state.catalog.get(vehicle.route_id) {
            kinematics::advance(vehicle, route, tick_hours, variation, now, &mut state.rng);
        }
        updated.push(vehicle.clone());
    }

    (state.tick, updated)
}

/// Phases 2 and 3: population control, then congestion modulation.
pub fn control_phase(
    state: &mut SimulationState,
    hour: u32,
    now: DateTime<Utc>,
) -> ControlOutcome {
    let rush = rush_hour::is_rush_hour(&state.config.rush_hour, hour);
    let spawn_rate =
        rush_hour::effective_spawn_rate(&state.config.population, &state.config.rush_hour, hour);

    let spawned = population::spawn_vehicles(
        &mut state.vehicles,
        &state.catalog,
        &state.config.population,
        spawn_rate,
        now,
        &mut state.rng,
    );
    let removed = population::despawn_vehicles(
        &mut state.vehicles,
        &state.catalog,
        &state.config.population,
        &mut state.rng,
    );
    let slowed = rush_hour::apply_slowdowns(
        &mut state.vehicles,
        &state.config.rush_hour,
        hour,
        &mut state.rng,
    );

    ControlOutcome {
        spawned,
        despawned: u32::try_from(removed.len()).unwrap_or(u32::MAX),
        slowed,
        active_vehicles: u32::try_from(state.vehicles.len()).unwrap_or(u32::MAX),
        rush_hour: rush,
    }
}

/// Run one complete tick: advance, population, modulation.
pub fn run_tick(state: &mut SimulationState, hour: u32, now: DateTime<Utc>) -> TickSummary {
    let (tick, updated) = advance_phase(state, now);
    let outcome = control_phase(state, hour, now);

    TickSummary {
        tick,
        updated,
        spawned: outcome.spawned,
        despawned: outcome.despawned,
        slowed: outcome.slowed,
        active_vehicles: outcome.active_vehicles,
        rush_hour: outcome.rush_hour,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    fn make_state(seed: u64) -> SimulationState {
        let mut config = SimulationConfig::default();
        config.world.seed = seed;
        SimulationState::new(config).unwrap_or_else(|_| {
            SimulationState::from_parts(
                SimulationConfig::default(),
                RouteCatalog::default(),
                BTreeMap::new(),
                seed,
            )
        })
    }

    #[test]
    fn speed_invariant_holds_across_many_ticks() {
        let mut state = make_state(42);

        for hour in 0..120u32 {
            run_tick(&mut state, hour % 24, Utc::now());
            for vehicle in state.vehicles.values() {
                assert!(
                    vehicle.current_speed >= 0.0,
                    "negative speed at tick {}",
                    state.tick
                );
                assert!(
                    vehicle.current_speed <= vehicle.max_speed,
                    "speed above max at tick {}",
                    state.tick
                );
            }
        }
    }

    #[test]
    fn per_route_population_never_exceeds_cap() {
        let mut state = make_state(43);
        let cap = usize::try_from(state.config.population.max_vehicles_per_route).unwrap_or(0);

        for _ in 0..80 {
            // Hour 8 keeps the rush-hour spawn rate active.
            run_tick(&mut state, 8, Utc::now());
            for route in state.catalog.iter() {
                let on_route = state
                    .vehicles
                    .values()
                    .filter(|vehicle| vehicle.route_id == route.id)
                    .count();
                assert!(on_route <= cap, "route {} over cap: {on_route}", route.name);
            }
        }
    }

    #[test]
    fn tick_counter_advances_once_per_tick() {
        let mut state = make_state(44);
        let summary = run_tick(&mut state, 12, Utc::now());
        assert_eq!(summary.tick, 1);
        let summary = run_tick(&mut state, 12, Utc::now());
        assert_eq!(summary.tick, 2);
    }

    #[test]
    fn same_seed_replays_the_same_population_trace() {
        let mut left = make_state(7);
        let mut right = make_state(7);

        for _ in 0..30 {
            let a = run_tick(&mut left, 8, Utc::now());
            let b = run_tick(&mut right, 8, Utc::now());
            assert_eq!(a.spawned, b.spawned);
            assert_eq!(a.despawned, b.despawned);
            assert_eq!(a.active_vehicles, b.active_vehicles);
        }
    }

    #[test]
    fn snapshots_cover_every_active_vehicle() {
        let mut state = make_state(45);
        // Seed some population first.
        run_tick(&mut state, 8, Utc::now());
        let before = state.vehicles.len();

        let (_, updated) = advance_phase(&mut state, Utc::now());
        assert_eq!(updated.len(), before);
    }

    #[test]
    fn class_counts_sum_to_registry_size() {
        let mut state = make_state(46);
        for _ in 0..10 {
            run_tick(&mut state, 8, Utc::now());
        }
        let counts = state.class_counts();
        let total: u32 = counts.values().copied().sum();
        assert_eq!(total, u32::try_from(state.vehicles.len()).unwrap_or(0));
    }
}
