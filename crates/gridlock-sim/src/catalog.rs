//! Route catalog generation and lookup.
//!
//! The catalog is the immutable set of straight-line routes vehicles
//! travel. It is generated once at startup from the built-in name pool
//! and a seeded random source, inserted into the sink, and then owned by
//! the engine for the process lifetime. Nothing mutates a route after
//! generation.

use std::collections::BTreeMap;

use gridlock_types::{Point, Route, RouteId};
use rand::Rng;
use tracing::debug;

use crate::config::CatalogConfig;

/// Built-in pool of route display names. Generation caps the route count
/// at the pool size so every route gets a distinct name.
const ROUTE_NAMES: &[&str] = &[
    "Main Street",
    "Highway 1",
    "Broadway",
    "Park Avenue",
    "Industrial Road",
    "City Center",
    "Suburban Loop",
    "Airport Highway",
    "University Drive",
    "Shopping District",
];

/// Errors that can occur during catalog generation.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The speed-limit pool is empty, so no route can be assigned one.
    #[error("catalog config has no speed limits to draw from")]
    NoSpeedLimits,
}

/// The immutable set of routes owned by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteCatalog {
    routes: BTreeMap<RouteId, Route>,
}

impl RouteCatalog {
    /// Generate a catalog of random straight-line routes.
    ///
    /// Each route gets a fresh identifier, a distinct name from the
    /// built-in pool, endpoints drawn uniformly over the square map, a
    /// derived length, and a speed limit drawn from the configured pool.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NoSpeedLimits`] if the configured
    /// speed-limit pool is empty.
    pub fn generate(config: &CatalogConfig, rng: &mut impl Rng) -> Result<Self, CatalogError> {
        if config.speed_limits.is_empty() {
            return Err(CatalogError::NoSpeedLimits);
        }

        let count = usize::try_from(config.route_count)
            .unwrap_or(ROUTE_NAMES.len())
            .min(ROUTE_NAMES.len());

        let mut routes = BTreeMap::new();
        for name in ROUTE_NAMES.iter().take(count) {
            let start = Point::new(
                rng.random_range(0.0..config.map_extent),
                rng.random_range(0.0..config.map_extent),
            );
            let end = Point::new(
                rng.random_range(0.0..config.map_extent),
                rng.random_range(0.0..config.map_extent),
            );
            let limit_idx = rng.random_range(0..config.speed_limits.len());
            let speed_limit = config.speed_limits.get(limit_idx).copied().unwrap_or(50.0);

            let route = Route::new(RouteId::new(), *name, start, end, speed_limit);
            debug!(
                route = %route.id,
                name = route.name.as_str(),
                distance_km = route.distance_km,
                speed_limit,
                "Generated route"
            );
            routes.insert(route.id, route);
        }

        Ok(Self { routes })
    }

    /// Look up a route by identifier.
    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    /// Whether the catalog contains the route.
    pub fn contains(&self, id: RouteId) -> bool {
        self.routes.contains_key(&id)
    }

    /// Number of routes in the catalog.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate over all routes in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// All routes as a vector, for bulk insertion into the sink.
    pub fn to_routes(&self) -> Vec<Route> {
        self.routes.values().cloned().collect()
    }
}
