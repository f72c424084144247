//! Traffic engine binary for the Gridlock simulation.
//!
//! This is the main entry point that wires together the route catalog,
//! the persistence sink, the tick scheduler, and the periodic analytics
//! sweep. It loads configuration, initializes all subsystems, and runs
//! until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `gridlock-config.yaml`
//! 3. Connect to `PostgreSQL` and run migrations (fatal on failure)
//! 4. Build the simulation state (seeded RNG + route catalog)
//! 5. Insert the catalog into the sink (fatal on failure)
//! 6. Start the tick scheduler
//! 7. Spawn the periodic analytics sweep
//! 8. Wait for ctrl-c, then stop cooperatively

mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gridlock_analytics::AnalyticsConfig;
use gridlock_db::{PostgresConfig, PostgresPool, PostgresSink, TrafficSink};
use gridlock_sim::{Scheduler, SimulationConfig, SimulationState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Path of the YAML configuration file, relative to the working directory.
const CONFIG_PATH: &str = "gridlock-config.yaml";

/// Application entry point for the traffic engine.
///
/// Initializes all subsystems, starts the simulation, and blocks until
/// ctrl-c.
///
/// # Errors
///
/// Returns an error if any startup step fails; steady-state failures are
/// logged and survived instead.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("gridlock-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    let analytics_config = load_analytics_config()?;
    info!(
        world_name = config.world.name.as_str(),
        seed = config.world.seed,
        tick_interval_ms = config.world.tick_interval_ms,
        tick_hours = config.world.tick_hours,
        sweep_interval_secs = analytics_config.sweep_interval_secs,
        "Configuration loaded"
    );

    // 3. Connect to PostgreSQL and run migrations. Failure here is fatal.
    let pg_config = PostgresConfig::new(&config.database.url)
        .with_max_connections(config.database.max_connections);
    let pool = PostgresPool::connect(&pg_config).await.map_err(EngineError::from)?;
    pool.run_migrations().await.map_err(EngineError::from)?;
    let sink = PostgresSink::new(pool.clone());

    // 4. Build the simulation state: seeded RNG, generated catalog.
    let state = SimulationState::new(config).map_err(EngineError::from)?;
    info!(
        route_count = state.catalog.len(),
        "Route catalog generated"
    );

    // 5. Seed the catalog into the sink. Failure here is fatal, unlike
    //    steady-state persistence failures.
    sink.insert_routes(&state.catalog.to_routes())
        .await
        .map_err(EngineError::from)?;
    info!("Route catalog inserted");

    // 6. Start the tick scheduler.
    let scheduler = Arc::new(Scheduler::new(state, sink.clone()));
    scheduler.start().await;

    // 7. Spawn the periodic analytics sweep.
    let sweep = spawn_analytics_sweep(sink, analytics_config, Arc::clone(&scheduler));

    // 8. Run until interrupted.
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");

    sweep.abort();
    scheduler.stop().await;
    pool.close().await;

    info!("gridlock-engine shutdown complete");
    Ok(())
}

/// Load the main simulation configuration from `gridlock-config.yaml`.
///
/// Falls back to defaults when the file does not exist.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        let config = SimulationConfig::from_file(config_path)?;
        Ok(config)
    } else {
        info!("Config file not found, using defaults");
        Ok(SimulationConfig::default())
    }
}

/// Load the `analytics` section from `gridlock-config.yaml`.
///
/// The analytics crate owns its own config type, so the section is
/// extracted from the raw YAML rather than threaded through the
/// simulation config. Missing file or missing section means defaults.
fn load_analytics_config() -> Result<AnalyticsConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if !config_path.exists() {
        return Ok(AnalyticsConfig::default());
    }

    let contents =
        std::fs::read_to_string(config_path).map_err(|e| EngineError::AnalyticsConfig {
            message: format!("failed to read config file: {e}"),
        })?;
    let raw: serde_yml::Value =
        serde_yml::from_str(&contents).map_err(|e| EngineError::AnalyticsConfig {
            message: format!("failed to parse config YAML: {e}"),
        })?;

    raw.get("analytics").map_or_else(
        || Ok(AnalyticsConfig::default()),
        |section| {
            serde_yml::from_value(section.clone()).map_err(|e| EngineError::AnalyticsConfig {
                message: format!("failed to parse analytics config: {e}"),
            })
        },
    )
}

/// Spawn the background task running periodic analytics sweeps.
///
/// Each sweep detects congestion, estimates travel times, logs route
/// statistics, and purges aged history. Every step is log-and-continue;
/// a failing sink never kills the sweep task.
fn spawn_analytics_sweep(
    sink: PostgresSink,
    config: AnalyticsConfig,
    scheduler: Arc<Scheduler<PostgresSink>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            let status = scheduler.status().await;
            info!(
                running = status.running,
                tick = status.tick,
                active_vehicles = status.active_vehicles,
                "Simulation status"
            );
            run_sweep(&sink, &config).await;
        }
    })
}

/// Run one analytics sweep against the sink.
async fn run_sweep(sink: &PostgresSink, config: &AnalyticsConfig) {
    match gridlock_analytics::detect_congestion(sink, config).await {
        Ok(points) => info!(points = points.len(), "Congestion sweep finished"),
        Err(error) => warn!(%error, "Congestion sweep failed"),
    }

    match sink
        .fetch_recent_congestion(chrono::Duration::hours(config.congestion_window_hours))
        .await
    {
        Ok(observations) => {
            if let Some(latest) = observations.first() {
                info!(
                    active_points = observations.len(),
                    route = latest.route_name.as_str(),
                    level = %latest.point.level,
                    "Congestion picture in window"
                );
            }
        }
        Err(error) => warn!(%error, "Congestion fetch failed"),
    }

    match gridlock_analytics::estimate_travel_times(sink, config).await {
        Ok(summaries) => {
            for summary in &summaries {
                info!(
                    route = summary.route_name.as_str(),
                    mean_minutes = summary.mean_minutes,
                    min_minutes = summary.min_minutes,
                    max_minutes = summary.max_minutes,
                    sample_size = summary.sample_size,
                    "Route travel time"
                );
            }
        }
        Err(error) => warn!(%error, "Travel time sweep failed"),
    }

    match sink
        .fetch_route_statistics(chrono::Duration::hours(config.travel_time_window_hours))
        .await
    {
        Ok(stats) => {
            if let Some(slowest) = stats.first() {
                info!(
                    route = slowest.route_name.as_str(),
                    avg_speed = slowest.avg_speed,
                    distinct_vehicles = slowest.distinct_vehicles,
                    "Slowest route in window"
                );
            }
        }
        Err(error) => warn!(%error, "Route statistics fetch failed"),
    }

    match sink
        .purge_older_than(chrono::Duration::days(config.retention_days))
        .await
    {
        Ok(summary) => {
            if summary.traffic_deleted > 0 || summary.congestion_deleted > 0 {
                info!(
                    traffic_deleted = summary.traffic_deleted,
                    congestion_deleted = summary.congestion_deleted,
                    "Aged history purged"
                );
            }
        }
        Err(error) => warn!(%error, "History purge failed"),
    }
}
