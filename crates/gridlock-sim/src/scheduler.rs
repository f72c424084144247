//! The simulation scheduler: a background worker driving the tick loop.
//!
//! One dedicated tokio task executes ticks at the configured wall-clock
//! cadence; all registry mutation happens on that task under the state
//! lock. External callers interact through [`Scheduler::start`],
//! [`Scheduler::stop`], and [`Scheduler::status`], which synchronize
//! against the worker.
//!
//! Stopping is cooperative: the worker checks a stop flag at the top of
//! each iteration and a [`Notify`] cuts its inter-tick sleep short. The
//! caller waits for the worker with a bounded timeout; expiry is logged
//! and treated as a best-effort join, never an error.
//!
//! Persistence failures inside a tick are isolated per vehicle: the
//! failed write is logged at WARN and the rest of the tick proceeds.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, Timelike, Utc};
use gridlock_db::TrafficSink;
use gridlock_types::{TrafficSample, VehicleClass};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::tick::{self, SimulationState};

/// How long [`Scheduler::stop`] waits for the worker before detaching.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Snapshot of the simulation served to status queries.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatus {
    /// Whether the tick loop is currently running.
    pub running: bool,
    /// Number of completed ticks.
    pub tick: u64,
    /// Currently active vehicles.
    pub active_vehicles: u32,
    /// Routes in the catalog.
    pub route_count: u32,
    /// Active vehicles broken down by class.
    pub class_counts: BTreeMap<VehicleClass, u32>,
}

/// Shared internals between the scheduler handle and its worker task.
struct Inner<S> {
    /// The simulation state, mutated only by the worker.
    state: Mutex<SimulationState>,
    /// The persistence sink written to once per vehicle per tick.
    sink: S,
    /// Whether a worker task is alive.
    running: AtomicBool,
    /// Cooperative stop flag checked at the top of each iteration.
    stop_requested: AtomicBool,
    /// Wakes the worker out of its inter-tick sleep on stop.
    stop_notify: Notify,
    /// Wall-clock pause between ticks.
    tick_interval: Duration,
    /// Join handle of the current worker, if any.
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Drives the simulation on a dedicated background task.
pub struct Scheduler<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Scheduler<S>
where
    S: TrafficSink + 'static,
{
    /// Create a scheduler around an assembled state and sink.
    ///
    /// The tick cadence comes from `world.tick_interval_ms` in the
    /// state's configuration. Nothing runs until [`start`](Self::start).
    pub fn new(state: SimulationState, sink: S) -> Self {
        let tick_interval = Duration::from_millis(state.config.world.tick_interval_ms);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                sink,
                running: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                stop_notify: Notify::new(),
                tick_interval,
                worker: Mutex::new(None),
            }),
        }
    }

    /// Start the background tick loop.
    ///
    /// Idempotent: if a worker is already running this logs and returns
    /// `false` without spawning a second one.
    pub async fn start(&self) -> bool {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            info!("Simulation already running; start request ignored");
            return false;
        }

        self.inner.stop_requested.store(false, Ordering::Release);
        let worker = tokio::spawn(run_loop(Arc::clone(&self.inner)));
        *self.inner.worker.lock().await = Some(worker);
        info!(
            tick_interval_ms = u64::try_from(self.inner.tick_interval.as_millis()).unwrap_or(u64::MAX),
            "Simulation started"
        );
        true
    }

    /// Request a cooperative stop and wait for the worker to exit.
    ///
    /// Waits up to a bounded timeout; on expiry the worker is detached
    /// and left to observe the stop flag on its own. Returns `false` if
    /// nothing was running.
    pub async fn stop(&self) -> bool {
        if !self.inner.running.load(Ordering::Acquire) {
            info!("Simulation not running; stop request ignored");
            return false;
        }

        self.inner.stop_requested.store(true, Ordering::Release);
        self.inner.stop_notify.notify_waiters();

        let worker = self.inner.worker.lock().await.take();
        if let Some(worker) = worker {
            match tokio::time::timeout(STOP_TIMEOUT, worker).await {
                Ok(Ok(())) => info!("Simulation stopped"),
                Ok(Err(error)) => warn!(%error, "Simulation worker ended abnormally"),
                Err(_) => warn!(
                    timeout_secs = STOP_TIMEOUT.as_secs(),
                    "Timed out waiting for simulation worker; detaching"
                ),
            }
        }
        true
    }

    /// Whether the tick loop is currently running.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Snapshot the current simulation status.
    pub async fn status(&self) -> SimulationStatus {
        let state = self.inner.state.lock().await;
        SimulationStatus {
            running: self.inner.running.load(Ordering::Acquire),
            tick: state.tick,
            active_vehicles: u32::try_from(state.vehicles.len()).unwrap_or(u32::MAX),
            route_count: u32::try_from(state.catalog.len()).unwrap_or(u32::MAX),
            class_counts: state.class_counts(),
        }
    }
}

/// The worker loop: tick, persist, sleep, until stopped.
async fn run_loop<S: TrafficSink>(inner: Arc<Inner<S>>) {
    info!("Simulation worker started");

    loop {
        if inner.stop_requested.load(Ordering::Acquire) {
            break;
        }

        let now = Utc::now();
        let hour = Local::now().hour();

        // Phase 1 under the state lock: kinematics + snapshots.
        let (tick, updated) = {
            let mut state = inner.state.lock().await;
            tick::advance_phase(&mut state, now)
        };

        // Persist each vehicle outside the lock. A failed write skips
        // that vehicle and the tick carries on.
        let mut persist_failures = 0u32;
        for vehicle in &updated {
            if let Err(error) = inner.sink.upsert_vehicle(vehicle).await {
                warn!(vehicle = %vehicle.id, %error, "Vehicle upsert failed; skipping");
                persist_failures = persist_failures.saturating_add(1);
                continue;
            }
            let sample = TrafficSample::of(vehicle);
            if let Err(error) = inner.sink.append_traffic_sample(&sample).await {
                warn!(vehicle = %vehicle.id, %error, "Sample append failed; skipping");
                persist_failures = persist_failures.saturating_add(1);
            }
        }

        // Phases 2 and 3 under the state lock: population + modulation.
        let outcome = {
            let mut state = inner.state.lock().await;
            tick::control_phase(&mut state, hour, now)
        };

        info!(
            tick,
            active_vehicles = outcome.active_vehicles,
            spawned = outcome.spawned,
            despawned = outcome.despawned,
            slowed = outcome.slowed,
            rush_hour = outcome.rush_hour,
            persist_failures,
            "Tick completed"
        );

        tokio::select! {
            () = tokio::time::sleep(inner.tick_interval) => {}
            () = inner.stop_notify.notified() => {}
        }
    }

    inner.running.store(false, Ordering::Release);
    info!("Simulation worker stopped");
}
