//! Typed configuration for the analytics sweeps.
//!
//! Loaded by the engine from the `analytics` section of
//! `gridlock-config.yaml`; every threshold the detector and estimator
//! use lives here rather than in module constants.

use serde::Deserialize;

/// Tunables for congestion detection and travel-time estimation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyticsConfig {
    /// Side length of a square congestion grid cell, in position units.
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,

    /// Minimum samples for a route to be analyzed and for a cell to be
    /// classified at all.
    #[serde(default = "default_min_cell_vehicles")]
    pub min_cell_vehicles: u32,

    /// Mean speed at or below which a cell can be classified `high`.
    #[serde(default = "default_high_speed_threshold")]
    pub high_speed_threshold: f64,

    /// Sample count at or above which a cell can be classified `high`.
    #[serde(default = "default_high_count")]
    pub high_count: u32,

    /// Mean speed at or below which a cell can be classified `medium`.
    #[serde(default = "default_medium_speed_threshold")]
    pub medium_speed_threshold: f64,

    /// Sample count at or above which a cell can be classified `medium`.
    #[serde(default = "default_medium_count")]
    pub medium_count: u32,

    /// Trailing window of samples fed to congestion detection, hours.
    #[serde(default = "default_congestion_window_hours")]
    pub congestion_window_hours: i64,

    /// Trailing window of samples fed to travel-time estimation, hours.
    #[serde(default = "default_travel_time_window_hours")]
    pub travel_time_window_hours: i64,

    /// Seconds between periodic analytics sweeps in the engine.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Age beyond which traffic history is purged, days.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            min_cell_vehicles: default_min_cell_vehicles(),
            high_speed_threshold: default_high_speed_threshold(),
            high_count: default_high_count(),
            medium_speed_threshold: default_medium_speed_threshold(),
            medium_count: default_medium_count(),
            congestion_window_hours: default_congestion_window_hours(),
            travel_time_window_hours: default_travel_time_window_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_days: default_retention_days(),
        }
    }
}

const fn default_cell_size() -> f64 {
    100.0
}

const fn default_min_cell_vehicles() -> u32 {
    5
}

const fn default_high_speed_threshold() -> f64 {
    30.0
}

const fn default_high_count() -> u32 {
    10
}

const fn default_medium_speed_threshold() -> f64 {
    50.0
}

const fn default_medium_count() -> u32 {
    7
}

const fn default_congestion_window_hours() -> i64 {
    1
}

const fn default_travel_time_window_hours() -> i64 {
    24
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

const fn default_retention_days() -> i64 {
    7
}
