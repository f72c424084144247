//! Enumeration types shared across the Gridlock workspace.

use serde::{Deserialize, Serialize};

/// Category of a simulated vehicle.
///
/// The category is fixed at spawn time and determines the speed range the
/// vehicle's maximum speed is drawn from, and the relative likelihood of
/// the category being chosen at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    /// Passenger car.
    Car,
    /// Heavy goods vehicle.
    Truck,
    /// Public transit bus.
    Bus,
    /// Motorcycle.
    Motorcycle,
}

impl VehicleClass {
    /// All vehicle classes in spawn-weight order.
    pub const ALL: [Self; 4] = [Self::Car, Self::Truck, Self::Bus, Self::Motorcycle];

    /// Stable lowercase name, matching the database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Bus => "bus",
            Self::Motorcycle => "motorcycle",
        }
    }
}

impl core::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a detected congestion cell.
///
/// Only cells that reach at least [`CongestionLevel::Low`] are ever
/// recorded; a cell below every threshold emits nothing at all, so there
/// is no `None` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLevel {
    /// Enough vehicles to be worth recording, but traffic still flows.
    Low,
    /// Slowed traffic with elevated density.
    Medium,
    /// Near-standstill traffic at high density.
    High,
}

impl CongestionLevel {
    /// Stable lowercase name, matching the database enum.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl core::fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_serde_uses_snake_case() {
        let json = serde_json::to_string(&VehicleClass::Motorcycle).unwrap_or_default();
        assert_eq!(json, "\"motorcycle\"");
    }

    #[test]
    fn class_display_matches_as_str() {
        for class in VehicleClass::ALL {
            assert_eq!(class.to_string(), class.as_str());
        }
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(CongestionLevel::Low < CongestionLevel::Medium);
        assert!(CongestionLevel::Medium < CongestionLevel::High);
    }
}
