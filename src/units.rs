// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unit conversion and display formatting for telemetry values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const M_S_TO_KM_H: f64 = 3.6;
const M_S_TO_MPH: f64 = 2.2369363;
const M_TO_KM: f64 = 0.001;
const M_TO_MI: f64 = 0.00062137119;

/// Converted speeds at or above this are shown as whole numbers.
const WHOLE_UNIT_THRESHOLD: f64 = 20.0;
/// Converted speeds at or above this are shown to the nearest half unit.
const HALF_UNIT_THRESHOLD: f64 = 5.0;

/// Unit system for formatted values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Convert m/s to km/h or mph.
    pub fn speed(self, meters_per_second: f64) -> f64 {
        match self {
            UnitSystem::Metric => meters_per_second * M_S_TO_KM_H,
            UnitSystem::Imperial => meters_per_second * M_S_TO_MPH,
        }
    }

    /// Convert meters to km or miles.
    pub fn distance(self, meters: f64) -> f64 {
        match self {
            UnitSystem::Metric => meters * M_TO_KM,
            UnitSystem::Imperial => meters * M_TO_MI,
        }
    }

    pub fn speed_unit(self) -> &'static str {
        match self {
            UnitSystem::Metric => "km/h",
            UnitSystem::Imperial => "mph",
        }
    }

    pub fn distance_unit(self) -> &'static str {
        match self {
            UnitSystem::Metric => "km",
            UnitSystem::Imperial => "miles",
        }
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            other => Err(format!("unknown unit system: {}", other)),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => f.write_str("metric"),
            UnitSystem::Imperial => f.write_str("imperial"),
        }
    }
}

fn suffix(with_unit: bool, unit: &str) -> String {
    if with_unit {
        format!(" {}", unit)
    } else {
        String::new()
    }
}

/// Format a speed for display.
///
/// Rounding depends on the converted value: whole units from 20 up, the
/// nearest half unit from 5 up, one decimal below that. A speed of exactly
/// zero is shown as `0`.
pub fn format_speed(meters_per_second: f64, units: UnitSystem, with_unit: bool) -> String {
    let unit = suffix(with_unit, units.speed_unit());
    if meters_per_second == 0.0 {
        return format!("0{}", unit);
    }

    let converted = units.speed(meters_per_second);
    if converted >= WHOLE_UNIT_THRESHOLD {
        return format!("{}{}", converted.round() as i64, unit);
    }

    let shown = if converted >= HALF_UNIT_THRESHOLD {
        (converted * 2.0).round() / 2.0
    } else {
        converted
    };
    format!("{:.1}{}", shown, unit)
}

/// Format a distance for display with two decimals (`0` when nothing was covered).
pub fn format_distance(meters: f64, units: UnitSystem, with_unit: bool) -> String {
    let unit = suffix(with_unit, units.distance_unit());
    if meters == 0.0 {
        return format!("0{}", unit);
    }
    format!("{:.2}{}", units.distance(meters), unit)
}

/// Format a cadence in rpm, `?` when unknown.
pub fn format_cadence(cadence: Option<f64>, with_unit: bool) -> String {
    let unit = suffix(with_unit, "rpm");
    match cadence {
        Some(rpm) => format!("{:.0}{}", rpm, unit),
        None => format!("?{}", unit),
    }
}

/// Format a heart rate in bpm.
pub fn format_heart_rate(bpm: u32, with_unit: bool) -> String {
    format!("{}{}", bpm, suffix(with_unit, "bpm"))
}
