// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw sensor readings: position fixes, activity recognition, and
//! bike sensor samples.

use chrono::{DateTime, Utc};
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// A single raw position reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub lat: f64,
    pub lon: f64,
    /// Meters above sea level, if the receiver reports it
    #[serde(default)]
    pub elevation: Option<f64>,
    /// Horizontal accuracy radius in meters
    #[serde(default)]
    pub accuracy: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    pub fn new(lat: f64, lon: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            accuracy: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    /// Great-circle distance to another fix, in meters.
    pub fn distance_to(&self, other: &Fix) -> f64 {
        Haversine.distance(self.point(), other.point())
    }
}

/// Device activity as reported by the activity-recognition source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    InVehicle,
    OnBicycle,
    OnFoot,
    Running,
    Still,
    Tilting,
    Walking,
    Unknown,
}

/// One activity-recognition sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityUpdate {
    pub activity: ActivityType,
    /// 0-100
    pub confidence: u8,
}

/// Reading from an external bike sensor. Either field may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Crank revolutions per minute
    #[serde(default)]
    pub cadence: Option<f64>,
    /// Beats per minute
    #[serde(default)]
    pub heart_rate: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let fix = Fix::new(37.3318, -122.0312, Utc::now());
        assert_eq!(fix.distance_to(&fix), 0.0);
    }

    #[test]
    fn test_distance_one_thousandth_degree_latitude() {
        let now = Utc::now();
        let a = Fix::new(37.0, -122.0, now);
        let b = Fix::new(37.001, -122.0, now);
        let d = a.distance_to(&b);
        // ~111 m per thousandth of a degree of latitude
        assert!((d - 111.2).abs() < 1.0, "unexpected distance {}", d);
    }
}
