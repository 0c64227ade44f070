// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recorded log point model.

use crate::models::{Fix, RideId, SensorSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded sample in a ride's append-only log.
///
/// `duration_since_last_ms` and `distance_since_last_m` are both `None` on
/// a segment boundary (first point of a ride, or first point after resume).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPoint {
    pub ride_id: RideId,
    pub recorded_at: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elevation: Option<f64>,
    pub duration_since_last_ms: Option<u64>,
    pub distance_since_last_m: Option<f64>,
    /// Instantaneous speed in m/s, derived from distance / duration
    pub speed: Option<f64>,
    pub cadence: Option<f64>,
    pub heart_rate: Option<u32>,
}

impl LogPoint {
    /// Build a point from an accepted fix, diffing against the previously
    /// recorded fix of the same segment (if any).
    pub fn from_fix(
        ride_id: RideId,
        fix: &Fix,
        previous: Option<&Fix>,
        sensors: SensorSample,
    ) -> Self {
        let (duration, distance, speed) = match previous {
            Some(prev) => {
                let duration_ms = (fix.timestamp - prev.timestamp).num_milliseconds().max(0) as u64;
                let distance = prev.distance_to(fix);
                let speed = (duration_ms > 0).then(|| distance / (duration_ms as f64 / 1000.0));
                (Some(duration_ms), Some(distance), speed)
            }
            None => (None, None, None),
        };

        Self {
            ride_id,
            recorded_at: fix.timestamp,
            lat: Some(fix.lat),
            lon: Some(fix.lon),
            elevation: fix.elevation,
            duration_since_last_ms: duration,
            distance_since_last_m: distance,
            speed,
            cadence: sensors.cadence,
            heart_rate: sensors.heart_rate,
        }
    }

    pub fn is_segment_boundary(&self) -> bool {
        self.duration_since_last_ms.is_none() || self.distance_since_last_m.is_none()
    }

    /// Speed from the stored distance and duration, when both are present.
    pub fn derived_speed(&self) -> Option<f64> {
        match (self.distance_since_last_m, self.duration_since_last_ms) {
            (Some(distance), Some(duration)) if duration > 0 => {
                Some(distance / (duration as f64 / 1000.0))
            }
            _ => None,
        }
    }
}
