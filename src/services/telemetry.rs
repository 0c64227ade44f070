// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Telemetry aggregation over a ride's log points.
//!
//! All functions are pure and recomputed per query. Segment boundaries
//! (points without a distance/duration since the previous point) never
//! contribute to totals or averages.

use crate::config::{Config, DEFAULT_MIN_SPEED_KMH};
use crate::models::{LogPoint, RideStats};
use std::collections::VecDeque;

/// Computes derived metrics from log points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryAggregator {
    /// Speed floor in m/s; slower intervals count as standing still
    min_speed_m_s: f64,
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SPEED_KMH / 3.6)
    }
}

impl TelemetryAggregator {
    pub fn new(min_speed_m_s: f64) -> Self {
        Self { min_speed_m_s }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.min_speed_m_s)
    }

    pub fn min_speed(&self) -> f64 {
        self.min_speed_m_s
    }

    /// All aggregates in one pass over the points.
    pub fn stats(&self, points: &[LogPoint]) -> RideStats {
        let total_distance_m = self.total_distance(points);
        let total_duration_ms = self.total_duration(points);
        let moving_distance_m = self.moving_distance(points);
        let moving_duration_ms = self.moving_duration(points);

        RideStats {
            total_distance_m,
            total_duration_ms,
            moving_duration_ms,
            moving_distance_m,
            average_speed_m_s: speed(total_distance_m, total_duration_ms),
            average_moving_speed_m_s: speed(moving_distance_m, moving_duration_ms),
            max_speed_m_s: self.max_speed(points),
            average_cadence: self.average_cadence(points),
            average_heart_rate: self.average_heart_rate(points),
            point_count: points.len(),
        }
    }

    /// Sum of distance since last (meters).
    pub fn total_distance(&self, points: &[LogPoint]) -> f64 {
        points.iter().filter_map(|p| p.distance_since_last_m).sum()
    }

    /// Sum of duration since last (milliseconds).
    pub fn total_duration(&self, points: &[LogPoint]) -> u64 {
        points.iter().filter_map(|p| p.duration_since_last_ms).sum()
    }

    /// Whether the interval ending at `point` was spent moving.
    pub fn is_moving(&self, point: &LogPoint) -> bool {
        point
            .derived_speed()
            .is_some_and(|speed| speed > self.min_speed_m_s)
    }

    pub fn moving_duration(&self, points: &[LogPoint]) -> u64 {
        points
            .iter()
            .filter(|p| self.is_moving(p))
            .filter_map(|p| p.duration_since_last_ms)
            .sum()
    }

    pub fn moving_distance(&self, points: &[LogPoint]) -> f64 {
        points
            .iter()
            .filter(|p| self.is_moving(p))
            .filter_map(|p| p.distance_since_last_m)
            .sum()
    }

    /// Total distance over total duration, in m/s (0 for an empty ride).
    pub fn average_speed(&self, points: &[LogPoint]) -> f64 {
        speed(self.total_distance(points), self.total_duration(points))
    }

    /// Moving distance over moving duration, in m/s.
    pub fn average_moving_speed(&self, points: &[LogPoint]) -> f64 {
        speed(self.moving_distance(points), self.moving_duration(points))
    }

    pub fn max_speed(&self, points: &[LogPoint]) -> f64 {
        points
            .iter()
            .map(|p| self.display_speed(p))
            .fold(0.0, f64::max)
    }

    pub fn average_cadence(&self, points: &[LogPoint]) -> Option<f64> {
        mean(points.iter().filter_map(|p| p.cadence))
    }

    pub fn average_heart_rate(&self, points: &[LogPoint]) -> Option<f64> {
        mean(points.iter().filter_map(|p| p.heart_rate.map(f64::from)))
    }

    /// Speed shown for a single point: the recorded speed (or the one
    /// derived from distance and duration), reported as exactly 0 below
    /// the speed floor.
    pub fn display_speed(&self, point: &LogPoint) -> f64 {
        match point.speed.or_else(|| point.derived_speed()) {
            Some(speed) if speed >= self.min_speed_m_s => speed,
            _ => 0.0,
        }
    }

    /// Display speeds smoothed with a trailing moving average of `window`
    /// samples. The window restarts at every segment boundary, which is
    /// itself shown as 0.
    pub fn smoothed_speeds(&self, points: &[LogPoint], window: usize) -> Vec<f64> {
        let window = window.max(1);
        let mut segment: VecDeque<f64> = VecDeque::with_capacity(window);
        let mut smoothed = Vec::with_capacity(points.len());

        for point in points {
            if point.is_segment_boundary() {
                segment.clear();
                smoothed.push(0.0);
                continue;
            }
            if segment.len() == window {
                segment.pop_front();
            }
            segment.push_back(self.display_speed(point));
            smoothed.push(segment.iter().sum::<f64>() / segment.len() as f64);
        }
        smoothed
    }
}

fn speed(distance_m: f64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        0.0
    } else {
        distance_m / (duration_ms as f64 / 1000.0)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
