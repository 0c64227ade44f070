//! Ride telemetry aggregates.
//!
//! These are computed on read from the ride's log points and never stored.

use serde::Serialize;

/// Derived metrics for one ride.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RideStats {
    // ─── Totals ──────────────────────────────────────────────────
    /// Sum of distance-since-last (meters)
    pub total_distance_m: f64,
    /// Sum of duration-since-last (milliseconds)
    pub total_duration_ms: u64,

    // ─── Moving ──────────────────────────────────────────────────
    /// Duration of intervals above the speed floor (milliseconds)
    pub moving_duration_ms: u64,
    /// Distance covered during moving intervals (meters)
    pub moving_distance_m: f64,

    // ─── Speeds (m/s) ────────────────────────────────────────────
    pub average_speed_m_s: f64,
    pub average_moving_speed_m_s: f64,
    pub max_speed_m_s: f64,

    // ─── Sensors ─────────────────────────────────────────────────
    pub average_cadence: Option<f64>,
    pub average_heart_rate: Option<f64>,

    /// Number of log points the aggregate was computed from
    pub point_count: usize,
}
