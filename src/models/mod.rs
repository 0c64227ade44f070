// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod fix;
pub mod log_point;
pub mod ride;
pub mod stats;

pub use fix::{ActivityType, ActivityUpdate, Fix, SensorSample};
pub use log_point::LogPoint;
pub use ride::{Ride, RideEvent, RideId, RideState, RideStateChange, ToggleOutcome};
pub use stats::RideStats;
