// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer for rides and their log points.
//!
//! Every call may block, so services reach the store through
//! [`BackgroundTasks`](crate::services::BackgroundTasks) rather than calling
//! it from the control thread.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{LogPoint, Ride, RideId};
use chrono::{DateTime, Utc};

/// Relational-style ride/log storage.
pub trait RideStore: Send + Sync {
    /// Create a ride in the `Created` state.
    fn insert_ride(&self, name: Option<String>, created_at: DateTime<Utc>) -> Result<Ride>;

    fn get_ride(&self, id: RideId) -> Result<Option<Ride>>;

    /// All rides, oldest first.
    fn list_rides(&self) -> Result<Vec<Ride>>;

    /// Persist a ride's mutable fields. Fails with `UnknownRide` if it is gone.
    fn update_ride(&self, ride: &Ride) -> Result<()>;

    /// Delete a ride and all of its log points. Returns the deleted ride.
    fn delete_ride(&self, id: RideId) -> Result<Option<Ride>>;

    /// Append a log point. Fails with `UnknownRide` if the ride is gone.
    fn insert_log_point(&self, point: &LogPoint) -> Result<()>;

    /// Log points of a ride in recording order.
    fn log_points(&self, id: RideId) -> Result<Vec<LogPoint>>;
}
