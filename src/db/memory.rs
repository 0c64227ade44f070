// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory ride store backed by concurrent maps.

use crate::db::RideStore;
use crate::error::{AppError, Result};
use crate::models::{LogPoint, Ride, RideId, RideState};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-local store. Ride ids start at 1 and are never reused.
#[derive(Debug)]
pub struct MemoryStore {
    next_id: AtomicU64,
    rides: DashMap<RideId, Ride>,
    logs: DashMap<RideId, Vec<LogPoint>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            rides: DashMap::new(),
            logs: DashMap::new(),
        }
    }

    /// Total number of stored log points across all rides.
    pub fn log_point_count(&self) -> usize {
        self.logs.iter().map(|entry| entry.value().len()).sum()
    }
}

impl RideStore for MemoryStore {
    fn insert_ride(&self, name: Option<String>, created_at: DateTime<Utc>) -> Result<Ride> {
        let id = RideId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let ride = Ride {
            id,
            name,
            state: RideState::Created,
            created_at,
            updated_at: created_at,
        };
        self.rides.insert(id, ride.clone());
        Ok(ride)
    }

    fn get_ride(&self, id: RideId) -> Result<Option<Ride>> {
        Ok(self.rides.get(&id).map(|ride| ride.clone()))
    }

    fn list_rides(&self) -> Result<Vec<Ride>> {
        let mut rides: Vec<Ride> = self.rides.iter().map(|r| r.value().clone()).collect();
        rides.sort_by_key(|r| r.id);
        Ok(rides)
    }

    fn update_ride(&self, ride: &Ride) -> Result<()> {
        let mut stored = self
            .rides
            .get_mut(&ride.id)
            .ok_or(AppError::UnknownRide(ride.id))?;
        // created_at is immutable
        stored.name = ride.name.clone();
        stored.state = ride.state;
        stored.updated_at = ride.updated_at;
        Ok(())
    }

    fn delete_ride(&self, id: RideId) -> Result<Option<Ride>> {
        // Removing the ride first blocks until in-flight appends (which hold
        // the ride entry) finish; afterwards appends see UnknownRide.
        let ride = self.rides.remove(&id).map(|(_, ride)| ride);
        self.logs.remove(&id);
        Ok(ride)
    }

    fn insert_log_point(&self, point: &LogPoint) -> Result<()> {
        let _ride = self
            .rides
            .get(&point.ride_id)
            .ok_or(AppError::UnknownRide(point.ride_id))?;

        let mut log = self.logs.entry(point.ride_id).or_default();
        if let Some(last) = log.last() {
            if point.recorded_at <= last.recorded_at {
                return Err(AppError::Database(format!(
                    "log point for ride {} at {} is not after {}",
                    point.ride_id, point.recorded_at, last.recorded_at
                )));
            }
        }
        log.push(point.clone());
        Ok(())
    }

    fn log_points(&self, id: RideId) -> Result<Vec<LogPoint>> {
        if !self.rides.contains_key(&id) {
            return Err(AppError::UnknownRide(id));
        }
        Ok(self
            .logs
            .get(&id)
            .map(|log| log.clone())
            .unwrap_or_default())
    }
}
