// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride record and its lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque ride identifier, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RideId(pub u64);

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideState {
    Created,
    Active,
    Paused,
    Stopped,
}

/// Events accepted by the ride state machine.
///
/// Deletion is not listed: it is valid from any state and removes the ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideEvent {
    Activate,
    Pause,
    Stop,
}

impl RideState {
    /// Target state for `event`, or `None` if the transition is illegal.
    pub fn apply(self, event: RideEvent) -> Option<RideState> {
        match (self, event) {
            (RideState::Created | RideState::Paused, RideEvent::Activate) => Some(RideState::Active),
            (RideState::Active, RideEvent::Pause) => Some(RideState::Paused),
            (RideState::Created | RideState::Active | RideState::Paused, RideEvent::Stop) => {
                Some(RideState::Stopped)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RideState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RideState::Created => "created",
            RideState::Active => "active",
            RideState::Paused => "paused",
            RideState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RideEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RideEvent::Activate => "activate",
            RideEvent::Pause => "pause",
            RideEvent::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Stored ride record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    /// User-facing label
    pub name: Option<String>,
    pub state: RideState,
    /// Immutable after creation
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
}

/// A committed ride state change. `to == None` means the ride was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RideStateChange {
    pub ride_id: RideId,
    pub from: RideState,
    pub to: Option<RideState>,
}

impl RideStateChange {
    /// True when a paused ride became active again (segment boundary).
    pub fn is_resume(&self) -> bool {
        self.from == RideState::Paused && self.to == Some(RideState::Active)
    }

    /// True when the ride stopped being the active ride.
    pub fn leaves_active(&self) -> bool {
        self.from == RideState::Active && self.to != Some(RideState::Active)
    }
}

/// Result of a toggle (headset button) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Activated,
    Paused,
}
