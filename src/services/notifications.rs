// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fire-and-forget notifications for the UI layer.

use crate::models::{ActivityUpdate, RideStateChange};
use serde::Serialize;

/// Something the UI may want to react to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    RideStateChanged(RideStateChange),
    GpsStatusChanged { active: bool },
    ActivityRecognized(ActivityUpdate),
}

/// Receiver of notifications. Must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that writes every notification to the structured log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::RideStateChanged(change) => tracing::info!(
                ride_id = %change.ride_id,
                from = %change.from,
                to = ?change.to,
                "Ride state changed"
            ),
            Notification::GpsStatusChanged { active } => {
                tracing::info!(active, "GPS status changed")
            }
            Notification::ActivityRecognized(update) => tracing::debug!(
                activity = ?update.activity,
                confidence = update.confidence,
                "Activity recognized"
            ),
        }
    }
}
