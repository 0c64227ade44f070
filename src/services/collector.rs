// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collection orchestrator.
//!
//! Follows the ride-change feed: while a ride is active it listens to the
//! location tracker and appends one log point per accepted fix. Pausing,
//! stopping or deleting the ride unsubscribes, which in turn lets the
//! tracker shut its sensor sessions down.

use crate::db::RideStore;
use crate::error::AppError;
use crate::models::{Fix, LogPoint, RideId, RideState, RideStateChange, SensorSample};
use crate::services::listeners::SubscriptionId;
use crate::services::location::LocationTracker;
use crate::services::notifications::{Notification, NotificationSink};
use crate::services::ride::RideManager;
use crate::services::tasks::BackgroundTasks;
use crate::sync_utils::lock;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

/// Tracker subscriptions held while a ride is recording.
#[derive(Debug, Clone, Copy)]
struct Subscriptions {
    location: SubscriptionId,
    status: SubscriptionId,
    activity: SubscriptionId,
}

#[derive(Debug, Default)]
struct RecordingState {
    ride: Option<RideId>,
    subscriptions: Option<Subscriptions>,
    /// Last fix of the current segment; `None` right after (re)activation
    previous: Option<Fix>,
    /// Timestamp of the last point queued for `ride`, kept across pauses
    last_recorded_at: Option<(RideId, DateTime<Utc>)>,
    sensors: SensorSample,
}

pub struct LogCollector {
    me: Weak<LogCollector>,
    tracker: LocationTracker,
    notifier: Arc<dyn NotificationSink>,
    writer: mpsc::UnboundedSender<LogPoint>,
    /// Set by `attach`; told about rides that vanish while recording
    rides: Mutex<Option<RideManager>>,
    state: Mutex<RecordingState>,
    written: Arc<AtomicU64>,
}

impl LogCollector {
    /// Create the collector and its log writer task.
    pub fn new(
        store: Arc<dyn RideStore>,
        tasks: BackgroundTasks,
        tracker: LocationTracker,
        notifier: Arc<dyn NotificationSink>,
    ) -> Arc<Self> {
        let (writer, rx) = mpsc::unbounded_channel();
        let written = Arc::new(AtomicU64::new(0));
        let collector = Arc::new_cyclic(|me| LogCollector {
            me: me.clone(),
            tracker,
            notifier,
            writer,
            rides: Mutex::new(None),
            state: Mutex::new(RecordingState::default()),
            written: Arc::clone(&written),
        });

        let runtime = tasks.runtime().clone();
        runtime.spawn(run_writer(
            Arc::downgrade(&collector),
            store,
            tasks,
            written,
            rx,
        ));
        collector
    }

    /// Follow ride state changes published by `rides`.
    pub fn attach(&self, rides: &RideManager) -> SubscriptionId {
        *lock(&self.rides) = Some(rides.clone());
        let collector = self.me.clone();
        rides.subscribe(move |change| {
            if let Some(collector) = collector.upgrade() {
                collector.on_ride_change(change);
            }
        })
    }

    /// Ride currently being recorded.
    pub fn recording(&self) -> Option<RideId> {
        lock(&self.state).ride
    }

    /// Number of log points persisted so far.
    pub fn points_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Update the latest bike sensor readings. Fields left `None` keep
    /// their previous value.
    pub fn record_sensor_sample(&self, sample: SensorSample) {
        let mut state = lock(&self.state);
        if sample.cadence.is_some() {
            state.sensors.cadence = sample.cadence;
        }
        if sample.heart_rate.is_some() {
            state.sensors.heart_rate = sample.heart_rate;
        }
    }

    pub fn latest_sensors(&self) -> SensorSample {
        lock(&self.state).sensors
    }

    fn on_ride_change(&self, change: &RideStateChange) {
        if change.to == Some(RideState::Active) {
            self.start(change.ride_id);
        } else if change.leaves_active() {
            self.stop(change.ride_id);
        }
    }

    fn start(&self, ride_id: RideId) {
        {
            let mut state = lock(&self.state);
            if state.ride == Some(ride_id) {
                return;
            }
            state.ride = Some(ride_id);
            // Resume is a segment boundary
            state.previous = None;
        }
        tracing::info!(ride_id = %ride_id, "Recording started");

        let me = self.me.clone();
        let location = self.tracker.add_location_listener(move |fix| {
            if let Some(collector) = me.upgrade() {
                collector.on_fix(fix);
            }
        });
        let notifier = Arc::clone(&self.notifier);
        let status = self.tracker.add_status_listener(move |active| {
            notifier.notify(Notification::GpsStatusChanged { active: *active });
        });
        let notifier = Arc::clone(&self.notifier);
        let activity = self.tracker.add_activity_listener(move |update| {
            notifier.notify(Notification::ActivityRecognized(*update));
        });

        let subscriptions = Subscriptions {
            location,
            status,
            activity,
        };
        let stale = {
            let mut state = lock(&self.state);
            if state.ride == Some(ride_id) {
                state.subscriptions.replace(subscriptions)
            } else {
                // Stopped while we were subscribing
                Some(subscriptions)
            }
        };
        if let Some(stale) = stale {
            self.release(stale);
        }
    }

    fn stop(&self, ride_id: RideId) {
        let subscriptions = {
            let mut state = lock(&self.state);
            if state.ride != Some(ride_id) {
                return;
            }
            state.ride = None;
            state.previous = None;
            state.subscriptions.take()
        };
        tracing::info!(ride_id = %ride_id, "Recording stopped");

        // Outside the state lock: the last unsubscribe stops the sensors
        if let Some(subscriptions) = subscriptions {
            self.release(subscriptions);
        }
    }

    fn release(&self, subscriptions: Subscriptions) {
        self.tracker.remove_location_listener(subscriptions.location);
        self.tracker.remove_status_listener(subscriptions.status);
        self.tracker.remove_activity_listener(subscriptions.activity);
    }

    fn on_fix(&self, fix: &Fix) {
        let point = {
            let mut state = lock(&self.state);
            let Some(ride_id) = state.ride else {
                return;
            };
            if let Some((last_ride, last_at)) = state.last_recorded_at {
                if last_ride == ride_id && fix.timestamp <= last_at {
                    tracing::debug!(ride_id = %ride_id, "Dropping out-of-order fix");
                    return;
                }
            }

            let point = LogPoint::from_fix(ride_id, fix, state.previous.as_ref(), state.sensors);
            state.previous = Some(fix.clone());
            state.last_recorded_at = Some((ride_id, fix.timestamp));
            point
        };

        if self.writer.send(point).is_err() {
            tracing::warn!("Log writer is gone; dropping point");
        }
    }
}

/// Persist queued log points one at a time, in queue order.
async fn run_writer(
    collector: Weak<LogCollector>,
    store: Arc<dyn RideStore>,
    tasks: BackgroundTasks,
    written: Arc<AtomicU64>,
    mut rx: mpsc::UnboundedReceiver<LogPoint>,
) {
    while let Some(point) = rx.recv().await {
        let ride_id = point.ride_id;
        let store = Arc::clone(&store);
        match tasks.run(move || store.insert_log_point(&point)).await {
            Ok(()) => {
                written.fetch_add(1, Ordering::Relaxed);
            }
            Err(AppError::UnknownRide(_)) => {
                // Deleted under us: stop quietly
                tracing::warn!(ride_id = %ride_id, "Ride no longer exists; stopping recording");
                let Some(collector) = collector.upgrade() else {
                    continue;
                };
                collector.stop(ride_id);
                let rides = lock(&collector.rides).clone();
                if let Some(rides) = rides {
                    if let Err(e) = rides.forget(ride_id).await {
                        tracing::error!(ride_id = %ride_id, error = %e, "Failed to clear vanished ride");
                    }
                }
            }
            Err(e) => {
                tracing::error!(ride_id = %ride_id, error = %e, "Failed to store log point");
            }
        }
    }
}
