// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Location tracker.
//!
//! Owns three listener registries, each gating its own sensor session:
//! - location: filtered fixes (accuracy + warm-up) for recording
//! - status: whether GPS is currently delivering fixes
//! - activity: activity-recognition samples
//!
//! A session is started when its registry gains its first listener and
//! stopped when it loses its last one. Readings arrive on a pump task per
//! session.

use crate::config::LocationConfig;
use crate::models::{ActivityUpdate, Fix};
use crate::services::deferred::DeferredTask;
use crate::services::listeners::{ListenerRegistry, SessionHooks, SubscriptionId};
use crate::services::signal_filter::{FilterDecision, SignalFilter};
use crate::services::sources::{ActivitySource, PositionSession, PositionSource, SensorError};
use crate::sync_utils::lock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// The sensor sessions managed by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Location,
    Status,
    Activity,
}

/// Process-wide GPS activity, derived from fix arrival.
#[derive(Debug, Default)]
struct GpsActivityState {
    active: bool,
    last_fix_at: Option<Instant>,
    /// Cleared by `stop_session`; fixes handled after that are ignored
    session_open: bool,
}

/// Cloneable handle to the tracker.
#[derive(Clone)]
pub struct LocationTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    me: Weak<TrackerInner>,
    config: LocationConfig,
    runtime: Handle,
    positions: Arc<dyn PositionSource>,
    activities: Arc<dyn ActivitySource>,

    filter: Mutex<SignalFilter>,
    gps: Mutex<GpsActivityState>,
    check_for_active: DeferredTask,
    last_activity: Mutex<Option<ActivityUpdate>>,
    pumps: Mutex<HashMap<Session, AbortHandle>>,

    location_listeners: ListenerRegistry<Fix>,
    status_listeners: ListenerRegistry<bool>,
    activity_listeners: ListenerRegistry<ActivityUpdate>,
}

/// Starts and stops one session on subscriber-count transitions.
struct SessionControl {
    tracker: Weak<TrackerInner>,
    session: Session,
}

impl SessionHooks for SessionControl {
    fn on_first_subscriber(&self) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.start_session(self.session);
        }
    }

    fn on_last_unsubscribed(&self) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.stop_session(self.session);
        }
    }

    fn on_subscriber_joined(&self) {
        // Retry a session that failed to start for an earlier subscriber
        if let Some(tracker) = self.tracker.upgrade() {
            if !tracker.is_running(self.session) {
                tracing::info!(session = ?self.session, "Retrying sensor session");
                tracker.start_session(self.session);
            }
        }
    }
}

impl LocationTracker {
    /// Create a tracker. Pump and timer tasks are spawned on `runtime`.
    pub fn new(
        config: LocationConfig,
        positions: Arc<dyn PositionSource>,
        activities: Arc<dyn ActivitySource>,
        runtime: Handle,
    ) -> Self {
        let inner = Arc::new_cyclic(|me: &Weak<TrackerInner>| {
            let hooks = |session| SessionControl {
                tracker: me.clone(),
                session,
            };
            TrackerInner {
                me: me.clone(),
                filter: Mutex::new(SignalFilter::from_config(&config)),
                config,
                check_for_active: DeferredTask::new(runtime.clone()),
                runtime,
                positions,
                activities,
                gps: Mutex::new(GpsActivityState::default()),
                last_activity: Mutex::new(None),
                pumps: Mutex::new(HashMap::new()),
                location_listeners: ListenerRegistry::new("location", hooks(Session::Location)),
                status_listeners: ListenerRegistry::new("gps_status", hooks(Session::Status)),
                activity_listeners: ListenerRegistry::new(
                    "activity_recognition",
                    hooks(Session::Activity),
                ),
            }
        });
        Self { inner }
    }

    // ─── Location ────────────────────────────────────────────────

    /// Receive fixes that passed the signal filter.
    pub fn add_location_listener<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Fix) + Send + Sync + 'static,
    {
        self.inner.location_listeners.subscribe(listener)
    }

    pub fn remove_location_listener(&self, id: SubscriptionId) -> bool {
        self.inner.location_listeners.unsubscribe(id)
    }

    // ─── GPS status ──────────────────────────────────────────────

    /// Receive `true`/`false` whenever GPS becomes active/inactive.
    pub fn add_status_listener<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.inner.status_listeners.subscribe(listener)
    }

    pub fn remove_status_listener(&self, id: SubscriptionId) -> bool {
        self.inner.status_listeners.unsubscribe(id)
    }

    pub fn is_gps_active(&self) -> bool {
        lock(&self.inner.gps).active
    }

    // ─── Activity recognition ────────────────────────────────────

    pub fn add_activity_listener<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ActivityUpdate) + Send + Sync + 'static,
    {
        self.inner.activity_listeners.subscribe(listener)
    }

    pub fn remove_activity_listener(&self, id: SubscriptionId) -> bool {
        self.inner.activity_listeners.unsubscribe(id)
    }

    /// Last dispatched activity of the current activity session.
    pub fn current_activity(&self) -> Option<ActivityUpdate> {
        *lock(&self.inner.last_activity)
    }

    /// Whether the sensor session is currently receiving readings.
    pub fn is_listening(&self, session: Session) -> bool {
        self.inner.is_running(session)
    }

    pub fn config(&self) -> &LocationConfig {
        &self.inner.config
    }
}

impl TrackerInner {
    fn is_running(&self, session: Session) -> bool {
        lock(&self.pumps).contains_key(&session)
    }

    fn start_session(&self, session: Session) {
        let interval = self.config.interval;
        let started = match session {
            Session::Location => {
                lock(&self.filter).reset();
                self.positions
                    .start_updates(PositionSession::Tracking, interval)
                    .map(|rx| self.spawn_pump(session, rx, TrackerInner::on_location_fix))
            }
            Session::Status => {
                self.set_active(false);
                lock(&self.gps).session_open = true;
                self.positions
                    .start_updates(PositionSession::StatusOnly, interval)
                    .map(|rx| self.spawn_pump(session, rx, TrackerInner::on_status_fix))
            }
            Session::Activity => {
                *lock(&self.last_activity) = None;
                self.activities
                    .start_updates(interval)
                    .map(|rx| self.spawn_pump(session, rx, TrackerInner::on_activity_update))
            }
        };

        match started {
            Ok(()) => tracing::info!(?session, "Sensor session started"),
            Err(e) => self.report_unavailable(session, e),
        }
    }

    fn stop_session(&self, session: Session) {
        if let Some(pump) = lock(&self.pumps).remove(&session) {
            pump.abort();
        }
        match session {
            Session::Location => self.positions.stop_updates(PositionSession::Tracking),
            Session::Status => {
                self.positions.stop_updates(PositionSession::StatusOnly);
                self.check_for_active.cancel();
                // Nobody is listening, so no dispatch
                let mut gps = lock(&self.gps);
                gps.active = false;
                gps.last_fix_at = None;
                gps.session_open = false;
            }
            Session::Activity => {
                self.activities.stop_updates();
                *lock(&self.last_activity) = None;
            }
        }
        tracing::info!(?session, "Sensor session stopped");
    }

    fn spawn_pump<T: Send + 'static>(
        &self,
        session: Session,
        mut rx: mpsc::UnboundedReceiver<T>,
        handler: fn(&TrackerInner, T),
    ) {
        let tracker = self.me.clone();
        let pump = self.runtime.spawn(async move {
            while let Some(reading) = rx.recv().await {
                match tracker.upgrade() {
                    Some(tracker) => handler(&tracker, reading),
                    None => break,
                }
            }
        });
        if let Some(stale) = lock(&self.pumps).insert(session, pump.abort_handle()) {
            stale.abort();
        }
    }

    /// A sensor failed to start: recover locally and tell status listeners
    /// that GPS is not active.
    fn report_unavailable(&self, session: Session, error: SensorError) {
        tracing::warn!(?session, error = %error, "Sensor session failed to start");
        {
            let mut gps = lock(&self.gps);
            gps.active = false;
            if session == Session::Status {
                gps.session_open = false;
            }
        }
        // Dispatch off the hook's call stack so listeners may unsubscribe
        let tracker = self.me.clone();
        self.runtime.spawn(async move {
            if let Some(tracker) = tracker.upgrade() {
                tracker.status_listeners.dispatch(&false);
            }
        });
    }

    fn on_location_fix(&self, fix: Fix) {
        let decision = lock(&self.filter).accept(&fix);
        match decision {
            FilterDecision::Accepted => self.location_listeners.dispatch(&fix),
            FilterDecision::RejectedLowAccuracy => {
                tracing::debug!(accuracy = ?fix.accuracy, "Accuracy above threshold: ignore location")
            }
            FilterDecision::RejectedWarmup => tracing::debug!("Ignore first few locations"),
        }
    }

    fn on_status_fix(&self, _fix: Fix) {
        // We just received a fix so we're active, unless the session was
        // stopped while this fix was in flight
        let changed = {
            let mut gps = lock(&self.gps);
            if !gps.session_open {
                return;
            }
            gps.last_fix_at = Some(Instant::now());
            let changed = !gps.active;
            gps.active = true;
            changed
        };
        if changed {
            self.status_listeners.dispatch(&true);
        }

        let tracker = self.me.clone();
        self.check_for_active
            .schedule(self.config.inactivity_timeout(), move || {
                if let Some(tracker) = tracker.upgrade() {
                    tracker.check_for_active();
                }
            });
    }

    fn check_for_active(&self) {
        let timeout = self.config.inactivity_timeout();
        let stale = lock(&self.gps)
            .last_fix_at
            .is_none_or(|last| last.elapsed() >= timeout);
        if stale {
            self.set_active(false);
        }
    }

    fn set_active(&self, active: bool) {
        let changed = {
            let mut gps = lock(&self.gps);
            let changed = gps.active != active;
            gps.active = active;
            changed
        };
        if changed {
            self.status_listeners.dispatch(&active);
        }
    }

    fn on_activity_update(&self, update: ActivityUpdate) {
        let dispatch = {
            let mut last = lock(&self.last_activity);
            // Both the type AND the confidence must differ from the last
            // dispatched pair; a change in only one of them is swallowed.
            let changed = last.is_none_or(|previous| {
                previous.activity != update.activity && previous.confidence != update.confidence
            });
            if changed {
                *last = Some(update);
            }
            changed
        };
        if dispatch {
            self.activity_listeners.dispatch(&update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;
    use crate::services::sources::{ChannelActivitySource, ChannelPositionSource};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixture {
        tracker: LocationTracker,
        positions: Arc<ChannelPositionSource>,
        activities: Arc<ChannelActivitySource>,
    }

    fn fixture(config: LocationConfig) -> Fixture {
        let positions = Arc::new(ChannelPositionSource::new());
        let activities = Arc::new(ChannelActivitySource::new());
        let tracker = LocationTracker::new(
            config,
            positions.clone(),
            activities.clone(),
            Handle::current(),
        );
        Fixture {
            tracker,
            positions,
            activities,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn recorder<E: Clone + Send + 'static>() -> (Arc<Mutex<Vec<E>>>, impl Fn(&E) + Send + Sync) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |event: &E| lock(&sink).push(event.clone()))
    }

    #[tokio::test]
    async fn test_location_session_follows_listeners() {
        let f = fixture(LocationConfig::default());
        assert!(!f.tracker.is_listening(Session::Location));

        let a = f.tracker.add_location_listener(|_| {});
        let b = f.tracker.add_location_listener(|_| {});
        assert!(f.tracker.is_listening(Session::Location));
        assert!(f.positions.is_open(PositionSession::Tracking));
        assert_eq!(f.positions.start_count(), 1);

        f.tracker.remove_location_listener(a);
        assert!(f.positions.is_open(PositionSession::Tracking));
        f.tracker.remove_location_listener(b);
        assert!(!f.tracker.is_listening(Session::Location));
        assert!(!f.positions.is_open(PositionSession::Tracking));
    }

    #[tokio::test]
    async fn test_warmup_and_accuracy_filtering() {
        let f = fixture(LocationConfig {
            warmup_fix_count: 2,
            ..LocationConfig::default()
        });
        let (events, listener) = recorder::<Fix>();
        f.tracker.add_location_listener(listener);

        let now = Utc::now();
        f.positions.push(Fix::new(1.0, 1.0, now).with_accuracy(5.0));
        f.positions.push(Fix::new(2.0, 2.0, now).with_accuracy(99.0));
        f.positions.push(Fix::new(3.0, 3.0, now).with_accuracy(5.0));
        f.positions.push(Fix::new(4.0, 4.0, now).with_accuracy(5.0));
        f.positions.push(Fix::new(5.0, 5.0, now).with_accuracy(50.0));
        settle().await;

        let lats: Vec<f64> = lock(&events).iter().map(|fix| fix.lat).collect();
        assert_eq!(lats, vec![4.0]);
    }

    #[tokio::test]
    async fn test_warmup_restarts_with_session() {
        let f = fixture(LocationConfig {
            warmup_fix_count: 1,
            ..LocationConfig::default()
        });
        let (events, listener) = recorder::<Fix>();
        let listener = Arc::new(listener);

        let l = Arc::clone(&listener);
        let id = f.tracker.add_location_listener(move |fix| l(fix));
        f.positions.push(Fix::new(1.0, 1.0, Utc::now()));
        f.positions.push(Fix::new(2.0, 2.0, Utc::now()));
        settle().await;
        f.tracker.remove_location_listener(id);

        let l = Arc::clone(&listener);
        f.tracker.add_location_listener(move |fix| l(fix));
        f.positions.push(Fix::new(3.0, 3.0, Utc::now()));
        f.positions.push(Fix::new(4.0, 4.0, Utc::now()));
        settle().await;

        let lats: Vec<f64> = lock(&events).iter().map(|fix| fix.lat).collect();
        assert_eq!(lats, vec![2.0, 4.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_goes_active_then_times_out() {
        let f = fixture(LocationConfig::default());
        let (events, listener) = recorder::<bool>();
        f.tracker.add_status_listener(listener);
        settle().await;

        // Inaccurate fixes still count as signs of life
        f.positions
            .push(Fix::new(1.0, 1.0, Utc::now()).with_accuracy(500.0));
        settle().await;
        assert!(f.tracker.is_gps_active());
        assert_eq!(*lock(&events), vec![true]);

        tokio::time::sleep(Duration::from_millis(7999)).await;
        assert!(f.tracker.is_gps_active());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!f.tracker.is_gps_active());
        assert_eq!(*lock(&events), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_fix_reschedules_check() {
        let f = fixture(LocationConfig::default());
        let (events, listener) = recorder::<bool>();
        f.tracker.add_status_listener(listener);

        f.positions.push(Fix::new(1.0, 1.0, Utc::now()));
        settle().await;
        tokio::time::sleep(Duration::from_millis(7000)).await;
        f.positions.push(Fix::new(1.0, 1.0, Utc::now()));
        settle().await;

        // Past the first deadline: still active
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(f.tracker.is_gps_active());
        assert_eq!(*lock(&events), vec![true]);

        tokio::time::sleep(Duration::from_millis(7000)).await;
        assert!(!f.tracker.is_gps_active());
        assert_eq!(*lock(&events), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_status_session_cancels_check() {
        let f = fixture(LocationConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = f.tracker.add_status_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        f.positions.push(Fix::new(1.0, 1.0, Utc::now()));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        f.tracker.remove_status_listener(id);
        assert!(!f.tracker.is_gps_active());
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_sensor_reports_inactive_and_retries() {
        let f = fixture(LocationConfig::default());
        f.positions.set_available(false);

        let (events, listener) = recorder::<bool>();
        f.tracker.add_status_listener(listener);
        settle().await;
        assert!(!f.tracker.is_listening(Session::Status));
        assert_eq!(*lock(&events), vec![false]);

        // Next subscriber triggers a retry
        f.positions.set_available(true);
        f.tracker.add_status_listener(|_| {});
        assert!(f.tracker.is_listening(Session::Status));
        assert!(f.positions.is_open(PositionSession::StatusOnly));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_handled_after_status_stop_is_ignored() {
        let f = fixture(LocationConfig::default());
        let id = f.tracker.add_status_listener(|_| {});
        f.tracker.remove_status_listener(id);

        // A handler that was already running when the pump was aborted
        f.tracker.inner.on_status_fix(Fix::new(1.0, 1.0, Utc::now()));
        assert!(!f.tracker.is_gps_active());

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert!(!f.tracker.is_gps_active());
    }

    #[tokio::test]
    async fn test_activity_pair_resets_with_session() {
        let f = fixture(LocationConfig::default());
        let (events, listener) = recorder::<ActivityUpdate>();
        let listener = Arc::new(listener);
        let still = ActivityUpdate {
            activity: ActivityType::Still,
            confidence: 60,
        };

        let l = Arc::clone(&listener);
        let id = f.tracker.add_activity_listener(move |update| l(update));
        f.activities.push(still);
        settle().await;
        assert_eq!(f.tracker.current_activity(), Some(still));

        f.tracker.remove_activity_listener(id);
        assert_eq!(f.tracker.current_activity(), None);

        // The same pair is new again for the restarted session
        let l = Arc::clone(&listener);
        f.tracker.add_activity_listener(move |update| l(update));
        f.activities.push(still);
        settle().await;
        assert_eq!(*lock(&events), vec![still, still]);
    }

    #[tokio::test]
    async fn test_unavailable_activity_source() {
        let f = fixture(LocationConfig::default());
        f.activities.set_available(false);

        let (events, listener) = recorder::<ActivityUpdate>();
        f.tracker.add_activity_listener(listener);
        settle().await;
        assert!(!f.tracker.is_listening(Session::Activity));
        assert!(!f.activities.is_open());
        assert!(!f.activities.push(ActivityUpdate {
            activity: ActivityType::OnBicycle,
            confidence: 90,
        }));
        assert!(lock(&events).is_empty());

        // Next subscriber retries
        f.activities.set_available(true);
        f.tracker.add_activity_listener(|_| {});
        assert!(f.tracker.is_listening(Session::Activity));
        assert!(f.activities.is_open());
    }

    #[tokio::test]
    async fn test_activity_requires_both_fields_to_change() {
        let f = fixture(LocationConfig::default());
        let (events, listener) = recorder::<ActivityUpdate>();
        f.tracker.add_activity_listener(listener);
        assert!(f.activities.is_open());

        let update = |activity, confidence| ActivityUpdate {
            activity,
            confidence,
        };
        f.activities.push(update(ActivityType::Still, 60));
        // Same type, new confidence: swallowed
        f.activities.push(update(ActivityType::Still, 90));
        // New type, same confidence: swallowed
        f.activities.push(update(ActivityType::OnBicycle, 60));
        // Both changed: dispatched
        f.activities.push(update(ActivityType::OnBicycle, 85));
        settle().await;

        assert_eq!(
            *lock(&events),
            vec![
                update(ActivityType::Still, 60),
                update(ActivityType::OnBicycle, 85)
            ]
        );
        assert_eq!(
            f.tracker.current_activity(),
            Some(update(ActivityType::OnBicycle, 85))
        );
    }
}
