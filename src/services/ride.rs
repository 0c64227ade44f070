// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride state machine.
//!
//! Owns the lifecycle of ride records:
//! 1. Create a ride (`Created`)
//! 2. Activate, pause and resume it (`Active` / `Paused`)
//! 3. Stop it (`Stopped`, read-only) or delete it with its log
//!
//! At most one ride is `Active` at a time. Transitions are serialized by a
//! single async mutex that also guards the current-ride pointer, and every
//! committed change is published on the ride-change feed.

use crate::db::RideStore;
use crate::error::{AppError, Result};
use crate::models::{
    LogPoint, Ride, RideEvent, RideId, RideState, RideStateChange, ToggleOutcome,
};
use crate::services::listeners::{ListenerRegistry, SubscriptionId};
use crate::services::notifications::{Notification, NotificationSink};
use crate::services::tasks::BackgroundTasks;
use crate::time_utils::Clock;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cloneable handle; clones share the transition lock and the change feed.
#[derive(Clone)]
pub struct RideManager {
    store: Arc<dyn RideStore>,
    tasks: BackgroundTasks,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    /// The single `Active` ride, if any
    active: Arc<Mutex<Option<RideId>>>,
    changes: Arc<ListenerRegistry<RideStateChange>>,
}

impl RideManager {
    pub fn new(
        store: Arc<dyn RideStore>,
        tasks: BackgroundTasks,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            tasks,
            clock,
            notifier,
            active: Arc::new(Mutex::new(None)),
            changes: Arc::new(ListenerRegistry::without_hooks("ride_state")),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────

    pub async fn create(&self, name: Option<String>) -> Result<Ride> {
        let store = Arc::clone(&self.store);
        let now = self.clock.now();
        let ride = self.tasks.run(move || store.insert_ride(name, now)).await?;
        tracing::info!(ride_id = %ride.id, "Ride created");
        Ok(ride)
    }

    /// Fetch a ride. Fails with `UnknownRide` if it does not exist.
    pub async fn get_ride(&self, id: RideId) -> Result<Ride> {
        self.load(id).await?.ok_or(AppError::UnknownRide(id))
    }

    pub async fn list_rides(&self) -> Result<Vec<Ride>> {
        let store = Arc::clone(&self.store);
        self.tasks.run(move || store.list_rides()).await
    }

    pub async fn exists(&self, id: RideId) -> Result<bool> {
        Ok(self.load(id).await?.is_some())
    }

    pub async fn state(&self, id: RideId) -> Result<RideState> {
        Ok(self.get_ride(id).await?.state)
    }

    /// Recorded log points of a ride, oldest first.
    pub async fn log_points(&self, id: RideId) -> Result<Vec<LogPoint>> {
        let store = Arc::clone(&self.store);
        self.tasks.run(move || store.log_points(id)).await
    }

    /// The ride currently `Active`, if any.
    pub async fn current_ride(&self) -> Option<RideId> {
        *self.active.lock().await
    }

    // ─── Transitions ─────────────────────────────────────────────

    pub async fn activate(&self, id: RideId) -> Result<Ride> {
        self.transition(id, |_| Ok(RideEvent::Activate))
            .await
            .map(|(ride, _)| ride)
    }

    pub async fn pause(&self, id: RideId) -> Result<Ride> {
        self.transition(id, |_| Ok(RideEvent::Pause))
            .await
            .map(|(ride, _)| ride)
    }

    pub async fn stop(&self, id: RideId) -> Result<Ride> {
        self.transition(id, |_| Ok(RideEvent::Stop))
            .await
            .map(|(ride, _)| ride)
    }

    /// Media-button behavior: pause an active ride, activate any other
    /// resumable one.
    pub async fn toggle(&self, id: RideId) -> Result<(Ride, ToggleOutcome)> {
        let (ride, event) = self
            .transition(id, |state| match state {
                RideState::Created | RideState::Paused => Ok(RideEvent::Activate),
                RideState::Active => Ok(RideEvent::Pause),
                RideState::Stopped => Err(AppError::InvalidTransition {
                    ride_id: id,
                    from: state,
                    event: RideEvent::Activate,
                }),
            })
            .await?;

        let outcome = match event {
            RideEvent::Pause => ToggleOutcome::Paused,
            _ => ToggleOutcome::Activated,
        };
        Ok((ride, outcome))
    }

    /// Delete a ride and its log. Clears the current-ride pointer if the
    /// ride was active.
    pub async fn delete(&self, id: RideId) -> Result<Ride> {
        let mut active = self.active.lock().await;

        let store = Arc::clone(&self.store);
        let Some(ride) = self.tasks.run(move || store.delete_ride(id)).await? else {
            if *active == Some(id) {
                self.drop_vanished(&mut active, id);
            }
            return Err(AppError::UnknownRide(id));
        };

        if *active == Some(id) {
            *active = None;
        }
        tracing::info!(ride_id = %id, state = %ride.state, "Ride deleted");

        self.publish(RideStateChange {
            ride_id: id,
            from: ride.state,
            to: None,
        });
        Ok(ride)
    }

    /// Clear the current-ride pointer if it names `id` and the ride is no
    /// longer in storage. Returns whether the pointer was cleared.
    pub async fn forget(&self, id: RideId) -> Result<bool> {
        let mut active = self.active.lock().await;
        if *active != Some(id) || self.load(id).await?.is_some() {
            return Ok(false);
        }
        self.drop_vanished(&mut active, id);
        Ok(true)
    }

    // ─── Change feed ─────────────────────────────────────────────

    /// Receive every committed state change. Listeners run while the
    /// transition lock is held and must not block.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&RideStateChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.changes.unsubscribe(id)
    }

    // ─── Internals ───────────────────────────────────────────────

    async fn load(&self, id: RideId) -> Result<Option<Ride>> {
        let store = Arc::clone(&self.store);
        self.tasks.run(move || store.get_ride(id)).await
    }

    /// Apply the event chosen by `choose` for the ride's current state.
    ///
    /// Holds the transition lock from lookup to publication, so the
    /// single-active-ride check and the state write are one atomic step.
    async fn transition<F>(&self, id: RideId, choose: F) -> Result<(Ride, RideEvent)>
    where
        F: FnOnce(RideState) -> Result<RideEvent>,
    {
        let mut active = self.active.lock().await;

        let Some(ride) = self.load(id).await? else {
            if *active == Some(id) {
                self.drop_vanished(&mut active, id);
            }
            return Err(AppError::UnknownRide(id));
        };
        let from = ride.state;
        let event = choose(from)?;
        let to = from.apply(event).ok_or(AppError::InvalidTransition {
            ride_id: id,
            from,
            event,
        })?;

        if to == RideState::Active {
            if let Some(current) = *active {
                if current != id && self.load(current).await?.is_none() {
                    self.drop_vanished(&mut active, current);
                }
            }
            if let Some(current) = *active {
                if current != id {
                    tracing::warn!(requested = %id, active = %current, "Another ride is already active");
                    return Err(AppError::ConflictingActiveRide {
                        requested: id,
                        active: current,
                    });
                }
            }
        }

        let updated = Ride {
            state: to,
            updated_at: self.clock.now(),
            ..ride
        };
        let store = Arc::clone(&self.store);
        let record = updated.clone();
        self.tasks.run(move || store.update_ride(&record)).await?;

        if to == RideState::Active {
            *active = Some(id);
        } else if *active == Some(id) {
            *active = None;
        }
        tracing::info!(ride_id = %id, %from, %to, %event, "Ride state changed");

        self.publish(RideStateChange {
            ride_id: id,
            from,
            to: Some(to),
        });
        Ok((updated, event))
    }

    /// The active ride was removed from storage behind our back.
    fn drop_vanished(&self, active: &mut Option<RideId>, id: RideId) {
        tracing::warn!(ride_id = %id, "Active ride no longer exists; clearing current ride");
        *active = None;
        self.publish(RideStateChange {
            ride_id: id,
            from: RideState::Active,
            to: None,
        });
    }

    fn publish(&self, change: RideStateChange) {
        self.changes.dispatch(&change);
        self.notifier.notify(Notification::RideStateChanged(change));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::sync_utils::lock;
    use crate::time_utils::ManualClock;
    use chrono::{TimeZone, Utc};
    use tokio::runtime::Handle;

    #[derive(Default)]
    struct Recorded(std::sync::Mutex<Vec<Notification>>);

    impl NotificationSink for Recorded {
        fn notify(&self, notification: Notification) {
            lock(&self.0).push(notification);
        }
    }

    fn manager() -> (RideManager, Arc<MemoryStore>, Arc<Recorded>) {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(Recorded::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        ));
        let manager = RideManager::new(
            store.clone(),
            BackgroundTasks::new(Handle::current()),
            clock,
            sink.clone(),
        );
        (manager, store, sink)
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (rides, _, _) = manager();
        let ride = rides.create(Some("Morning loop".to_string())).await.unwrap();
        assert_eq!(ride.state, RideState::Created);
        assert_eq!(rides.current_ride().await, None);

        rides.activate(ride.id).await.unwrap();
        assert_eq!(rides.current_ride().await, Some(ride.id));

        rides.pause(ride.id).await.unwrap();
        assert_eq!(rides.state(ride.id).await.unwrap(), RideState::Paused);
        assert_eq!(rides.current_ride().await, None);

        rides.activate(ride.id).await.unwrap();
        let stopped = rides.stop(ride.id).await.unwrap();
        assert_eq!(stopped.state, RideState::Stopped);
        assert_eq!(stopped.created_at, ride.created_at);
        assert_eq!(rides.current_ride().await, None);
    }

    #[tokio::test]
    async fn test_conflicting_activation_leaves_states_unchanged() {
        let (rides, _, sink) = manager();
        let first = rides.create(None).await.unwrap();
        let second = rides.create(None).await.unwrap();
        rides.activate(first.id).await.unwrap();
        let published = lock(&sink.0).len();

        let err = rides.activate(second.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::ConflictingActiveRide { requested, active }
                if requested == second.id && active == first.id
        ));
        assert_eq!(rides.state(first.id).await.unwrap(), RideState::Active);
        assert_eq!(rides.state(second.id).await.unwrap(), RideState::Created);
        assert_eq!(rides.current_ride().await, Some(first.id));
        assert_eq!(lock(&sink.0).len(), published);
    }

    #[tokio::test]
    async fn test_illegal_transitions_are_rejected() {
        let (rides, _, _) = manager();
        let ride = rides.create(None).await.unwrap();

        let err = rides.pause(ride.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { from: RideState::Created, .. }));

        rides.activate(ride.id).await.unwrap();
        let err = rides.activate(ride.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { from: RideState::Active, .. }));

        rides.stop(ride.id).await.unwrap();
        for result in [
            rides.activate(ride.id).await,
            rides.pause(ride.id).await,
            rides.stop(ride.id).await,
        ] {
            assert!(matches!(
                result,
                Err(AppError::InvalidTransition { from: RideState::Stopped, .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_unknown_ride() {
        let (rides, _, _) = manager();
        let missing = RideId(404);
        assert!(!rides.exists(missing).await.unwrap());
        assert!(matches!(
            rides.activate(missing).await,
            Err(AppError::UnknownRide(id)) if id == missing
        ));
        assert!(matches!(
            rides.delete(missing).await,
            Err(AppError::UnknownRide(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle() {
        let (rides, _, _) = manager();
        let ride = rides.create(None).await.unwrap();

        let (_, outcome) = rides.toggle(ride.id).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Activated);
        let (paused, outcome) = rides.toggle(ride.id).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Paused);
        assert_eq!(paused.state, RideState::Paused);
        let (_, outcome) = rides.toggle(ride.id).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Activated);

        rides.stop(ride.id).await.unwrap();
        assert!(matches!(
            rides.toggle(ride.id).await,
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_active_ride_clears_pointer_and_log() {
        let (rides, store, _) = manager();
        let ride = rides.create(None).await.unwrap();
        rides.activate(ride.id).await.unwrap();
        store
            .insert_log_point(&LogPoint::from_fix(
                ride.id,
                &crate::models::Fix::new(37.4, -122.1, Utc::now()),
                None,
                Default::default(),
            ))
            .unwrap();

        let deleted = rides.delete(ride.id).await.unwrap();
        assert_eq!(deleted.state, RideState::Active);
        assert_eq!(rides.current_ride().await, None);
        assert_eq!(store.log_point_count(), 0);
        assert!(matches!(
            rides.log_points(ride.id).await,
            Err(AppError::UnknownRide(_))
        ));

        // A new ride can become active
        let next = rides.create(None).await.unwrap();
        rides.activate(next.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_ride_vanished_from_storage_releases_pointer() {
        let (rides, store, _) = manager();
        let phantom = rides.create(None).await.unwrap();
        let other = rides.create(None).await.unwrap();
        rides.activate(phantom.id).await.unwrap();
        store.delete_ride(phantom.id).unwrap();

        // The conflict check sees through the stale pointer
        rides.activate(other.id).await.unwrap();
        assert_eq!(rides.current_ride().await, Some(other.id));
        assert!(!rides.forget(other.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_forget_and_delete_clear_vanished_ride() {
        let (rides, store, sink) = manager();
        let ride = rides.create(None).await.unwrap();
        rides.activate(ride.id).await.unwrap();
        store.delete_ride(ride.id).unwrap();

        assert!(rides.forget(ride.id).await.unwrap());
        assert_eq!(rides.current_ride().await, None);
        assert!(matches!(
            lock(&sink.0).last(),
            Some(Notification::RideStateChanged(RideStateChange { to: None, .. }))
        ));

        let again = rides.create(None).await.unwrap();
        rides.activate(again.id).await.unwrap();
        store.delete_ride(again.id).unwrap();
        assert!(matches!(
            rides.delete(again.id).await,
            Err(AppError::UnknownRide(_))
        ));
        assert_eq!(rides.current_ride().await, None);
    }

    #[tokio::test]
    async fn test_change_feed() {
        let (rides, _, sink) = manager();
        let changes = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = Arc::clone(&changes);
        rides.subscribe(move |change| lock(&seen).push(*change));

        let ride = rides.create(None).await.unwrap();
        rides.activate(ride.id).await.unwrap();
        rides.pause(ride.id).await.unwrap();
        rides.activate(ride.id).await.unwrap();
        rides.delete(ride.id).await.unwrap();

        let changes = lock(&changes).clone();
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0].to, Some(RideState::Active));
        assert!(changes[2].is_resume());
        assert_eq!(
            changes[3],
            RideStateChange {
                ride_id: ride.id,
                from: RideState::Active,
                to: None
            }
        );
        assert!(changes[3].leaves_active());
        assert_eq!(lock(&sink.0).len(), 4);
    }
}
