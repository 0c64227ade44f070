// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Platform sensor sources.
//!
//! The tracker only sees these traits. Each started session hands back an
//! unbounded channel of readings; stopping the session drops the sender,
//! which ends the channel.

use crate::models::{ActivityUpdate, Fix};
use crate::sync_utils::lock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sensor failures. Never fatal: the tracker reports them as an inactive
/// GPS status and retries on the next subscriber.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SensorError {
    #[error("{0} source is not available")]
    Unavailable(&'static str),
}

/// The two ways the tracker listens to the position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSession {
    /// Fixes that go through the signal filter to location subscribers
    Tracking,
    /// Raw fixes used only to decide whether GPS is active
    StatusOnly,
}

/// Source of raw position fixes.
pub trait PositionSource: Send + Sync {
    fn start_updates(
        &self,
        session: PositionSession,
        interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<Fix>, SensorError>;

    fn stop_updates(&self, session: PositionSession);
}

/// Source of activity-recognition samples.
pub trait ActivitySource: Send + Sync {
    fn start_updates(
        &self,
        interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<ActivityUpdate>, SensorError>;

    fn stop_updates(&self);
}

/// Position source fed by [`push`](Self::push), e.g. from the HTTP API or a replay.
#[derive(Debug)]
pub struct ChannelPositionSource {
    sessions: Mutex<HashMap<PositionSession, mpsc::UnboundedSender<Fix>>>,
    available: AtomicBool,
    starts: AtomicU32,
}

impl Default for ChannelPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelPositionSource {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            starts: AtomicU32::new(0),
        }
    }

    /// Make subsequent `start_updates` calls fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Deliver a fix to every open session. Returns how many received it.
    pub fn push(&self, fix: Fix) -> usize {
        let sessions = lock(&self.sessions);
        sessions
            .values()
            .filter(|tx| tx.send(fix.clone()).is_ok())
            .count()
    }

    pub fn is_open(&self, session: PositionSession) -> bool {
        lock(&self.sessions).contains_key(&session)
    }

    /// Number of successful `start_updates` calls so far.
    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }
}

impl PositionSource for ChannelPositionSource {
    fn start_updates(
        &self,
        session: PositionSession,
        interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<Fix>, SensorError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SensorError::Unavailable("position"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        // Replaces (and so closes) any stale session of the same kind
        lock(&self.sessions).insert(session, tx);
        self.starts.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(?session, interval_ms = interval.as_millis() as u64, "Position updates started");
        Ok(rx)
    }

    fn stop_updates(&self, session: PositionSession) {
        if lock(&self.sessions).remove(&session).is_some() {
            tracing::debug!(?session, "Position updates stopped");
        }
    }
}

/// Activity-recognition source fed by [`push`](Self::push).
#[derive(Debug)]
pub struct ChannelActivitySource {
    session: Mutex<Option<mpsc::UnboundedSender<ActivityUpdate>>>,
    available: AtomicBool,
}

impl Default for ChannelActivitySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelActivitySource {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Deliver a sample to the open session. Returns false if none is open.
    pub fn push(&self, update: ActivityUpdate) -> bool {
        lock(&self.session)
            .as_ref()
            .is_some_and(|tx| tx.send(update).is_ok())
    }

    pub fn is_open(&self) -> bool {
        lock(&self.session).is_some()
    }
}

impl ActivitySource for ChannelActivitySource {
    fn start_updates(
        &self,
        interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<ActivityUpdate>, SensorError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SensorError::Unavailable("activity recognition"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.session) = Some(tx);
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Activity updates started");
        Ok(rx)
    }

    fn stop_updates(&self) {
        if lock(&self.session).take().is_some() {
            tracing::debug!("Activity updates stopped");
        }
    }
}
