// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cancelable, reschedulable one-shot timer.

use crate::sync_utils::lock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

#[derive(Default)]
struct Slot {
    /// Bumped on every schedule/cancel; a firing task only runs if its
    /// generation is still current.
    generation: u64,
    pending: Option<AbortHandle>,
}

/// A single deferred action slot.
///
/// Scheduling replaces (and cancels) any pending action. Cancel is
/// idempotent, and an action whose timer fires after it was superseded or
/// cancelled does nothing.
pub struct DeferredTask {
    runtime: Handle,
    slot: Arc<Mutex<Slot>>,
}

impl DeferredTask {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Run `action` after `delay`, replacing any pending action.
    pub fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        if let Some(previous) = slot.pending.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.slot);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = lock(&shared);
                if slot.generation != generation {
                    return;
                }
                slot.pending = None;
            }
            action();
        });
        slot.pending = Some(task.abort_handle());
    }

    /// Cancel the pending action, if any.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(pending) = slot.pending.take() {
            pending.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

impl Drop for DeferredTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
