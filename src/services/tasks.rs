// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background task runner for blocking work (store reads and writes).
//!
//! Work is submitted as a closure and runs on tokio's blocking pool. The
//! caller gets a [`Completion`] that can be awaited, or handed a callback
//! that runs exactly once after the work finishes.

use crate::error::{AppError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Handle to the background pool.
#[derive(Clone)]
pub struct BackgroundTasks {
    runtime: Handle,
    in_flight: Arc<AtomicU64>,
}

impl BackgroundTasks {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Runtime handle, for services that spawn their own async tasks.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Submit blocking work.
    pub fn submit<T, F>(&self, work: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let guard = InFlight::enter(&self.in_flight);
        let handle = self.runtime.spawn_blocking(move || {
            let _guard = guard;
            work()
        });
        Completion {
            handle,
            runtime: self.runtime.clone(),
        }
    }

    /// Submit blocking work and wait for its result.
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.submit(work).wait().await
    }

    /// Number of submitted tasks that have not finished yet.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

/// Counts a task as in flight until dropped, including on panic.
struct InFlight(Arc<AtomicU64>);

impl InFlight {
    fn enter(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Pending result of a submitted task.
pub struct Completion<T> {
    handle: JoinHandle<Result<T>>,
    runtime: Handle,
}

impl<T: Send + 'static> Completion<T> {
    /// Wait for the work to finish.
    pub async fn wait(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Internal(anyhow::anyhow!(
                "Background task failed: {}",
                e
            ))),
        }
    }

    /// Deliver the result to `callback` once the work completes.
    pub fn on_complete<C>(self, callback: C)
    where
        C: FnOnce(Result<T>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            let result = self.wait().await;
            callback(result);
        });
    }
}
