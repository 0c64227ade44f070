// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride telemetry: the recording core of a bike computer.
//!
//! This crate turns a noisy stream of position fixes into ride recordings
//! with a well-defined lifecycle, derives speed and distance metrics from
//! them, and starts sensors only while someone is listening.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod sync_utils;
pub mod time_utils;
pub mod units;

use config::Config;
use db::{MemoryStore, RideStore};
use services::{
    BackgroundTasks, ChannelActivitySource, ChannelPositionSource, LocationTracker, LogCollector,
    NotificationSink, RideManager, TelemetryAggregator,
};
use std::sync::Arc;
use time_utils::{Clock, SystemClock};
use tokio::runtime::Handle;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RideStore>,
    pub tasks: BackgroundTasks,
    pub rides: RideManager,
    pub tracker: LocationTracker,
    pub collector: Arc<LogCollector>,
    /// Raw fixes posted to the API enter here
    pub positions: Arc<ChannelPositionSource>,
    pub activities: Arc<ChannelActivitySource>,
    pub telemetry: TelemetryAggregator,
}

impl AppState {
    /// Wire up all services with an in-memory store and the system clock.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(config: Config, notifier: Arc<dyn NotificationSink>) -> Self {
        Self::build_with(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            notifier,
        )
    }

    pub fn build_with(
        config: Config,
        store: Arc<dyn RideStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let runtime = Handle::current();
        let tasks = BackgroundTasks::new(runtime.clone());

        let positions = Arc::new(ChannelPositionSource::new());
        let activities = Arc::new(ChannelActivitySource::new());
        let tracker = LocationTracker::new(
            config.location.clone(),
            positions.clone(),
            activities.clone(),
            runtime,
        );

        let rides = RideManager::new(
            Arc::clone(&store),
            tasks.clone(),
            clock,
            Arc::clone(&notifier),
        );
        let collector = LogCollector::new(
            Arc::clone(&store),
            tasks.clone(),
            tracker.clone(),
            notifier,
        );
        collector.attach(&rides);

        Self {
            telemetry: TelemetryAggregator::from_config(&config),
            config,
            store,
            tasks,
            rides,
            tracker,
            collector,
            positions,
            activities,
        }
    }
}
