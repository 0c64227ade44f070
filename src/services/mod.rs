// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - ride telemetry core.

pub mod collector;
pub mod deferred;
pub mod listeners;
pub mod location;
pub mod notifications;
pub mod ride;
pub mod signal_filter;
pub mod sources;
pub mod tasks;
pub mod telemetry;

pub use collector::LogCollector;
pub use deferred::DeferredTask;
pub use listeners::{ListenerRegistry, SessionHooks, SubscriptionId};
pub use location::{LocationTracker, Session};
pub use notifications::{Notification, NotificationSink, TracingNotifier};
pub use ride::RideManager;
pub use signal_filter::{FilterDecision, SignalFilter};
pub use sources::{
    ActivitySource, ChannelActivitySource, ChannelPositionSource, PositionSession, PositionSource,
    SensorError,
};
pub use tasks::{BackgroundTasks, Completion};
pub use telemetry::TelemetryAggregator;
