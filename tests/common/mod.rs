// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use ride_telemetry::config::{Config, LocationConfig};
use ride_telemetry::routes::create_router;
use ride_telemetry::services::{Notification, NotificationSink};
use ride_telemetry::AppState;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// Notification sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn gps_statuses(&self) -> Vec<bool> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::GpsStatusChanged { active } => Some(active),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

/// Config without GPS warm-up, so every accurate fix is recorded.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        location: LocationConfig {
            warmup_fix_count: 0,
            ..LocationConfig::default()
        },
        ..Config::default()
    }
}

/// Create a test app with default configuration.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    let (app, state, _) = create_test_app_with(Config::default());
    (app, state)
}

/// Create a test app with `config`, also returning the notification sink.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (Router, Arc<AppState>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let state = Arc::new(AppState::build(config, sink.clone()));
    (create_router(state.clone()), state, sink)
}

/// Send a request and decode the JSON response body.
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Poll `condition` until it holds or a second has passed.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
