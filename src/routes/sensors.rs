// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sensor ingestion and tracker status routes.
//!
//! Posted readings enter the same channel-fed sources the tracker listens
//! to, so they are filtered and recorded exactly like platform readings.

use crate::error::Result;
use crate::models::{ActivityType, ActivityUpdate, Fix, RideId, SensorSample};
use crate::services::Session;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/fixes", post(post_fix))
        .route("/api/activity", post(post_activity))
        .route("/api/sensors", post(post_sensors))
        .route("/api/status", get(get_status))
}

// ─── Fixes ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct FixRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
    pub elevation: Option<f64>,
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f32>,
    /// Defaults to the time of receipt
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct FixResponse {
    /// Number of open sensor sessions that received the fix
    pub delivered: usize,
}

async fn post_fix(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FixRequest>,
) -> Result<Json<FixResponse>> {
    request.validate()?;

    let fix = Fix {
        lat: request.lat,
        lon: request.lon,
        elevation: request.elevation,
        accuracy: request.accuracy,
        timestamp: request.timestamp.unwrap_or_else(Utc::now),
    };
    let delivered = state.positions.push(fix);
    if delivered == 0 {
        tracing::debug!("Fix received with no listening session");
    }
    Ok(Json(FixResponse { delivered }))
}

// ─── Activity recognition ────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ActivityRequest {
    pub activity: ActivityType,
    #[validate(range(max = 100))]
    pub confidence: u8,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub delivered: bool,
}

async fn post_activity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivityRequest>,
) -> Result<Json<ActivityResponse>> {
    request.validate()?;
    let delivered = state.activities.push(ActivityUpdate {
        activity: request.activity,
        confidence: request.confidence,
    });
    Ok(Json(ActivityResponse { delivered }))
}

// ─── Bike sensors ────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SensorRequest {
    #[validate(range(min = 0.0, max = 300.0))]
    pub cadence: Option<f64>,
    #[validate(range(min = 20, max = 250))]
    pub heart_rate: Option<u32>,
}

async fn post_sensors(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SensorRequest>,
) -> Result<Json<SensorSample>> {
    request.validate()?;
    state.collector.record_sensor_sample(SensorSample {
        cadence: request.cadence,
        heart_rate: request.heart_rate,
    });
    Ok(Json(state.collector.latest_sensors()))
}

// ─── Status ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub location: bool,
    pub status: bool,
    pub activity: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub gps_active: bool,
    pub current_activity: Option<ActivityUpdate>,
    pub current_ride: Option<RideId>,
    pub recording: Option<RideId>,
    pub points_written: u64,
    pub sessions: SessionStatus,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let tracker = &state.tracker;
    Json(StatusResponse {
        gps_active: tracker.is_gps_active(),
        current_activity: tracker.current_activity(),
        current_ride: state.rides.current_ride().await,
        recording: state.collector.recording(),
        points_written: state.collector.points_written(),
        sessions: SessionStatus {
            location: tracker.is_listening(Session::Location),
            status: tracker.is_listening(Session::Status),
            activity: tracker.is_listening(Session::Activity),
        },
    })
}
