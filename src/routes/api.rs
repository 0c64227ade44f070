// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride control and ride statistics routes.

use crate::error::Result;
use crate::models::{LogPoint, Ride, RideId, RideState, RideStats, ToggleOutcome};
use crate::time_utils::format_utc_rfc3339;
use crate::units::{format_cadence, format_distance, format_heart_rate, format_speed, UnitSystem};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Rides summarized concurrently when listing.
const MAX_CONCURRENT_SUMMARIES: usize = 8;

/// Default smoothing window for point speeds.
const DEFAULT_SMOOTHING_WINDOW: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rides", get(list_rides).post(create_ride))
        .route("/api/rides/current", get(get_current_ride))
        .route("/api/rides/{id}", get(get_ride).delete(delete_ride))
        .route("/api/rides/{id}/activate", post(activate_ride))
        .route("/api/rides/{id}/pause", post(pause_ride))
        .route("/api/rides/{id}/stop", post(stop_ride))
        .route("/api/rides/{id}/toggle", post(toggle_ride))
        .route("/api/rides/{id}/points", get(get_points))
        .route("/api/rides/{id}/stats", get(get_stats))
}

// ─── Rides ───────────────────────────────────────────────────

/// Ride as returned by the API.
#[derive(Debug, Serialize)]
pub struct RideResponse {
    pub id: RideId,
    pub name: Option<String>,
    pub state: RideState,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Ride> for RideResponse {
    fn from(ride: Ride) -> Self {
        Self {
            id: ride.id,
            name: ride.name,
            state: ride.state,
            created_at: format_utc_rfc3339(ride.created_at),
            updated_at: format_utc_rfc3339(ride.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct CreateRideRequest {
    #[validate(length(min = 1, max = 100))]
    name: Option<String>,
}

async fn create_ride(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<RideResponse>)> {
    request.validate()?;
    let ride = state.rides.create(request.name).await?;
    Ok((StatusCode::CREATED, Json(ride.into())))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<RideResponse>> {
    let ride = state.rides.get_ride(RideId(id)).await?;
    Ok(Json(ride.into()))
}

#[derive(Debug, Serialize)]
pub struct CurrentRideResponse {
    pub ride: Option<RideResponse>,
}

async fn get_current_ride(State(state): State<Arc<AppState>>) -> Result<Json<CurrentRideResponse>> {
    let ride = match state.rides.current_ride().await {
        Some(id) => Some(state.rides.get_ride(id).await?.into()),
        None => None,
    };
    Ok(Json(CurrentRideResponse { ride }))
}

async fn delete_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<RideResponse>> {
    let ride = state.rides.delete(RideId(id)).await?;
    Ok(Json(ride.into()))
}

/// Ride plus headline numbers for the list view.
#[derive(Debug, Serialize)]
pub struct RideSummary {
    #[serde(flatten)]
    pub ride: RideResponse,
    pub distance: String,
    pub duration_ms: u64,
    pub point_count: usize,
}

#[derive(Debug, Serialize)]
pub struct RidesResponse {
    pub rides: Vec<RideSummary>,
    pub current: Option<RideId>,
    pub units: UnitSystem,
}

/// List rides, oldest first, with distance and duration.
async fn list_rides(State(state): State<Arc<AppState>>) -> Result<Json<RidesResponse>> {
    let rides = state.rides.list_rides().await?;
    tracing::debug!(count = rides.len(), "Listing rides");

    let units = state.config.units;
    let state_ref = &state;
    let summaries = stream::iter(rides)
        .map(|ride| async move {
            let points = state_ref.rides.log_points(ride.id).await?;
            let telemetry = state_ref.telemetry;
            Ok::<_, crate::error::AppError>(RideSummary {
                distance: format_distance(telemetry.total_distance(&points), units, true),
                duration_ms: telemetry.total_duration(&points),
                point_count: points.len(),
                ride: ride.into(),
            })
        })
        .buffered(MAX_CONCURRENT_SUMMARIES)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        // Deleted while listing
        .filter(|summary| !matches!(summary, Err(crate::error::AppError::UnknownRide(_))))
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(RidesResponse {
        rides: summaries,
        current: state.rides.current_ride().await,
        units,
    }))
}

// ─── Transitions ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub ride: RideResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ToggleOutcome>,
}

impl TransitionResponse {
    fn new(ride: Ride) -> Json<Self> {
        Json(Self {
            ride: ride.into(),
            outcome: None,
        })
    }
}

async fn activate_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TransitionResponse>> {
    Ok(TransitionResponse::new(state.rides.activate(RideId(id)).await?))
}

async fn pause_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TransitionResponse>> {
    Ok(TransitionResponse::new(state.rides.pause(RideId(id)).await?))
}

async fn stop_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TransitionResponse>> {
    Ok(TransitionResponse::new(state.rides.stop(RideId(id)).await?))
}

/// Headset button: pause if active, otherwise activate.
async fn toggle_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TransitionResponse>> {
    let (ride, outcome) = state.rides.toggle(RideId(id)).await?;
    Ok(Json(TransitionResponse {
        ride: ride.into(),
        outcome: Some(outcome),
    }))
}

// ─── Log points ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PointsQuery {
    /// Smoothing window in samples
    #[serde(default = "default_window")]
    window: usize,
}

fn default_window() -> usize {
    DEFAULT_SMOOTHING_WINDOW
}

#[derive(Debug, Serialize)]
pub struct PointResponse {
    #[serde(flatten)]
    pub point: LogPoint,
    /// Speed after the speed floor (m/s)
    pub display_speed: f64,
    /// Trailing average of display speed within the segment (m/s)
    pub smoothed_speed: f64,
    /// Formatted smoothed speed in the configured units
    pub speed_text: String,
}

#[derive(Debug, Serialize)]
pub struct PointsResponse {
    pub ride_id: RideId,
    pub points: Vec<PointResponse>,
}

async fn get_points(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Query(params): Query<PointsQuery>,
) -> Result<Json<PointsResponse>> {
    let ride_id = RideId(id);
    let points = state.rides.log_points(ride_id).await?;
    let telemetry = state.telemetry;
    let smoothed = telemetry.smoothed_speeds(&points, params.window);

    let points = points
        .into_iter()
        .zip(smoothed)
        .map(|(point, smoothed_speed)| PointResponse {
            display_speed: telemetry.display_speed(&point),
            smoothed_speed,
            speed_text: format_speed(smoothed_speed, state.config.units, true),
            point,
        })
        .collect();

    Ok(Json(PointsResponse { ride_id, points }))
}

// ─── Statistics ──────────────────────────────────────────────

/// Aggregates formatted in the configured units.
#[derive(Debug, Serialize)]
pub struct DisplayStats {
    pub distance: String,
    pub average_speed: String,
    pub average_moving_speed: String,
    pub max_speed: String,
    pub cadence: String,
    pub heart_rate: Option<String>,
}

impl DisplayStats {
    fn new(stats: &RideStats, units: UnitSystem) -> Self {
        Self {
            distance: format_distance(stats.total_distance_m, units, true),
            average_speed: format_speed(stats.average_speed_m_s, units, true),
            average_moving_speed: format_speed(stats.average_moving_speed_m_s, units, true),
            max_speed: format_speed(stats.max_speed_m_s, units, true),
            cadence: format_cadence(stats.average_cadence, true),
            heart_rate: stats
                .average_heart_rate
                .map(|bpm| format_heart_rate(bpm.round() as u32, true)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub ride_id: RideId,
    pub units: UnitSystem,
    pub stats: RideStats,
    pub display: DisplayStats,
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<StatsResponse>> {
    let ride_id = RideId(id);
    let points = state.rides.log_points(ride_id).await?;
    let stats = state.telemetry.stats(&points);
    let units = state.config.units;

    tracing::debug!(
        ride_id = %ride_id,
        points = stats.point_count,
        distance_m = stats.total_distance_m,
        "Computed ride stats"
    );

    Ok(Json(StatsResponse {
        ride_id,
        units,
        display: DisplayStats::new(&stats, units),
        stats,
    }))
}
