// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::models::{RideEvent, RideId, RideState};
use crate::services::sources::SensorError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Ride {active} is already active; pause or stop it before activating ride {requested}")]
    ConflictingActiveRide { requested: RideId, active: RideId },

    #[error("Unknown ride: {0}")]
    UnknownRide(RideId),

    #[error("Cannot {event} ride {ride_id} while it is {from}")]
    InvalidTransition {
        ride_id: RideId,
        from: RideState,
        event: RideEvent,
    },

    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(#[from] SensorError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::ConflictingActiveRide { .. } => (
                StatusCode::CONFLICT,
                "conflicting_active_ride",
                Some(self.to_string()),
            ),
            AppError::UnknownRide(_) => {
                (StatusCode::NOT_FOUND, "unknown_ride", Some(self.to_string()))
            }
            AppError::InvalidTransition { .. } => (
                StatusCode::CONFLICT,
                "invalid_transition",
                Some(self.to_string()),
            ),
            AppError::SensorUnavailable(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "sensor_unavailable",
                Some(err.to_string()),
            ),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

/// Result type alias for services and handlers
pub type Result<T> = std::result::Result<T, AppError>;
