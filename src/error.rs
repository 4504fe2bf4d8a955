//! Failures surfaced by the allocation engine and their HTTP mapping.

use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BookingError {
    /// Caller asked for a count that can never be granted.
    #[error("{0}")]
    InvalidRequest(String),
    /// Fewer unbooked seats exist than were requested.
    #[error("not enough seats available: requested {requested}, available {available}")]
    InsufficientAvailability { requested: usize, available: usize },
    /// Concurrent bookings kept claiming the candidates; the caller may retry.
    #[error("seat commit contended on all {attempts} attempts")]
    Contention { attempts: u32 },
    #[error("operation did not finish within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Stable machine-readable name, sent in the `x-error-kind` header.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::InvalidRequest(_) => "invalid_request",
            BookingError::InsufficientAvailability { .. } => "insufficient_availability",
            BookingError::Contention { .. } => "contention",
            BookingError::Timeout(_) => "timeout",
            BookingError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            BookingError::Store(_) => "store_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BookingError::InvalidRequest(_) | BookingError::InsufficientAvailability { .. } => {
                StatusCode::BAD_REQUEST
            }
            BookingError::Contention { .. } => StatusCode::CONFLICT,
            BookingError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            BookingError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Body text the browser client matches on
    fn public_message(&self) -> String {
        match self {
            BookingError::InvalidRequest(msg) => msg.clone(),
            BookingError::InsufficientAvailability { .. } => "Not enough seats available".to_string(),
            BookingError::Contention { .. } => {
                "Seats are being booked concurrently, please retry".to_string()
            }
            BookingError::Timeout(_) => "Request timed out".to_string(),
            BookingError::Store(StoreError::Unavailable(_)) => "Service unavailable".to_string(),
            BookingError::Store(_) => "Server error".to_string(),
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "request failed: {}", self);
        } else {
            tracing::debug!(kind = self.kind(), "request rejected: {}", self);
        }

        let mut response = (status, self.public_message()).into_response();
        response
            .headers_mut()
            .insert("x-error-kind", HeaderValue::from_static(self.kind()));
        response
    }
}
