use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::BookingError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/initializeSeats", get(initialize_seats).post(initialize_seats))
        .route("/reinitializeSeats", post(reinitialize_seats))
        .route("/bookSeats", post(book_seats))
        .route("/seats", get(list_seats))
        .route("/seats/status", get(seat_status))
}

/* ---------- POOL LIFECYCLE ---------- */

// GET|POST /initializeSeats
async fn initialize_seats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    let outcome = state
        .engine
        .initialize_within(state.config.app.request_timeout())
        .await?;
    Ok((StatusCode::OK, outcome.message()))
}

// POST /reinitializeSeats
async fn reinitialize_seats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    state
        .engine
        .reinitialize_within(state.config.app.request_timeout())
        .await?;
    Ok((StatusCode::OK, "Seats reinitialized"))
}

/* ---------- BOOKING ---------- */

#[derive(Debug, Deserialize, Validate)]
struct BookSeatsRequest {
    #[serde(rename = "seatCount")]
    #[validate(range(min = 1))]
    seat_count: i64,
}

#[derive(Debug, Serialize)]
struct BookSeatsResponse {
    message: &'static str,
    #[serde(rename = "seatNumbers")]
    seat_numbers: Vec<i32>,
}

fn invalid_seat_count() -> BookingError {
    BookingError::InvalidRequest("Invalid seat count".to_string())
}

// POST /bookSeats
async fn book_seats(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BookSeatsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!("bookSeats body rejected: {}", e.body_text());
        invalid_seat_count()
    })?;
    req.validate().map_err(|_| invalid_seat_count())?;

    let seat_numbers = state
        .engine
        .book_within(req.seat_count, state.config.app.request_timeout())
        .await?;

    Ok((
        StatusCode::OK,
        Json(BookSeatsResponse {
            message: "Seats booked successfully",
            seat_numbers,
        }),
    ))
}

/* ---------- SEATS ---------- */

// GET /seats
async fn list_seats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    let seats = state
        .engine
        .list_seats_within(state.config.app.request_timeout())
        .await?;
    Ok((StatusCode::OK, Json(seats)))
}

// GET /seats/status
async fn seat_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    let status = state
        .engine
        .status_within(state.config.app.request_timeout())
        .await?;
    Ok((StatusCode::OK, Json(status)))
}
