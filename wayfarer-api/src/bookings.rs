use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use wayfarer_booking::{Booking, BookingChange, BookingStatus, BookingUpdate, CreatedBooking, NewBooking};
use wayfarer_core::payment::PaymentIntent;
use wayfarer_shared::{Page, PageRequest};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking).patch(update_booking))
        .route("/v1/bookings/{id}/history", get(booking_history))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/complete", post(complete_booking))
        .route("/v1/bookings/{id}/checkout-session", post(create_checkout_session))
}

/// POST /v1/bookings
/// The response carries the routing decision (DIRECT or AGENT, and why).
async fn create_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<NewBooking>,
) -> Result<(StatusCode, Json<CreatedBooking>), AppError> {
    let created = state.bookings.create(&auth.actor, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_my_bookings(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<BookingListQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Booking>>, AppError> {
    Ok(Json(state.bookings.list_mine(&auth.actor, query.status, page).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(&auth.actor, id).await?))
}

async fn update_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<BookingUpdate>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.update(&auth.actor, id, req).await?))
}

async fn booking_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BookingChange>>, AppError> {
    Ok(Json(state.bookings.history(&auth.actor, id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel(&auth.actor, id, &req.reason).await?))
}

async fn complete_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.complete(&auth.actor, id).await?))
}

/// POST /v1/bookings/{id}/checkout-session
/// Wrapped by the payment circuit breaker.
async fn create_checkout_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentIntent>, AppError> {
    Ok(Json(state.bookings.checkout_session(&auth.actor, id).await?))
}
