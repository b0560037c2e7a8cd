use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use wayfarer_booking::Booking;

use crate::error::AppError;
use crate::state::AppState;

/// Provider notification. Only the intent id is trusted; its status is
/// re-read from the provider before the booking is touched.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub intent_id: String,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<Booking>, AppError> {
    tracing::info!(
        intent_id = %payload.intent_id,
        event = payload.event_type.as_deref().unwrap_or("unspecified"),
        "Received payment webhook"
    );
    let booking = state.bookings.apply_payment_update(&payload.intent_id).await?;
    Ok(Json(booking))
}
