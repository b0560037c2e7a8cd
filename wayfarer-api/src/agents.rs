use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_agent::{AgentApplication, AgentApplicationForm, AgentMessage, OutgoingMessage};
use wayfarer_booking::{AgentBookingSummary, Booking, BookingStatus, Commission, CommissionStatus};
use wayfarer_shared::{Page, PageRequest};

use crate::error::AppError;
use crate::middleware::{AgentUser, AuthUser};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub summary: AgentBookingSummary,
    pub unread_messages: u64,
    pub pending_requests: u64,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CommissionQuery {
    pub status: Option<CommissionStatus>,
}

/// Admins name the agent; agents omit it to claim the booking themselves.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub agent_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/agent-applications", post(submit_application))
        .route("/v1/agent/dashboard", get(dashboard))
        .route("/v1/agent/pending", get(pending_bookings))
        .route("/v1/agent/bookings", get(my_assignments))
        .route("/v1/agent/bookings/{id}/assign", post(assign_booking))
        .route("/v1/agent/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/agent/commissions", get(my_commissions))
        .route("/v1/agent/messages", get(agent_messages).post(send_message))
        .route("/v1/agent/conversations/{client_id}", get(conversation_with_client))
}

/// POST /v1/agent-applications
/// Public. A signed-in applicant gets the application linked to their account.
async fn submit_application(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Json(form): Json<AgentApplicationForm>,
) -> Result<(StatusCode, Json<AgentApplication>), AppError> {
    let application = state.applications.submit(form, auth.map(|a| a.id())).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn dashboard(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let summary = state.bookings.agent_summary(auth.id()).await?;
    let unread_messages = state.messaging.unread_count(auth.id()).await?;
    let pending_requests = state
        .bookings
        .list_pending_for_agents(&auth.actor, PageRequest::new(1, 1))
        .await?
        .total;
    Ok(Json(DashboardResponse { summary, unread_messages, pending_requests }))
}

/// Unclaimed AGENT bookings, oldest first.
async fn pending_bookings(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Booking>>, AppError> {
    Ok(Json(state.bookings.list_pending_for_agents(&auth.actor, page).await?))
}

async fn my_assignments(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
    Query(query): Query<StatusQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_agent(&auth.actor, query.status, page).await?))
}

async fn assign_booking(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<AssignRequest>>,
) -> Result<Json<Booking>, AppError> {
    let agent_id = body.and_then(|Json(req)| req.agent_id);
    Ok(Json(state.bookings.assign_agent(&auth.actor, id, agent_id).await?))
}

async fn confirm_booking(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.confirm(&auth.actor, id).await?))
}

async fn my_commissions(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
    Query(query): Query<CommissionQuery>,
) -> Result<Json<Vec<Commission>>, AppError> {
    Ok(Json(state.bookings.commissions_for_agent(&auth.actor, query.status).await?))
}

async fn agent_messages(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<AgentMessage>>, AppError> {
    Ok(Json(state.messaging.agent_messages(&auth.actor, page).await?))
}

async fn send_message(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
    Json(req): Json<OutgoingMessage>,
) -> Result<(StatusCode, Json<AgentMessage>), AppError> {
    let message = state.messaging.send_to_client(&auth.actor, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn conversation_with_client(
    State(state): State<AppState>,
    AgentUser(auth): AgentUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<AgentMessage>>, AppError> {
    Ok(Json(state.messaging.conversation(auth.id(), client_id).await?))
}
