use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use wayfarer_agent::{AgentMessage, OutgoingMessage};
use wayfarer_shared::{Page, PageRequest};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Client side of agent messaging.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/messages", get(inbox))
        .route("/v1/messages/reply", post(reply))
        .route("/v1/messages/{id}/read", post(mark_read))
        .route("/v1/messages/conversations/{agent_id}", get(conversation_with_agent))
}

async fn inbox(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<AgentMessage>>, AppError> {
    Ok(Json(state.messaging.client_inbox(&auth.actor, page).await?))
}

async fn reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<OutgoingMessage>,
) -> Result<(StatusCode, Json<AgentMessage>), AppError> {
    let message = state.messaging.reply_to_agent(&auth.actor, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Agents and clients both mark their received messages here.
async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentMessage>, AppError> {
    Ok(Json(state.messaging.mark_read(&auth.actor, id).await?))
}

async fn conversation_with_agent(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<Vec<AgentMessage>>, AppError> {
    Ok(Json(state.messaging.conversation(agent_id, auth.id()).await?))
}
