use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use wayfarer_core::User;

use crate::error::AppError;
use crate::middleware::{AuthUser, Claims};
use crate::state::{AppState, AuthConfig};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub email: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/session", post(session))
        .route("/v1/auth/refresh", post(refresh))
        .route("/v1/auth/logout", post(logout))
}

/// Sign a token for the account's current roles and token_version.
/// Credential checks happen upstream of this service.
pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.expose().clone(),
        roles: user.roles().iter().map(|r| r.as_str().to_string()).collect(),
        ver: user.token_version,
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
}

/// Seeds the configured bootstrap admin. No-op when `email` is blank.
pub async fn bootstrap_admin(state: &AppState, email: &str) -> Result<Option<User>, AppError> {
    if email.trim().is_empty() {
        return Ok(None);
    }
    let user = state.users.ensure_admin(email, "Administrator").await?;
    tracing::info!(user_id = %user.id, "Bootstrap admin ready");
    Ok(Some(user))
}

/// New accounts start PENDING until an admin activates them.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if req.display_name.trim().is_empty() {
        return Err(AppError::Validation("Display name is required".to_string()));
    }
    let user = state.users.register(&req.email, req.display_name.trim()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Token by email for deployments where an identity proxy has already
/// authenticated the caller. Disabled unless `auth.email_sessions` is set.
async fn session(State(state): State<AppState>, Json(req): Json<SessionRequest>) -> Result<Json<AuthResponse>, AppError> {
    if !state.auth.email_sessions {
        return Err(AppError::NotFound("Not found".to_string()));
    }
    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .filter(|u| u.is_active())
        .ok_or_else(|| AppError::Authentication("Unknown or inactive account".to_string()))?;
    let token = issue_token(&state.auth, &user)?;
    tracing::info!(user_id = %user.id, "Session issued");
    Ok(Json(AuthResponse { token, expires_in: state.auth.expiration }))
}

async fn refresh(State(state): State<AppState>, auth: AuthUser) -> Result<Json<AuthResponse>, AppError> {
    let token = issue_token(&state.auth, &auth.user)?;
    Ok(Json(AuthResponse { token, expires_in: state.auth.expiration }))
}

/// Revokes every token issued so far for this account.
async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode, AppError> {
    state.users.invalidate_tokens(auth.id()).await?;
    tracing::info!(user_id = %auth.id(), "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
