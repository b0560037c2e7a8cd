use axum::{extract::State, routing::get, Json, Router};
use wayfarer_core::{PreferencesUpdate, ProfileUpdate, User, UserPreferences, UserProfile};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/me", get(me))
        .route("/v1/me/profile", get(get_profile).put(update_profile))
        .route("/v1/me/preferences", get(get_preferences).put(update_preferences))
}

async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

async fn get_profile(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.profile(auth.id()).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.update_profile(auth.id(), req).await?))
}

async fn get_preferences(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserPreferences>, AppError> {
    Ok(Json(state.users.preferences(auth.id()).await?))
}

async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PreferencesUpdate>,
) -> Result<Json<UserPreferences>, AppError> {
    Ok(Json(state.users.update_preferences(auth.id(), req).await?))
}
