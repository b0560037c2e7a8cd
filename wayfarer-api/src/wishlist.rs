use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;
use wayfarer_catalog::{Destination, WishlistItem};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WishlistEntry {
    #[serde(flatten)]
    pub item: WishlistItem,
    pub destination: Destination,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/wishlist", get(get_wishlist))
        .route("/v1/wishlist/{destination_id}", post(add_to_wishlist).delete(remove_from_wishlist))
}

async fn get_wishlist(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<WishlistEntry>>, AppError> {
    let entries = state
        .wishlist
        .get(auth.id())
        .await?
        .into_iter()
        .map(|(item, destination)| WishlistEntry { item, destination })
        .collect();
    Ok(Json(entries))
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(destination_id): Path<Uuid>,
) -> Result<(StatusCode, Json<WishlistItem>), AppError> {
    let item = state.wishlist.add(auth.id(), destination_id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(destination_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.wishlist.remove(auth.id(), destination_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
