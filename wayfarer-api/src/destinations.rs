use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;
use wayfarer_catalog::{Collection, Destination, DestinationQuery, DestinationReview, ReviewInput};
use wayfarer_core::CoreError;
use wayfarer_shared::{Page, PageRequest};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    #[serde(flatten)]
    pub collection: Collection,
    pub destinations: Vec<Destination>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/destinations", get(search_destinations))
        .route("/v1/destinations/{id}", get(get_destination))
        .route("/v1/destinations/{id}/reviews", get(list_reviews).post(create_review))
        .route(
            "/v1/destinations/{id}/reviews/{review_id}",
            put(update_review).delete(delete_review),
        )
        .route("/v1/collections", get(list_collections))
        .route("/v1/collections/{id}", get(get_collection))
}

/// GET /v1/destinations
async fn search_destinations(
    State(state): State<AppState>,
    Query(query): Query<DestinationQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Destination>>, AppError> {
    Ok(Json(state.catalog.search(&query, page).await?))
}

async fn get_destination(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Destination>, AppError> {
    Ok(Json(state.catalog.get_public(id).await?))
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<DestinationReview>>, AppError> {
    state.catalog.get_public(id).await?;
    Ok(Json(state.reviews.list(id, page).await?))
}

async fn create_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<DestinationReview>), AppError> {
    let review = state.reviews.create(auth.id(), id, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn update_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, review_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<DestinationReview>, AppError> {
    Ok(Json(state.reviews.update(auth.id(), id, review_id, input).await?))
}

/// Authors remove their own review; admins may remove any.
async fn delete_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.reviews.delete(auth.id(), id, review_id, auth.actor.is_admin()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_collections(State(state): State<AppState>) -> Result<Json<Vec<Collection>>, AppError> {
    Ok(Json(state.catalog.list_collections(true).await?))
}

async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionResponse>, AppError> {
    let (collection, destinations) = state.catalog.get_collection(id).await?;
    if !collection.is_published {
        return Err(CoreError::not_found("Collection", id).into());
    }
    let destinations = destinations.into_iter().filter(|d| d.is_active).collect();
    Ok(Json(CollectionResponse { collection, destinations }))
}
