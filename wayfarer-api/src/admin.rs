use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_agent::{AgentApplication, ApplicationStatus};
use wayfarer_booking::{Booking, BookingFilter, BookingStats, BookingStatus, BookingType, Commission};
use wayfarer_catalog::{Collection, CollectionDraft, Destination, DestinationDraft, DestinationQuery, DestinationUpdate};
use wayfarer_core::{Role, User, UserStatus};
use wayfarer_shared::{Page, PageRequest};

use crate::destinations::CollectionResponse;
use crate::error::AppError;
use crate::middleware::AdminUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PlatformStats {
    pub users_by_status: BTreeMap<String, u64>,
    pub bookings: BookingStats,
    pub pending_applications: u64,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub status: Option<UserStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize)]
pub struct GrantRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminBookingQuery {
    pub status: Option<BookingStatus>,
    pub booking_type: Option<BookingType>,
    pub user_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    #[serde(default)]
    pub unassigned: bool,
}

impl From<AdminBookingQuery> for BookingFilter {
    fn from(q: AdminBookingQuery) -> Self {
        BookingFilter {
            user_id: q.user_id,
            agent_id: q.agent_id,
            status: q.status,
            booking_type: q.booking_type,
            unassigned: q.unassigned,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForceStatusRequest {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewDecision {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionUpdateRequest {
    pub destination_ids: Option<Vec<Uuid>>,
    pub is_published: Option<bool>,
    pub description: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/stats", get(platform_stats))
        // Users
        .route("/v1/admin/users", get(list_users))
        .route("/v1/admin/users/{id}", get(get_user).delete(delete_user))
        .route("/v1/admin/users/{id}/status", post(change_user_status))
        .route("/v1/admin/users/{id}/roles", post(grant_role))
        .route("/v1/admin/users/{id}/roles/{role}", delete(revoke_role))
        // Catalog
        .route("/v1/admin/destinations", get(list_destinations).post(create_destination))
        .route(
            "/v1/admin/destinations/{id}",
            get(get_destination).patch(update_destination).delete(deactivate_destination),
        )
        .route("/v1/admin/collections", get(list_collections).post(create_collection))
        .route(
            "/v1/admin/collections/{id}",
            get(get_collection).patch(update_collection).delete(delete_collection),
        )
        // Bookings
        .route("/v1/admin/bookings", get(list_bookings))
        .route("/v1/admin/bookings/{id}/status", post(force_booking_status))
        .route("/v1/admin/commissions/{id}/pay", post(pay_commission))
        // Agent applications
        .route("/v1/admin/agent-applications", get(list_applications))
        .route("/v1/admin/agent-applications/{id}", get(get_application))
        .route("/v1/admin/agent-applications/{id}/approve", post(approve_application))
        .route("/v1/admin/agent-applications/{id}/reject", post(reject_application))
}

// ============================================================================
// Stats
// ============================================================================

async fn platform_stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<PlatformStats>, AppError> {
    let users_by_status = state
        .users
        .counts_by_status()
        .await?
        .into_iter()
        .map(|(status, n)| (status.as_str().to_string(), n))
        .collect();
    Ok(Json(PlatformStats {
        users_by_status,
        bookings: state.bookings.stats().await?,
        pending_applications: state.applications.pending_count().await?,
    }))
}

// ============================================================================
// User Management Handlers
// ============================================================================

async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<UserListQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<User>>, AppError> {
    Ok(Json(state.users.list(query.status, page).await?))
}

async fn get_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get(id).await?))
}

async fn change_user_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<User>, AppError> {
    let user = state.users.change_status(id, req.status).await?;
    tracing::info!(admin = %admin.id(), user_id = %id, status = %req.status, "User status changed by admin");
    Ok(Json(user))
}

/// Soft delete: status DELETED, profile and preferences removed.
async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if admin.id() == id {
        return Err(AppError::Validation("Administrators cannot delete their own account".to_string()));
    }
    state.users.soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn grant_role(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<GrantRoleRequest>,
) -> Result<Json<User>, AppError> {
    let role: Role = req.role.parse()?;
    Ok(Json(state.users.grant_role(id, role).await?))
}

async fn revoke_role(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path((id, role)): Path<(Uuid, String)>,
) -> Result<Json<User>, AppError> {
    let role: Role = role.parse()?;
    Ok(Json(state.users.revoke_role(id, role).await?))
}

// ============================================================================
// Catalog Handlers
// ============================================================================

/// Same filters as the public search, inactive destinations included.
async fn list_destinations(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(mut query): Query<DestinationQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Destination>>, AppError> {
    query.include_inactive = true;
    Ok(Json(state.catalog.search(&query, page).await?))
}

async fn create_destination(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<DestinationDraft>,
) -> Result<(StatusCode, Json<Destination>), AppError> {
    let destination = state.catalog.create(req).await?;
    Ok((StatusCode::CREATED, Json(destination)))
}

async fn get_destination(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Destination>, AppError> {
    Ok(Json(state.catalog.get(id).await?))
}

async fn update_destination(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DestinationUpdate>,
) -> Result<Json<Destination>, AppError> {
    Ok(Json(state.catalog.update(id, req).await?))
}

async fn deactivate_destination(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Destination>, AppError> {
    Ok(Json(state.catalog.deactivate(id).await?))
}

async fn list_collections(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Collection>>, AppError> {
    Ok(Json(state.catalog.list_collections(false).await?))
}

async fn create_collection(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<CollectionDraft>,
) -> Result<(StatusCode, Json<Collection>), AppError> {
    let collection = state.catalog.create_collection(req).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

async fn get_collection(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionResponse>, AppError> {
    let (collection, destinations) = state.catalog.get_collection(id).await?;
    Ok(Json(CollectionResponse { collection, destinations }))
}

async fn update_collection(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CollectionUpdateRequest>,
) -> Result<Json<Collection>, AppError> {
    let collection = state
        .catalog
        .update_collection(id, req.destination_ids, req.is_published, req.description)
        .await?;
    Ok(Json(collection))
}

async fn delete_collection(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_collection(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Booking Handlers
// ============================================================================

async fn list_bookings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(query): Query<AdminBookingQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Booking>>, AppError> {
    Ok(Json(state.bookings.list_all(&admin.actor, query.into(), page).await?))
}

async fn force_booking_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ForceStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.force_status(&admin.actor, id, req.status, req.reason).await?))
}

async fn pay_commission(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Commission>, AppError> {
    Ok(Json(state.bookings.pay_commission(&admin.actor, id).await?))
}

// ============================================================================
// Agent Application Handlers
// ============================================================================

async fn list_applications(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(query): Query<ApplicationListQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<AgentApplication>>, AppError> {
    Ok(Json(state.applications.list(&admin.actor, query.status, page).await?))
}

async fn get_application(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentApplication>, AppError> {
    Ok(Json(state.applications.get(&admin.actor, id).await?))
}

async fn approve_application(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewDecision>>,
) -> Result<Json<AgentApplication>, AppError> {
    let notes = body.and_then(|Json(d)| d.notes);
    Ok(Json(state.applications.approve(&admin.actor, id, notes).await?))
}

async fn reject_application(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewDecision>>,
) -> Result<Json<AgentApplication>, AppError> {
    let notes = body.and_then(|Json(d)| d.notes);
    Ok(Json(state.applications.reject(&admin.actor, id, notes).await?))
}
