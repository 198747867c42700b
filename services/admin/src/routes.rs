//! Role administration routes

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::RoleError,
    models::{
        CreateRoleParam, DeleteRoleParam, PageParams, UpdateRoleMenuParam, UpdateRoleParam,
        UpdateRoleRuleParam,
    },
    repositories::Database,
    state::AppState,
};

/// Query parameters for the paginated role listing
#[derive(Debug, Clone, Deserialize)]
pub struct RoleListParams {
    /// Substring of the role name
    pub name: Option<String>,
    pub status: Option<i32>,
    /// Page number (1-based)
    pub page: Option<u32>,
    /// Number of items per page
    pub size: Option<u32>,
}

/// Create the router for the admin service
pub fn create_router<D: Database>(state: AppState<D>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/sys/roles",
            get(get_roles_paged::<D>)
                .post(create_role::<D>)
                .delete(delete_roles::<D>),
        )
        .route("/api/v1/sys/roles/all", get(get_all_roles::<D>))
        .route(
            "/api/v1/sys/roles/:id",
            get(get_role::<D>).put(update_role::<D>),
        )
        .route("/api/v1/sys/roles/:id/menus", put(update_role_menus::<D>))
        .route("/api/v1/sys/roles/:id/rules", put(update_role_rules::<D>))
        .route("/api/v1/sys/users/:id/roles", get(get_user_roles::<D>))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "admin-service"
    }))
}

/// Get every role
pub async fn get_all_roles<D: Database>(
    State(state): State<AppState<D>>,
) -> Result<impl IntoResponse, RoleError> {
    let roles = state.role_service.list_all().await?;
    Ok(Json(roles))
}

/// Get the roles assigned to a user
pub async fn get_user_roles<D: Database>(
    State(state): State<AppState<D>>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, RoleError> {
    let roles = state.role_service.list_by_user(user_id).await?;
    Ok(Json(roles))
}

/// Get a role with its menus and data rules
pub async fn get_role<D: Database>(
    State(state): State<AppState<D>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, RoleError> {
    let role = state.role_service.get(id).await?;
    Ok(Json(role))
}

/// Get roles with pagination and filtering
pub async fn get_roles_paged<D: Database>(
    State(state): State<AppState<D>>,
    Query(params): Query<RoleListParams>,
) -> Result<impl IntoResponse, RoleError> {
    let query = state.role_service.build_query(params.name, params.status);
    let page = PageParams {
        page: params.page,
        size: params.size,
    };
    let page = state.role_service.paginate(&query, &page).await?;
    Ok(Json(page))
}

/// Create a role
pub async fn create_role<D: Database>(
    State(state): State<AppState<D>>,
    Json(payload): Json<CreateRoleParam>,
) -> Result<impl IntoResponse, RoleError> {
    let role = state.role_service.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// Update a role
pub async fn update_role<D: Database>(
    State(state): State<AppState<D>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRoleParam>,
) -> Result<impl IntoResponse, RoleError> {
    let count = state.role_service.update(id, &payload).await?;
    Ok(Json(json!({ "count": count })))
}

/// Replace the menus of a role
pub async fn update_role_menus<D: Database>(
    State(state): State<AppState<D>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRoleMenuParam>,
) -> Result<impl IntoResponse, RoleError> {
    let count = state.role_service.update_menus(id, &payload).await?;
    Ok(Json(json!({ "count": count })))
}

/// Replace the data rules of a role
pub async fn update_role_rules<D: Database>(
    State(state): State<AppState<D>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRoleRuleParam>,
) -> Result<impl IntoResponse, RoleError> {
    let count = state.role_service.update_rules(id, &payload).await?;
    Ok(Json(json!({ "count": count })))
}

/// Delete roles in batch
pub async fn delete_roles<D: Database>(
    State(state): State<AppState<D>>,
    Json(payload): Json<DeleteRoleParam>,
) -> Result<impl IntoResponse, RoleError> {
    let count = state.role_service.delete(&payload.pks).await?;
    Ok(Json(json!({ "count": count })))
}
