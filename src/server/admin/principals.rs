use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::admin::NewPrincipal;
use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{AssignBucketRequest, PaginationParams, RemovedResponse, SetActiveRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, paginate,
};
use crate::types::{BucketGrantee, PrincipalPatch};

pub async fn create_principal(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPrincipal>,
) -> impl IntoResponse {
    let principal = state.admin.create_principal(&admin, &req)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(principal))))
}

pub async fn list_principals(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let cursor = params.cursor.as_deref().unwrap_or("");

    let principals = state
        .admin
        .list_principals(&admin, cursor, DEFAULT_PAGE_SIZE + 1)?;

    let (principals, next_cursor, has_more) =
        paginate(principals, DEFAULT_PAGE_SIZE as usize, |p| p.username.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        principals,
        next_cursor,
        has_more,
    )))
}

pub async fn get_principal(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let detail = state.admin.principal_detail(&admin, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(detail)))
}

pub async fn update_principal(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<PrincipalPatch>,
) -> impl IntoResponse {
    let principal = state.admin.update_principal(&admin, &id, &patch)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(principal)))
}

pub async fn delete_principal(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let removal = state.admin.delete_principal(&admin, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(removal)))
}

pub async fn set_active(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> impl IntoResponse {
    let principal = state.admin.set_active(&admin, &id, &req.active)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(principal)))
}

pub async fn list_principal_buckets(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let buckets = state
        .admin
        .list_bucket_assignments(&admin, &BucketGrantee::Principal(id))?;
    Ok::<_, ApiError>(Json(ApiResponse::success(buckets)))
}

pub async fn assign_principal_bucket(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignBucketRequest>,
) -> impl IntoResponse {
    let assignment = state
        .admin
        .assign_bucket(&admin, &BucketGrantee::Principal(id), &req.bucket)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(assignment))))
}

pub async fn unassign_principal_bucket(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path((id, bucket)): Path<(String, String)>,
) -> impl IntoResponse {
    let removed = state
        .admin
        .unassign_bucket(&admin, &BucketGrantee::Principal(id), &bucket)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(RemovedResponse { removed })))
}
