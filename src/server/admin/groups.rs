use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{
    AddMemberRequest, AssignBucketRequest, CreateGroupRequest, RemovedResponse,
    SetPermissionRequest,
};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::BucketGrantee;

pub async fn create_group(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGroupRequest>,
) -> impl IntoResponse {
    let group = state.admin.create_group(&admin, &req.name)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

pub async fn list_groups(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let groups = state.admin.list_groups(&admin)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(groups)))
}

pub async fn get_group(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let detail = state.admin.group_detail(&admin, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(detail)))
}

pub async fn delete_group(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let removal = state.admin.delete_group(&admin, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(removal)))
}

pub async fn set_permission(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetPermissionRequest>,
) -> impl IntoResponse {
    let permission = state
        .admin
        .set_permission(&admin, &id, &req.resource, &req.access)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(permission)))
}

pub async fn remove_permission(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path((id, permission_id)): Path<(String, i64)>,
) -> impl IntoResponse {
    let removed = state.admin.remove_permission(&admin, &id, permission_id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(RemovedResponse { removed })))
}

pub async fn add_member(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> impl IntoResponse {
    let membership = state.admin.add_member(&admin, &id, &req.principal_id)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(membership))))
}

pub async fn remove_member(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path((id, principal_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let removed = state.admin.remove_member(&admin, &id, &principal_id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(RemovedResponse { removed })))
}

pub async fn list_group_buckets(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let buckets = state
        .admin
        .list_bucket_assignments(&admin, &BucketGrantee::Group(id))?;
    Ok::<_, ApiError>(Json(ApiResponse::success(buckets)))
}

pub async fn assign_group_bucket(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignBucketRequest>,
) -> impl IntoResponse {
    let assignment = state
        .admin
        .assign_bucket(&admin, &BucketGrantee::Group(id), &req.bucket)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(assignment))))
}

pub async fn unassign_group_bucket(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path((id, bucket)): Path<(String, String)>,
) -> impl IntoResponse {
    let removed = state
        .admin
        .unassign_bucket(&admin, &BucketGrantee::Group(id), &bucket)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(RemovedResponse { removed })))
}
