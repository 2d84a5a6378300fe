use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::admin::validation::parse_access;
use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{
    AccessQuery, AccessResponse, BucketAccessQuery, BucketFilterRequest, BucketFilterResponse,
};
use crate::server::response::{ApiError, ApiResponse};

pub async fn check_access(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccessQuery>,
) -> impl IntoResponse {
    let access = parse_access(&query.access)?;
    let allowed = state
        .authz
        .is_allowed(&auth.principal, &query.resource, access)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(AccessResponse {
        resource: query.resource,
        access: access.to_string(),
        allowed,
    })))
}

/// 204 when the principal may use the bucket at the requested level.
pub async fn check_bucket(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(query): Query<BucketAccessQuery>,
) -> impl IntoResponse {
    let access = parse_access(&query.access)?;
    state
        .authz
        .ensure_bucket_allowed(&auth.principal, &bucket, access)?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn filter_buckets(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<BucketFilterRequest>,
) -> impl IntoResponse {
    let buckets = state.authz.filter_buckets(&auth.principal, req.buckets)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(BucketFilterResponse { buckets })))
}
