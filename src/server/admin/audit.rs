use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};
use crate::types::AuditQuery;

pub async fn query_audit(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    let page = state.audit.query(&query)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}
