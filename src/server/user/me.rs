use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{ChangePasswordRequest, MeResponse, UpdateMeRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::PrincipalPatch;

pub async fn get_me(auth: RequireAuth, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let principal = auth.principal;
    let groups = state.store.list_principal_groups(&principal.id)?;
    let permissions = state.store.list_principal_permissions(&principal.id)?;
    let buckets = state.authz.visible_buckets(&principal)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(MeResponse {
        principal,
        groups,
        permissions,
        buckets,
    })))
}

pub async fn update_me(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateMeRequest>,
) -> impl IntoResponse {
    let patch = PrincipalPatch {
        username: Some(req.username),
        ..PrincipalPatch::default()
    };
    let principal = state
        .admin
        .update_principal(&auth.principal, &auth.principal.id, &patch)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(principal)))
}

pub async fn change_password(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    state.admin.change_password(
        &auth.principal,
        &auth.session.id,
        &req.current_password,
        &req.new_password,
    )?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
