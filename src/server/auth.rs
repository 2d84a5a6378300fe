use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{LoginRequest, LoginResponse, SignupRequest};
use crate::server::response::{ApiError, ApiResponse};

pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/signup", post(signup))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let issued = state.sessions.login(&req.username, &req.password)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(LoginResponse {
        token: issued.token,
        expires_at: issued.session.expires_at,
        principal: issued.principal,
    })))
}

async fn logout(auth: RequireAuth, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.sessions.logout(&auth.session)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> impl IntoResponse {
    let principal = state.admin.signup(&req.username, &req.password)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(principal))))
}
