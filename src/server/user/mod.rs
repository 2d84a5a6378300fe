mod access;
mod me;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Self-service
        .route("/me", get(me::get_me).patch(me::update_me))
        .route("/me/password", post(me::change_password))
        // Authorization checks
        .route("/access", get(access::check_access))
        .route("/buckets/{bucket}", get(access::check_bucket))
        .route("/buckets/filter", post(access::filter_buckets))
}
