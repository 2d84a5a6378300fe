mod audit;
mod groups;
mod principals;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // Group routes
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/groups/{id}",
            get(groups::get_group).delete(groups::delete_group),
        )
        .route("/groups/{id}/permissions", post(groups::set_permission))
        .route(
            "/groups/{id}/permissions/{permission_id}",
            delete(groups::remove_permission),
        )
        .route("/groups/{id}/members", post(groups::add_member))
        .route(
            "/groups/{id}/members/{principal_id}",
            delete(groups::remove_member),
        )
        .route(
            "/groups/{id}/buckets",
            get(groups::list_group_buckets).post(groups::assign_group_bucket),
        )
        .route(
            "/groups/{id}/buckets/{bucket}",
            delete(groups::unassign_group_bucket),
        )
        // Principal routes
        .route(
            "/principals",
            get(principals::list_principals).post(principals::create_principal),
        )
        .route(
            "/principals/{id}",
            get(principals::get_principal)
                .patch(principals::update_principal)
                .delete(principals::delete_principal),
        )
        .route("/principals/{id}/active", put(principals::set_active))
        .route(
            "/principals/{id}/buckets",
            get(principals::list_principal_buckets).post(principals::assign_principal_bucket),
        )
        .route(
            "/principals/{id}/buckets/{bucket}",
            delete(principals::unassign_principal_bucket),
        )
        // Audit trail
        .route("/audit", get(audit::query_audit))
}
