use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::auth::auth_router;
use super::user::user_router;
use crate::admin::AdminService;
use crate::audit::AuditRecorder;
use crate::auth::{CredentialHasher, SessionManager};
use crate::authz::Authorizer;
use crate::config::ServerConfig;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: ServerConfig,
    pub authz: Authorizer,
    pub audit: AuditRecorder,
    pub admin: AdminService,
    pub sessions: SessionManager,
}

impl AppState {
    /// Wires every service to one shared store and hasher.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        config: ServerConfig,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        let audit = AuditRecorder::new(store.clone());
        let admin = AdminService::new(store.clone(), audit.clone(), hasher.clone())
            .with_retention(config.audit_retention)
            .with_signup(config.allow_signup);
        let sessions = SessionManager::new(
            store.clone(),
            hasher,
            audit.clone(),
            config.session_ttl_seconds,
        );

        Self {
            authz: Authorizer::new(store.clone()),
            store,
            config,
            audit,
            admin,
            sessions,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_router())
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", user_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
