use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use bucketward::auth::Argon2Hasher;
use bucketward::config::ServerConfig;
use bucketward::server::{AppState, create_router};
use bucketward::store::{SqliteStore, Store};

pub const ROOT_USERNAME: &str = "root";
pub const ROOT_PASSWORD: &str = "root-password";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub admin_token: String,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::with_config(ServerConfig::default()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let store = SqliteStore::in_memory().expect("open store");
        store.initialize().expect("initialize schema");

        let state = Arc::new(AppState::new(
            Arc::new(store),
            config,
            Arc::new(Argon2Hasher::low_cost()),
        ));
        state
            .admin
            .bootstrap_admin(ROOT_USERNAME, ROOT_PASSWORD)
            .expect("bootstrap admin");

        let router = create_router(state.clone());
        let mut app = Self {
            router,
            state,
            admin_token: String::new(),
        };
        app.admin_token = app.login(ROOT_USERNAME, ROOT_PASSWORD).await;
        app
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).expect("encode body")))
                .expect("build request"),
            None => builder.body(Body::empty()).expect("build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        self.request(method, uri, Some(&self.admin_token), body).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let resp = self
            .request(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "login failed: {}", resp.body);
        resp.body["data"]["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    /// Creates a regular principal through the admin API and returns
    /// (principal_id, session_token).
    pub async fn create_user(&self, username: &str) -> (String, String) {
        let password = format!("{username}-password");
        let resp = self
            .admin(
                Method::POST,
                "/api/v1/admin/principals",
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create user: {}", resp.body);
        let id = resp.body["data"]["id"]
            .as_str()
            .expect("principal id")
            .to_string();
        let token = self.login(username, &password).await;
        (id, token)
    }

    pub async fn create_group(&self, name: &str) -> String {
        let resp = self
            .admin(
                Method::POST,
                "/api/v1/admin/groups",
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create group: {}", resp.body);
        resp.body["data"]["id"]
            .as_str()
            .expect("group id")
            .to_string()
    }
}
