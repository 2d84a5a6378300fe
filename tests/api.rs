mod common;

use axum::http::{Method, StatusCode, header};
use serde_json::json;

use bucketward::config::ServerConfig;
use bucketward::store::Store;
use common::{ROOT_PASSWORD, ROOT_USERNAME, TestApp};

#[tokio::test]
async fn test_health() {
    let app = TestApp::start().await;
    let resp = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "OK");
}

#[tokio::test]
async fn test_login_failures_are_unauthorized() {
    let app = TestApp::start().await;

    let resp = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": ROOT_USERNAME, "password": "nope" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["error"], "Invalid credentials");

    let resp = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "ghost", "password": ROOT_PASSWORD })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_protected_routes_require_bearer_session() {
    let app = TestApp::start().await;

    let resp = app.request(Method::GET, "/api/v1/me", None, None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(resp.headers.contains_key(header::WWW_AUTHENTICATE));

    let resp = app
        .request(
            Method::GET,
            "/api/v1/me",
            Some("bw_00000000_000000000000000000000000"),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["error"], "Invalid token");
}

#[tokio::test]
async fn test_admin_routes_forbidden_for_regular_users() {
    let app = TestApp::start().await;
    let (_id, token) = app.create_user("alice").await;

    let resp = app
        .request(Method::GET, "/api/v1/admin/groups", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .request(
            Method::POST,
            "/api/v1/admin/groups",
            Some(&token),
            Some(json!({ "name": "mine" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .request(Method::GET, "/api/v1/admin/audit", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_editors_grant_follows_membership() {
    let app = TestApp::start().await;
    let (user_id, token) = app.create_user("u").await;
    let editors = app.create_group("editors").await;

    let resp = app
        .admin(
            Method::POST,
            &format!("/api/v1/admin/groups/{editors}/permissions"),
            Some(json!({ "resource": "file", "access": "write" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .admin(
            Method::POST,
            &format!("/api/v1/admin/groups/{editors}/members"),
            Some(json!({ "principal_id": user_id })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let check = "/api/v1/access?resource=file&access=write";
    let resp = app.request(Method::GET, check, Some(&token), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["allowed"], true);

    let resp = app
        .admin(
            Method::DELETE,
            &format!("/api/v1/admin/groups/{editors}/members/{user_id}"),
            None,
        )
        .await;
    assert_eq!(resp.body["data"]["removed"], true);

    let resp = app.request(Method::GET, check, Some(&token), None).await;
    assert_eq!(resp.body["data"]["allowed"], false);
}

#[tokio::test]
async fn test_unconfigured_principal_reads_but_cannot_write() {
    let app = TestApp::start().await;
    let (_id, token) = app.create_user("alice").await;

    let resp = app
        .request(
            Method::GET,
            "/api/v1/access?resource=reports&access=read",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(resp.body["data"]["allowed"], true);

    let resp = app
        .request(
            Method::GET,
            "/api/v1/access?resource=reports&access=write",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(resp.body["data"]["allowed"], false);

    let resp = app
        .request(
            Method::GET,
            "/api/v1/access?resource=reports&access=all",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bucket_visibility_turns_strict_after_first_assignment() {
    let app = TestApp::start().await;
    let (alice_id, alice) = app.create_user("alice").await;
    let (_bob_id, bob) = app.create_user("bob").await;

    let resp = app.request(Method::GET, "/api/v1/me", Some(&bob), None).await;
    assert_eq!(resp.body["data"]["buckets"]["mode"], "all");

    let resp = app
        .admin(
            Method::POST,
            &format!("/api/v1/admin/principals/{alice_id}/buckets"),
            Some(json!({ "bucket": "reports" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .request(Method::GET, "/api/v1/buckets/reports", Some(&alice), None)
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .request(Method::GET, "/api/v1/buckets/reports", Some(&bob), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .request(
            Method::POST,
            "/api/v1/buckets/filter",
            Some(&alice),
            Some(json!({ "buckets": ["logs", "reports", "scratch"] })),
        )
        .await;
    assert_eq!(resp.body["data"]["buckets"], json!(["reports"]));

    let resp = app
        .request(
            Method::POST,
            "/api/v1/buckets/filter",
            Some(&bob),
            Some(json!({ "buckets": ["logs", "reports"] })),
        )
        .await;
    assert_eq!(resp.body["data"]["buckets"], json!([]));

    let resp = app
        .request(Method::GET, "/api/v1/buckets/anything", Some(&app.admin_token), None)
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .admin(
            Method::POST,
            &format!("/api/v1/admin/principals/{alice_id}/buckets"),
            Some(json!({ "bucket": "reports" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_group_lifecycle_and_detail() {
    let app = TestApp::start().await;
    let (user_id, _token) = app.create_user("alice").await;
    let group = app.create_group("analysts").await;

    let resp = app
        .admin(
            Method::POST,
            "/api/v1/admin/groups",
            Some(json!({ "name": "analysts" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    app.admin(
        Method::POST,
        &format!("/api/v1/admin/groups/{group}/permissions"),
        Some(json!({ "resource": "bucket:reports", "access": "read" })),
    )
    .await;
    let resp = app
        .admin(
            Method::POST,
            &format!("/api/v1/admin/groups/{group}/permissions"),
            Some(json!({ "resource": "bucket:reports", "access": "read-write" })),
        )
        .await;
    let permission_id = resp.body["data"]["id"].as_i64().expect("permission id");

    app.admin(
        Method::POST,
        &format!("/api/v1/admin/groups/{group}/members"),
        Some(json!({ "principal_id": user_id })),
    )
    .await;
    app.admin(
        Method::POST,
        &format!("/api/v1/admin/groups/{group}/buckets"),
        Some(json!({ "bucket": "reports" })),
    )
    .await;

    let resp = app
        .admin(Method::GET, &format!("/api/v1/admin/groups/{group}"), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["name"], "analysts");
    assert_eq!(resp.body["data"]["members"].as_array().unwrap().len(), 1);
    assert_eq!(resp.body["data"]["permissions"][0]["access"], "read-write");
    assert_eq!(resp.body["data"]["permissions"].as_array().unwrap().len(), 1);
    assert_eq!(resp.body["data"]["buckets"], json!(["reports"]));

    let resp = app
        .admin(
            Method::DELETE,
            &format!("/api/v1/admin/groups/{group}/permissions/{permission_id}"),
            None,
        )
        .await;
    assert_eq!(resp.body["data"]["removed"], true);

    let resp = app
        .admin(Method::DELETE, &format!("/api/v1/admin/groups/{group}"), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["members"], 1);
    assert_eq!(resp.body["data"]["buckets"], 1);

    let resp = app
        .admin(Method::DELETE, &format!("/api/v1/admin/groups/{group}"), None)
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_principal_administration() {
    let app = TestApp::start().await;
    let (alice_id, alice_token) = app.create_user("alice").await;
    let root_id = app
        .state
        .store
        .get_principal_by_username(ROOT_USERNAME)
        .unwrap()
        .unwrap()
        .id;

    let resp = app
        .admin(
            Method::POST,
            "/api/v1/admin/principals",
            Some(json!({ "username": "alice", "password": "whatever" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .admin(Method::DELETE, &format!("/api/v1/admin/principals/{root_id}"), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .admin(
            Method::PUT,
            &format!("/api/v1/admin/principals/{alice_id}/active"),
            Some(json!({ "active": "no" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .admin(
            Method::PUT,
            &format!("/api/v1/admin/principals/{alice_id}/active"),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["active"], false);

    let resp = app
        .request(Method::GET, "/api/v1/me", Some(&alice_token), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .admin(
            Method::PATCH,
            &format!("/api/v1/admin/principals/{alice_id}"),
            Some(json!({ "role": "admin", "active": true })),
        )
        .await;
    assert_eq!(resp.body["data"]["role"], "admin");
    assert_eq!(resp.body["data"]["active"], true);

    let resp = app.admin(Method::GET, "/api/v1/admin/principals", None).await;
    assert_eq!(resp.body["data"].as_array().unwrap().len(), 2);
    assert_eq!(resp.body["has_more"], false);
    assert!(resp.body["data"][0].get("credential_hash").is_none());

    let resp = app
        .admin(Method::DELETE, &format!("/api/v1/admin/principals/{alice_id}"), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["sessions"], 0);

    let resp = app
        .admin(Method::GET, &format!("/api/v1/admin/principals/{alice_id}"), None)
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_self_service_profile_and_password() {
    let app = TestApp::start().await;
    let (_id, token) = app.create_user("alice").await;
    let other_session = app.login("alice", "alice-password").await;

    let resp = app
        .request(
            Method::PATCH,
            "/api/v1/me",
            Some(&token),
            Some(json!({ "username": "alice2" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["username"], "alice2");

    let resp = app
        .request(
            Method::POST,
            "/api/v1/me/password",
            Some(&token),
            Some(json!({ "current_password": "wrong", "new_password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .request(
            Method::POST,
            "/api/v1/me/password",
            Some(&token),
            Some(json!({ "current_password": "alice-password", "new_password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .request(Method::GET, "/api/v1/me", Some(&other_session), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.request(Method::GET, "/api/v1/me", Some(&token), None).await;
    assert_eq!(resp.status, StatusCode::OK);

    app.login("alice2", "brand-new-pass").await;

    let resp = app
        .request(Method::POST, "/auth/logout", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    let resp = app.request(Method::GET, "/api/v1/me", Some(&token), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_follows_config() {
    let app = TestApp::start().await;
    let body = json!({ "username": "carol", "password": "carol-password" });

    let resp = app
        .request(Method::POST, "/auth/signup", None, Some(body.clone()))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let open = TestApp::with_config(ServerConfig {
        allow_signup: true,
        ..ServerConfig::default()
    })
    .await;
    let resp = open
        .request(Method::POST, "/auth/signup", None, Some(body))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["data"]["role"], "user");

    open.login("carol", "carol-password").await;
}

#[tokio::test]
async fn test_audit_query_filters_and_counts() {
    let app = TestApp::start().await;
    app.create_user("alice").await;
    for _ in 0..3 {
        app.login("alice", "alice-password").await;
    }
    app.create_group("editors").await;

    let resp = app
        .admin(Method::GET, "/api/v1/admin/audit?action=login&limit=2", None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = &resp.body["data"];
    // root login + alice's login from create_user + 3 more
    assert_eq!(data["total"], 5);
    assert_eq!(data["limit"], 2);
    assert_eq!(data["events"].as_array().unwrap().len(), 2);
    assert_eq!(data["events"][0]["username"], "alice");
    assert_eq!(data["events"][0]["resource"], "auth");

    let resp = app.admin(Method::GET, "/api/v1/admin/audit", None).await;
    let events = resp.body["data"]["events"].as_array().unwrap().clone();
    assert_eq!(events[0]["action"], "group.create");
    let bootstrap = events.last().unwrap();
    assert_eq!(bootstrap["action"], "bootstrap");
    assert!(bootstrap.get("principal_id").is_none());
}
