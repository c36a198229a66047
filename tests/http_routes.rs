//! HTTP surface tests through the router.

mod common;

use std::sync::Arc;

use auth_core::{create_routes, middleware, AuthService, AuthUser, MemoryStore, UserRole};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{service, service_with, test_config};

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

fn ana(role: &str) -> Value {
    json!({
        "fullname": "Ana Li",
        "email": "Ana@X.com",
        "password": "p@ss1234",
        "role": role
    })
}

/// Register Ana with `role` and return the login response body
async fn logged_in(app: &Router, role: &str) -> Value {
    let (status, _) = send(app, post_json("/api/v1/auth/register", ana(role))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/auth/login",
            json!({ "email": "ana@x.com", "password": "p@ss1234" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn app() -> (Router, Arc<MemoryStore>) {
    let (auth, store) = service();
    (create_routes(auth), store)
}

#[tokio::test]
async fn test_api_index_and_fallback() {
    let (app, _) = app();

    let (status, body) = send(&app, get_with("/api/v1", &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");

    let (status, body) = send(&app, get_with("/api/v1/nope", &[])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_register_responses() {
    let (app, _) = app();

    let (status, body) = send(&app, post_json("/api/v1/auth/register", ana("user"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Success");
    assert_eq!(body["created"], true);
    assert_eq!(body["user"]["email"], "ana@x.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password_hash").is_none());

    let mut upper = ana("user");
    upper["email"] = json!("ANA@X.COM");
    let (status, body) = send(&app, post_json("/api/v1/auth/register", upper)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "Error");
    assert_eq!(body["error"], "duplicate_email");

    let (status, body) = send(&app, post_json("/api/v1/auth/register", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "fullname");
    assert_eq!(body["message"], "Full Name is required.");

    let mut bad_role = ana("owner");
    bad_role["email"] = json!("new@x.com");
    let (status, body) = send(&app, post_json("/api/v1/auth/register", bad_role)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "role");

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_login_and_refresh_use_camel_case_tokens() {
    let (app, _) = app();
    let session = logged_in(&app, "user").await;

    assert_eq!(session["status"], "Success");
    assert_eq!(session["user"]["fullname"], "Ana Li");
    assert_eq!(session["tokenType"], "Bearer");
    let refresh_token = session["refreshToken"].as_str().unwrap();
    assert!(session["accessToken"].is_string());

    let (status, body) = send(
        &app,
        post_json("/api/v1/auth/refresh", json!({ "refreshToken": refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["accessToken"].is_string());

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            json!({ "email": "ana@x.com", "password": "nope" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let (app, store) = app();
    let session = logged_in(&app, "user").await;
    let refresh_token = session["refreshToken"].as_str().unwrap();

    for _ in 0..2 {
        let (status, body) = send(
            &app,
            post_json("/api/v1/auth/logout", json!({ "refreshToken": refresh_token })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Logged out successfully");
    }

    let user_id = session["user"]["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(store.refresh_token_count(user_id).await, 0);

    let (status, body) = send(&app, post_json("/api/v1/auth/logout", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Refresh Token is required.");
}

#[tokio::test]
async fn test_verify_token_sources() {
    let (app, _) = app();
    let session = logged_in(&app, "user").await;
    let access_token = session["accessToken"].as_str().unwrap();

    let (status, body) = send(&app, get_with("/api/v1/auth/verify-token", &[])).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "missing_token");
    assert_eq!(body["tokenValid"], false);

    let (status, body) = send(
        &app,
        get_with("/api/v1/auth/verify-token", &[("x-access-token", access_token)]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenValid"], true);
    assert_eq!(body["user"]["name"], "Ana Li");
    assert_eq!(body["user"]["role"], "user");

    let uri = format!("/api/v1/auth/verify-token?accessToken={}", access_token);
    let (status, _) = send(&app, get_with(&uri, &[("x-access-token", "garbage")])).await;
    assert_eq!(status, StatusCode::OK);

    // Body wins over the header
    let mut req = post_json(
        "/api/v1/auth/verify-token",
        json!({ "accessToken": "garbage" }),
    );
    req.headers_mut()
        .insert("x-access-token", access_token.parse().unwrap());
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
    assert_eq!(body["tokenValid"], false);
}

#[tokio::test]
async fn test_me_requires_token() {
    let (app, _) = app();

    let (status, body) = send(&app, get_with("/api/v1/auth/me", &[])).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "missing_token");

    let session = logged_in(&app, "user").await;
    let access_token = session["accessToken"].as_str().unwrap();

    let auth_header = format!("Bearer {}", access_token);
    let (status, body) = send(
        &app,
        get_with("/api/v1/auth/me", &[("authorization", auth_header.as_str())]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ana@x.com");

    let uri = format!("/api/v1/auth/me?token={}", access_token);
    let (status, _) = send(&app, get_with(&uri, &[])).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        get_with("/api/v1/auth/me", &[("authorization", "Bearer garbage")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn admin_app(auth: Arc<AuthService>) -> Router {
    Router::new()
        .route("/admin", get(|user: AuthUser| async move { user.name }))
        .route_layer(from_fn_with_state(
            auth.clone(),
            middleware::require_role(&[UserRole::Admin]),
        ))
        .with_state(auth)
}

#[tokio::test]
async fn test_require_role() {
    let (auth, _) = service();
    let api = create_routes(auth.clone());
    let admin = admin_app(auth);

    let session = logged_in(&api, "user").await;
    let user_header = format!("Bearer {}", session["accessToken"].as_str().unwrap());
    let (status, body) = send(&admin, get_with("/admin", &[("authorization", user_header.as_str())])).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = send(
        &api,
        post_json(
            "/api/v1/auth/register",
            json!({ "fullname": "Root", "email": "root@x.com", "password": "pw", "role": "ADMIN" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, session) = send(
        &api,
        post_json(
            "/api/v1/auth/login",
            json!({ "email": "root@x.com", "password": "pw" }),
        ),
    )
    .await;
    let admin_header = format!("Bearer {}", session["accessToken"].as_str().unwrap());

    let response = admin
        .clone()
        .oneshot(get_with("/admin", &[("authorization", admin_header.as_str())]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Root");
}

#[tokio::test]
async fn test_storage_outage_hides_detail() {
    let (auth, store) = service();
    let app = create_routes(auth);
    store.set_unavailable(true);

    let (status, body) = send(&app, post_json("/api/v1/auth/register", ana("user"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "storage_unavailable");
    assert_eq!(body["message"], "An internal error occurred");
    assert!(body.get("details").is_none());

    let mut config = test_config();
    config.expose_error_details = true;
    let (auth, store) = service_with(config);
    let app = create_routes(auth);
    store.set_unavailable(true);

    let (status, body) = send(&app, post_json("/api/v1/auth/register", ana("user"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["details"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let (auth, _) = service();
    let app = middleware::security_headers(create_routes(auth));

    for uri in ["/api/v1", "/api/v1/nope", "/api/v1/auth/me"] {
        let response = app.clone().oneshot(get_with(uri, &[])).await.unwrap();
        let headers = response.headers();

        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
        assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    }
}
