//! Authentication HTTP Handlers
//!
//! REST API endpoints for authentication operations.

use crate::error::AuthError;
use crate::extractors::{header_token, render_error, AuthUser, ClientInfo};
use crate::middleware;
use crate::models::*;
use crate::service::AuthService;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared auth service state
pub type AuthState = Arc<AuthService>;

/// Success envelope: `{"status": "Success", ...data}`
#[derive(Debug, Serialize)]
struct Success<T: Serialize> {
    status: &'static str,
    #[serde(flatten)]
    data: T,
}

fn success<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        status: "Success",
        data,
    })
}

/// Unwrap a JSON body, reporting an unreadable one as a validation error
fn json_body<T>(auth: &AuthState, payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(req)| req).map_err(|rejection| {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        render_error(
            auth,
            AuthError::validation("body", "Request body must be a JSON object"),
        )
    })
}

// ============================================
// Route Builder
// ============================================

/// Create authentication routes under `/api/v1`
pub fn create_routes(auth_service: AuthState) -> Router {
    // Public routes (no authentication required)
    let public = Router::new()
        .route("/api/v1", get(api_index))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/refresh", post(refresh_token))
        .route("/api/v1/auth/verify-token", get(verify_token).post(verify_token));

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/v1/auth/me", get(get_current_user))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_service.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(not_found)
        .with_state(auth_service)
}

// ============================================
// Index / Fallback
// ============================================

/// GET /api/v1
pub async fn api_index() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Authentication API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "online"
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "status": "Error",
            "error": "not_found",
            "message": "The requested resource does not exist"
        })),
    )
}

// ============================================
// Registration
// ============================================

#[derive(Serialize)]
struct Registered {
    user: UserResponse,
    created: bool,
}

/// POST /auth/register
///
/// Register a new user account
pub async fn register(
    State(auth): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Response> {
    let req = json_body(&auth, payload)?;
    let user = auth.register(req).await.map_err(|e| render_error(&auth, e))?;

    Ok((
        StatusCode::CREATED,
        success(Registered {
            user,
            created: true,
        }),
    ))
}

// ============================================
// Login / Logout
// ============================================

/// POST /auth/login
///
/// Authenticate user and return access/refresh tokens
pub async fn login(
    State(auth): State<AuthState>,
    client: ClientInfo,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Response> {
    let req = json_body(&auth, payload)?;
    let response = auth
        .login(req, TokenMetadata::from(client))
        .await
        .map_err(|e| render_error(&auth, e))?;

    Ok(success(response))
}

/// POST /auth/logout
///
/// Invalidate the refresh token. Unknown tokens still succeed.
pub async fn logout(
    State(auth): State<AuthState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Response> {
    let req = json_body(&auth, payload)?;
    auth.logout(req).await.map_err(|e| render_error(&auth, e))?;

    Ok(success(serde_json::json!({
        "message": "Logged out successfully"
    })))
}

// ============================================
// Token Refresh / Verification
// ============================================

/// POST /auth/refresh
///
/// Issue a new access token from the current refresh token
pub async fn refresh_token(
    State(auth): State<AuthState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Response> {
    let req = json_body(&auth, payload)?;
    let response = auth.refresh(req).await.map_err(|e| render_error(&auth, e))?;

    Ok(success(response))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Verified {
    user: VerifiedUser,
    token_valid: bool,
}

/// GET|POST /auth/verify-token
///
/// The token is read from the body `accessToken`, then the `accessToken`
/// query parameter, then the `x-access-token` header.
pub async fn verify_token(
    State(auth): State<AuthState>,
    headers: HeaderMap,
    query: Option<Query<VerifyTokenRequest>>,
    body: Option<Json<VerifyTokenRequest>>,
) -> Result<impl IntoResponse, Response> {
    let sources = TokenSources::new(
        body.and_then(|Json(b)| b.access_token),
        query.and_then(|Query(q)| q.access_token),
        header_token(&headers),
    );

    let user = auth
        .verify_token(&sources)
        .map_err(|e| render_error(&auth, e))?;

    Ok(success(Verified {
        user,
        token_valid: true,
    }))
}

// ============================================
// Current User
// ============================================

/// GET /auth/me
///
/// Get current authenticated user
pub async fn get_current_user(
    State(auth): State<AuthState>,
    user: AuthUser,
) -> Result<impl IntoResponse, Response> {
    let profile = auth
        .profile(user.id)
        .await
        .map_err(|e| render_error(&auth, e))?;

    Ok(success(serde_json::json!({ "user": profile })))
}
