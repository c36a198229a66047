//! Authentication Middleware
//!
//! Route guards. Verified identities are stored in request extensions for
//! the `AuthUser` extractor.

use crate::error::AuthError;
use crate::extractors::{guard_token_sources, render_error};
use crate::handlers::AuthState;
use crate::models::{UserRole, VerifiedUser};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
    Router,
};
use std::future::Future;
use std::pin::Pin;
use tower_http::set_header::SetResponseHeaderLayer;

/// Verify the request's access token, reusing an earlier guard's result
fn authenticate(auth: &AuthState, req: &Request) -> Result<VerifiedUser, Response> {
    if let Some(user) = req.extensions().get::<VerifiedUser>() {
        return Ok(user.clone());
    }

    let sources = guard_token_sources(req.headers(), req.uri());
    auth.verify_token(&sources).map_err(|e| {
        tracing::debug!(error = e.kind(), path = %req.uri().path(), "Authentication failed");
        render_error(auth, e)
    })
}

/// Require authenticated user
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let user = authenticate(&auth, &req)?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

type GuardFuture = Pin<Box<dyn Future<Output = Result<Response, Response>> + Send>>;

/// Require one of the given roles
///
/// Authenticates first if no earlier guard has. Use with
/// `axum::middleware::from_fn_with_state`.
pub fn require_role(
    roles: &'static [UserRole],
) -> impl Fn(State<AuthState>, Request, Next) -> GuardFuture + Clone + Send + Sync + 'static {
    move |State(auth): State<AuthState>, mut req: Request, next: Next| {
        Box::pin(async move {
            let user = authenticate(&auth, &req)?;

            if !roles.contains(&user.role) {
                tracing::info!(user_id = %user.id, role = %user.role, "Role not permitted");
                return Err(render_error(&auth, AuthError::Forbidden));
            }

            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        })
    }
}

/// Add browser hardening headers to every response that lacks them
pub fn security_headers(router: Router) -> Router {
    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
}
