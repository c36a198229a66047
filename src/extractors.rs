//! Authentication Extractors
//!
//! Axum extractors for authentication and request metadata, plus the helpers
//! that collect a presented access token from its possible locations.

use crate::error::AuthError;
use crate::handlers::AuthState;
use crate::models::{TokenMetadata, TokenSources, UserRole, VerifiedUser};

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap, Uri},
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

/// Header consulted after the body and query string
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

// ============================================
// Token Sources
// ============================================

#[derive(Debug, Default, Deserialize)]
struct GuardQuery {
    token: Option<String>,
}

/// Token carried as `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Token carried in the `x-access-token` header
pub fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

/// Sources consulted by route guards: bearer header, `?token=`, then
/// `x-access-token`.
pub fn guard_token_sources(headers: &HeaderMap, uri: &Uri) -> TokenSources {
    let query = Query::<GuardQuery>::try_from_uri(uri)
        .map(|Query(q)| q.token)
        .unwrap_or_default();

    TokenSources::ordered([bearer_token(headers), query, header_token(headers)])
}

// ============================================
// Authenticated User
// ============================================

/// Authenticated user information extracted from a verified access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    pub name: String,
}

impl From<VerifiedUser> for AuthUser {
    fn from(user: VerifiedUser) -> Self {
        Self {
            id: user.id,
            role: user.role,
            name: user.name,
        }
    }
}

#[async_trait]
impl FromRequestParts<AuthState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState,
    ) -> Result<Self, Self::Rejection> {
        // Already verified by a guard
        if let Some(user) = parts.extensions.get::<VerifiedUser>() {
            return Ok(AuthUser::from(user.clone()));
        }

        let sources = guard_token_sources(&parts.headers, &parts.uri);
        state
            .verify_token(&sources)
            .map(AuthUser::from)
            .map_err(|e| render_error(state, e))
    }
}

/// Render an error with the service's detail policy
pub(crate) fn render_error(auth: &AuthState, err: AuthError) -> Response {
    err.into_response_with(auth.config().expose_error_details)
}

// ============================================
// Client Information
// ============================================

/// Client information (IP, user agent)
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl From<ClientInfo> for TokenMetadata {
    fn from(info: ClientInfo) -> Self {
        TokenMetadata {
            user_agent: info.user_agent,
            ip_address: info.ip,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                parts
                    .headers
                    .get("X-Real-IP")
                    .and_then(|h| h.to_str().ok())
                    .map(|s| s.trim().to_string())
            });

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(String::from);

        Ok(ClientInfo { ip, user_agent })
    }
}
