//! Authentication Models
//!
//! Data structures for authentication requests, responses, stored records
//! and JWT claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidateLength};

use crate::error::AuthError;

// ============================================
// Stored Records
// ============================================

/// Closed set of account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 2] = [UserRole::User, UserRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AuthError::validation("role", "Role must be one of: user, admin"))
    }
}

/// User record as held by the user directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Normalized (trimmed, lowercase)
    pub email: String,
    pub fullname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Fields for a user record that does not exist yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub fullname: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Client details recorded alongside a refresh token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// The single outstanding refresh token of a user
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub metadata: TokenMetadata,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Trim and lowercase an email so it can serve as the uniqueness key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================
// Request DTOs
// ============================================

/// Registration request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Full Name is required."))]
    pub fullname: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required."))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Role is required."))]
    pub role: String,
}

impl RegisterRequest {
    pub const FIELD_ORDER: [&'static str; 4] = ["fullname", "email", "password", "role"];

    /// Column widths of the `users` table, in characters
    pub const MAX_FULLNAME_LEN: u64 = 100;
    pub const MAX_EMAIL_LEN: u64 = 255;

    /// Reject values the user directory cannot store
    pub fn check_lengths(&self) -> Result<(), AuthError> {
        if !self
            .fullname
            .validate_length(None, Some(Self::MAX_FULLNAME_LEN), None)
        {
            return Err(AuthError::validation(
                "fullname",
                "Full Name must be at most 100 characters.",
            ));
        }

        if !self
            .email
            .validate_length(None, Some(Self::MAX_EMAIL_LEN), None)
        {
            return Err(AuthError::validation(
                "email",
                "Email must be at most 255 characters.",
            ));
        }

        Ok(())
    }
}

/// Login request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required."))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

impl LoginRequest {
    pub const FIELD_ORDER: [&'static str; 2] = ["email", "password"];
}

/// Logout and refresh request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Refresh Token is required."))]
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    pub const FIELD_ORDER: [&'static str; 1] = ["refresh_token"];
}

/// Token verification request body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTokenRequest {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Places an access token may arrive from, highest precedence first
#[derive(Debug, Clone, Default)]
pub struct TokenSources(Vec<Option<String>>);

impl TokenSources {
    /// Request body, then query string, then header
    pub fn new(body: Option<String>, query: Option<String>, header: Option<String>) -> Self {
        Self(vec![body, query, header])
    }

    pub fn ordered<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self(sources.into_iter().collect())
    }

    /// First non-empty source wins
    pub fn resolve(&self) -> Option<&str> {
        self.0
            .iter()
            .filter_map(|source| source.as_deref())
            .map(str::trim)
            .find(|token| !token.is_empty())
    }
}

// ============================================
// Response DTOs
// ============================================

/// Public projection of a user; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub role: UserRole,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname,
            email: user.email,
            role: user.role,
        }
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Access token minted from a refresh token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Identity carried by a verified access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedUser {
    pub id: Uuid,
    pub role: UserRole,
    pub name: String,
}

impl From<AccessTokenClaims> for VerifiedUser {
    fn from(claims: AccessTokenClaims) -> Self {
        Self {
            id: claims.id,
            role: claims.role,
            name: claims.name,
        }
    }
}

// ============================================
// JWT Claims
// ============================================

/// JWT claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User ID
    pub id: Uuid,
    pub role: UserRole,
    /// Full name
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// JWT claims for refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// User ID
    pub id: Uuid,
    pub role: UserRole,
    /// Makes tokens minted in the same second distinct
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}
