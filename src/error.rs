//! Authentication Error Types
//!
//! Every failure path of the auth core resolves to one of these kinds.
//! Storage and signing failures are mapped here and never escape raw.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::errors::ErrorKind;

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// A required field is missing, empty, or outside its allowed set
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("This email already exists. Try logging in with this email")]
    DuplicateEmail,

    /// Unknown email and wrong password are deliberately indistinguishable
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No access token provided")]
    MissingToken,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Malformed,

    #[error("Token not yet active")]
    NotYetValid,

    /// Authenticated, but the role is not allowed on this route
    #[error("You do not have permission to access this resource")]
    Forbidden,

    /// Transient infrastructure failure, safe for the caller to retry
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation { .. } => "validation_error",
            AuthError::DuplicateEmail => "duplicate_email",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::MissingToken => "missing_token",
            AuthError::Expired => "token_expired",
            AuthError::Malformed => "invalid_token",
            AuthError::NotYetValid => "token_not_yet_valid",
            AuthError::Forbidden => "forbidden",
            AuthError::StorageUnavailable(_) => "storage_unavailable",
            AuthError::Configuration(_) => "configuration_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation { .. } => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::Expired
            | AuthError::Malformed
            | AuthError::NotYetValid => StatusCode::UNAUTHORIZED,
            AuthError::MissingToken | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Configuration(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Outcome of checking a presented token
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken
                | AuthError::Expired
                | AuthError::Malformed
                | AuthError::NotYetValid
        )
    }

    /// Infrastructure failures whose detail must stay server-side
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::StorageUnavailable(_) | AuthError::Configuration(_) | AuthError::Internal(_)
        )
    }

    /// Get a client-safe error message that doesn't leak internal detail
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        }
    }

    /// Render the error envelope, attaching internal detail only when asked to
    pub fn into_response_with(self, expose_details: bool) -> Response {
        let mut body = serde_json::json!({
            "status": "Error",
            "error": self.kind(),
            "message": self.client_message(),
        });

        if self.is_token_error() {
            body["tokenValid"] = serde_json::Value::Bool(false);
        }

        if let AuthError::Validation { field, .. } = &self {
            body["field"] = serde_json::Value::String((*field).to_string());
        }

        if expose_details && self.is_internal() {
            body["details"] = serde_json::Value::String(self.to_string());
        }

        (self.status_code(), Json(body)).into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AuthError::StorageUnavailable(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AuthError::Internal(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("JWT error: {:?}", err);
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::ImmatureSignature => AuthError::NotYetValid,
            _ => AuthError::Malformed,
        }
    }
}
