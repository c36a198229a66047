//! Authentication Service
//!
//! Orchestrates the hasher, token issuer and the two stores into the
//! register / login / logout / refresh / verify operations. Holds no mutable
//! state of its own; all shared state lives behind the injected stores.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::hasher::CredentialHasher;
use crate::logging::log_security_event;
use crate::models::*;
use crate::store::{TokenStore, UserDirectory};
use crate::token::TokenIssuer;

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    tokens: Arc<dyn TokenStore>,
    hasher: CredentialHasher,
    issuer: TokenIssuer,
    config: AuthConfig,
    // Verified against on unknown emails so both login failures cost one hash
    dummy_digest: String,
}

impl AuthService {
    /// Create a new authentication service over the given stores
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserDirectory>,
        tokens: Arc<dyn TokenStore>,
    ) -> AuthResult<Self> {
        config.validate()?;

        let hasher = CredentialHasher::from_config(&config)?;
        let dummy_digest = hasher.hash(&Uuid::new_v4().to_string())?;

        Ok(Self {
            users,
            tokens,
            hasher,
            issuer: TokenIssuer::new(&config),
            config,
            dummy_digest,
        })
    }

    /// Get reference to config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ============================================
    // Password Hashing
    // ============================================

    async fn hash_password(&self, password: &str) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, digest: &str) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let digest = digest.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {}", e)))
    }

    // ============================================
    // User Registration
    // ============================================

    /// Register a new user
    pub async fn register(&self, req: RegisterRequest) -> AuthResult<UserResponse> {
        let req = RegisterRequest {
            fullname: req.fullname.trim().to_string(),
            email: req.email.trim().to_string(),
            password: req.password,
            role: req.role.trim().to_string(),
        };
        require_fields(&req, &RegisterRequest::FIELD_ORDER)?;
        req.check_lengths()?;

        let email = normalize_email(&req.email);

        if self.users.find_by_email(&email).await?.is_some() {
            tracing::info!(email = %email, "Registration rejected, email already exists");
            return Err(AuthError::DuplicateEmail);
        }

        let role: UserRole = req.role.parse()?;
        let password_hash = self.hash_password(&req.password).await?;

        // A concurrent registration can still win here; the store's unique
        // index turns that into DuplicateEmail.
        let user = self
            .users
            .create(NewUser {
                fullname: req.fullname,
                email,
                password_hash,
                role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        Ok(UserResponse::from(user))
    }

    // ============================================
    // Login / Logout
    // ============================================

    /// Authenticate a user and issue access and refresh tokens
    pub async fn login(
        &self,
        req: LoginRequest,
        metadata: TokenMetadata,
    ) -> AuthResult<AuthResponse> {
        let req = LoginRequest {
            email: req.email.trim().to_string(),
            password: req.password,
        };
        require_fields(&req, &LoginRequest::FIELD_ORDER)?;

        let email = normalize_email(&req.email);
        let ip = metadata.ip_address.as_deref();

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                self.verify_password(&req.password, &self.dummy_digest).await?;
                log_security_event("failed_login", None, ip, "Unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.verify_password(&req.password, &user.password_hash).await? {
            log_security_event("failed_login", Some(user.id), ip, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.issuer.issue_access(user.id, user.role, &user.fullname)?;
        let refresh = self.issuer.issue_refresh(user.id, user.role)?;

        // Tokens are only handed out once the refresh token is persisted.
        self.tokens
            .replace(user.id, &refresh.token, refresh.expires_at, metadata)
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.issuer.access_lifetime().num_seconds(),
        })
    }

    /// Invalidate a refresh token. Succeeds whether or not it was live.
    pub async fn logout(&self, req: RefreshTokenRequest) -> AuthResult<()> {
        let req = RefreshTokenRequest {
            refresh_token: req.refresh_token.trim().to_string(),
        };
        require_fields(&req, &RefreshTokenRequest::FIELD_ORDER)?;
        let token = req.refresh_token.as_str();

        let found = self.tokens.invalidate_by_token(token).await?;
        tracing::info!(found, "Logout processed");

        Ok(())
    }

    // ============================================
    // Token Refresh / Verification
    // ============================================

    /// Mint a new access token from the user's current refresh token
    pub async fn refresh(&self, req: RefreshTokenRequest) -> AuthResult<TokenResponse> {
        let req = RefreshTokenRequest {
            refresh_token: req.refresh_token.trim().to_string(),
        };
        require_fields(&req, &RefreshTokenRequest::FIELD_ORDER)?;
        let token = req.refresh_token.as_str();

        let claims = self.issuer.verify_refresh(token)?;

        // A signed but superseded or logged-out token is no longer a session.
        let record = self
            .tokens
            .find_by_token(token)
            .await?
            .filter(|record| record.user_id == claims.id)
            .ok_or(AuthError::Malformed)?;

        if record.is_expired() {
            return Err(AuthError::Expired);
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or(AuthError::Malformed)?;

        let access_token = self.issuer.issue_access(user.id, user.role, &user.fullname)?;
        tracing::debug!(user_id = %user.id, "Access token refreshed");

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.issuer.access_lifetime().num_seconds(),
        })
    }

    /// Load the public profile behind a verified identity
    pub async fn profile(&self, user_id: Uuid) -> AuthResult<UserResponse> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or(AuthError::Malformed)
    }

    /// Verify an access token taken from the first non-empty source
    pub fn verify_token(&self, sources: &TokenSources) -> AuthResult<VerifiedUser> {
        let token = sources.resolve().ok_or(AuthError::MissingToken)?;

        let claims = self.issuer.verify_access(token).map_err(|e| {
            tracing::debug!("Access token rejected: {}", e.kind());
            e
        })?;

        Ok(VerifiedUser::from(claims))
    }
}

/// Run the request's validators and report the first failing field in
/// `order`.
fn require_fields<T: Validate>(req: &T, order: &[&'static str]) -> AuthResult<()> {
    let errors = match req.validate() {
        Ok(()) => return Ok(()),
        Err(errors) => errors,
    };

    let field_errors = errors.field_errors();
    for field in order {
        if let Some(failures) = field_errors.get(*field) {
            let message = failures
                .first()
                .and_then(|failure| failure.message.as_ref())
                .map(|message| message.to_string())
                .unwrap_or_else(|| format!("{} is required.", field));
            return Err(AuthError::validation(*field, message));
        }
    }

    Err(AuthError::validation("request", errors.to_string()))
}
