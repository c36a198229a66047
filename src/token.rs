//! Token Issuer
//!
//! Signs and verifies access and refresh JWTs. The two token kinds use
//! separate HMAC keys so a leaked refresh key cannot mint access tokens.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::models::{AccessTokenClaims, RefreshTokenClaims, UserRole};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Which signing key a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// A freshly signed refresh token and its expiry
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

fn expiry(now: DateTime<Utc>, lifetime: Duration) -> AuthResult<DateTime<Utc>> {
    now.checked_add_signed(lifetime).ok_or_else(|| {
        tracing::error!("Token lifetime {} overflows the expiry timestamp", lifetime);
        AuthError::Internal("token expiry out of range".to_string())
    })
}

/// JWT issuer and verifier
pub struct TokenIssuer {
    access: KeyPair,
    refresh: KeyPair,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            access: KeyPair::from_secret(&config.access_secret),
            refresh: KeyPair::from_secret(&config.refresh_secret),
            access_lifetime: config.access_token_lifetime,
            refresh_lifetime: config.refresh_token_lifetime,
            validation,
        }
    }

    pub fn access_lifetime(&self) -> Duration {
        self.access_lifetime
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign<C: Serialize>(&self, claims: &C, kind: TokenKind) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys(kind).encoding).map_err(|e| {
            tracing::error!("Failed to sign {:?} token: {:?}", kind, e);
            AuthError::Internal("token signing failed".to_string())
        })
    }

    /// Issue a short-lived access token carrying id, role and name
    pub fn issue_access(&self, user_id: Uuid, role: UserRole, name: &str) -> AuthResult<String> {
        self.issue_access_at(user_id, role, name, Utc::now())
    }

    fn issue_access_at(
        &self,
        user_id: Uuid,
        role: UserRole,
        name: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        let claims = AccessTokenClaims {
            id: user_id,
            role,
            name: name.to_string(),
            iat: now.timestamp(),
            exp: expiry(now, self.access_lifetime)?.timestamp(),
        };

        self.sign(&claims, TokenKind::Access)
    }

    /// Issue a long-lived refresh token carrying id and role
    pub fn issue_refresh(&self, user_id: Uuid, role: UserRole) -> AuthResult<IssuedRefreshToken> {
        let now = Utc::now();
        let expires_at = expiry(now, self.refresh_lifetime)?;

        let claims = RefreshTokenClaims {
            id: user_id,
            role,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        Ok(IssuedRefreshToken {
            token: self.sign(&claims, TokenKind::Refresh)?,
            expires_at,
        })
    }

    /// Check signature and time claims against the key of `kind`
    pub fn verify<C: DeserializeOwned>(&self, token: &str, kind: TokenKind) -> AuthResult<C> {
        let token_data = decode::<C>(token, &self.keys(kind).decoding, &self.validation)?;
        Ok(token_data.claims)
    }

    pub fn verify_access(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshTokenClaims> {
        self.verify(token, TokenKind::Refresh)
    }
}
