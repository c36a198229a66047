//! Storage abstractions for user records and refresh tokens.
//!
//! The auth service only talks to these traits; connection lifecycle belongs
//! to whoever constructs the concrete store.

pub mod memory;
pub mod postgres;
pub mod timeouts;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AuthResult;
use crate::models::{NewUser, RefreshTokenRecord, TokenMetadata, User};

/// Lookup and creation of user records keyed by normalized email
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Exact match on an already-normalized email
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    async fn find_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>>;

    /// Insert a user. Fails with `DuplicateEmail` when the storage-level
    /// unique constraint on email is violated.
    async fn create(&self, user: NewUser) -> AuthResult<User>;
}

/// Persistence of at most one live refresh token per user
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Supersede any existing record for `user_id` with this one
    async fn replace(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
        metadata: TokenMetadata,
    ) -> AuthResult<()>;

    async fn find_by_token(&self, token: &str) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Returns whether a record existed
    async fn invalidate_by_token(&self, token: &str) -> AuthResult<bool>;

    async fn invalidate_by_user(&self, user_id: Uuid) -> AuthResult<()>;
}
