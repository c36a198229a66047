//! In-process store
//!
//! Implements both storage traits behind a single lock so the same
//! uniqueness rules as the SQL schema hold: one user per email, one
//! refresh token per user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{TokenStore, UserDirectory};
use crate::error::{AuthError, AuthResult};
use crate::models::{NewUser, RefreshTokenRecord, TokenMetadata, User};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    /// normalized email -> user id
    emails: HashMap<String, Uuid>,
    /// user id -> refresh token
    tokens: HashMap<Uuid, RefreshTokenRecord>,
    /// token value -> user id
    token_owners: HashMap<String, Uuid>,
}

/// In-memory user directory and token store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backend were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> AuthResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::StorageUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    /// Number of live refresh tokens held for a user
    pub async fn refresh_token_count(&self, user_id: Uuid) -> usize {
        let state = self.state.read().await;
        state
            .token_owners
            .values()
            .filter(|owner| **owner == user_id)
            .count()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>> {
        self.check_available()?;
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn create(&self, user: NewUser) -> AuthResult<User> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.emails.contains_key(&user.email) {
            return Err(AuthError::DuplicateEmail);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            fullname: user.fullname,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };

        state.emails.insert(user.email.clone(), user.id);
        state.users.insert(user.id, user.clone());

        Ok(user)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn replace(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
        metadata: TokenMetadata,
    ) -> AuthResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if let Some(previous) = state.tokens.remove(&user_id) {
            state.token_owners.remove(&previous.token);
        }

        state.token_owners.insert(token.to_string(), user_id);
        state.tokens.insert(
            user_id,
            RefreshTokenRecord {
                user_id,
                token: token.to_string(),
                expires_at,
                metadata,
                created_at: Utc::now(),
            },
        );

        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .token_owners
            .get(token)
            .and_then(|owner| state.tokens.get(owner))
            .cloned())
    }

    async fn invalidate_by_token(&self, token: &str) -> AuthResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        match state.token_owners.remove(token) {
            Some(owner) => {
                state.tokens.remove(&owner);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn invalidate_by_user(&self, user_id: Uuid) -> AuthResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if let Some(previous) = state.tokens.remove(&user_id) {
            state.token_owners.remove(&previous.token);
        }

        Ok(())
    }
}
