//! PostgreSQL store
//!
//! Uniqueness is enforced by the schema: a unique index on `LOWER(email)`
//! closes the register race, and `user_id` as primary key of
//! `refresh_tokens` makes concurrent logins converge on one row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use super::timeouts::{with_timeout, DEFAULT_STORAGE_TIMEOUT};
use super::{TokenStore, UserDirectory};
use crate::error::{AuthError, AuthResult};
use crate::models::{NewUser, RefreshTokenRecord, TokenMetadata, User, UserRole};

const USER_COLUMNS: &str = "id, email, fullname, password_hash, role, created_at";

/// User directory and token store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    /// Bound every storage call by `timeout`
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> AuthResult<()> {
        tracing::info!("Running authentication database migrations");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email VARCHAR(255) NOT NULL,
                fullname VARCHAR(100) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(16) NOT NULL CHECK (role IN ('user', 'admin')),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (LOWER(email));",
            r#"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                token TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                user_agent TEXT,
                ip_address TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_token ON refresh_tokens (token);",
        ];

        for statement in statements {
            with_timeout(self.timeout, sqlx::query(statement).execute(&self.pool)).await?;
        }

        tracing::info!("Authentication migrations completed successfully");
        Ok(())
    }
}

/// Data exceptions (class 22) and constraint violations (class 23) are
/// permanent for the given input; only the rest may be retried.
fn write_error(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code().unwrap_or_default();
        if code.starts_with("22") || code.starts_with("23") {
            tracing::error!(code = %code, "Write rejected by database: {}", db_err.message());
            return AuthError::Internal(format!("write rejected ({})", code));
        }
    }

    AuthError::from(err)
}

fn user_write_error(err: sqlx::Error) -> AuthError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            tracing::warn!("Duplicate email rejected by unique index");
            AuthError::DuplicateEmail
        }
        _ => write_error(err),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let role = role.parse::<UserRole>().map_err(|_| sqlx::Error::ColumnDecode {
        index: "role".to_string(),
        source: format!("unknown role {:?}", role).into(),
    })?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        fullname: row.try_get("fullname")?,
        password_hash: row.try_get("password_hash")?,
        role,
        created_at: row.try_get("created_at")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<RefreshTokenRecord, sqlx::Error> {
    Ok(RefreshTokenRecord {
        user_id: row.try_get("user_id")?,
        token: row.try_get("token")?,
        expires_at: row.try_get("expires_at")?,
        metadata: TokenMetadata {
            user_agent: row.try_get("user_agent")?,
            ip_address: row.try_get("ip_address")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE LOWER(email) = $1", USER_COLUMNS);

        with_timeout(self.timeout, async {
            sqlx::query(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| user_from_row(&row))
                .transpose()
        })
        .await
    }

    async fn find_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        with_timeout(self.timeout, async {
            sqlx::query(&query)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| user_from_row(&row))
                .transpose()
        })
        .await
    }

    async fn create(&self, user: NewUser) -> AuthResult<User> {
        let query = format!(
            r#"
            INSERT INTO users (id, email, fullname, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        with_timeout(self.timeout, async {
            let row = sqlx::query(&query)
                .bind(Uuid::new_v4())
                .bind(&user.email)
                .bind(&user.fullname)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(user_write_error)?;

            user_from_row(&row).map_err(AuthError::from)
        })
        .await
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn replace(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
        metadata: TokenMetadata,
    ) -> AuthResult<()> {
        // Single upsert; the primary key on user_id serialises concurrent logins.
        let query = sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token, expires_at, user_agent, ip_address, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                token = EXCLUDED.token,
                expires_at = EXCLUDED.expires_at,
                user_agent = EXCLUDED.user_agent,
                ip_address = EXCLUDED.ip_address,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(&metadata.user_agent)
        .bind(&metadata.ip_address);

        with_timeout(self.timeout, async {
            query.execute(&self.pool).await.map_err(write_error)
        })
        .await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        with_timeout(self.timeout, async {
            sqlx::query(
                r#"
                SELECT user_id, token, expires_at, user_agent, ip_address, created_at
                FROM refresh_tokens
                WHERE token = $1
                "#,
            )
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| token_from_row(&row))
            .transpose()
        })
        .await
    }

    async fn invalidate_by_token(&self, token: &str) -> AuthResult<bool> {
        let result = with_timeout(
            self.timeout,
            sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
                .bind(token)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn invalidate_by_user(&self, user_id: Uuid) -> AuthResult<()> {
        with_timeout(
            self.timeout,
            sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }
}
