//! Authentication Configuration
//!
//! All configuration values are loaded from environment variables.
//! A missing signing key is a startup failure, never a per-request one.

use crate::error::AuthError;
use chrono::{Duration, Utc};
use std::env;
use std::fmt;

const DEFAULT_ACCESS_LIFETIME: &str = "15m";
const DEFAULT_REFRESH_LIFETIME: &str = "7d";

/// Authentication configuration loaded from environment
#[derive(Clone)]
pub struct AuthConfig {
    /// Access token signing key (from JWT_SECRET_KEY env var)
    pub access_secret: String,

    /// Refresh token signing key (from JWT_REFRESH_KEY env var)
    pub refresh_secret: String,

    /// Access token lifetime (from JWT_EXPIRES_IN env var)
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime (from JWT_REFRESH_EXPIRES_IN env var)
    pub refresh_token_lifetime: Duration,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Upper bound for a single storage call (from STORAGE_TIMEOUT_MS env var)
    pub storage_timeout: std::time::Duration,

    /// Attach internal error detail to responses (APP_ENV=development)
    pub expose_error_details: bool,
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_secret = required(&lookup, "JWT_SECRET_KEY")?;
        let refresh_secret = required(&lookup, "JWT_REFRESH_KEY")?;

        let access_token_lifetime = lifetime(&lookup, "JWT_EXPIRES_IN", DEFAULT_ACCESS_LIFETIME)?;
        let refresh_token_lifetime =
            lifetime(&lookup, "JWT_REFRESH_EXPIRES_IN", DEFAULT_REFRESH_LIFETIME)?;

        let storage_timeout_ms: u64 = number(&lookup, "STORAGE_TIMEOUT_MS", 5000)?;

        let config = Self {
            access_secret,
            refresh_secret,
            access_token_lifetime,
            refresh_token_lifetime,
            argon2_memory_cost: number(&lookup, "ARGON2_MEMORY_COST", 65536)?, // 64 MiB
            argon2_time_cost: number(&lookup, "ARGON2_TIME_COST", 3)?,
            argon2_parallelism: number(&lookup, "ARGON2_PARALLELISM", 4)?,
            storage_timeout: std::time::Duration::from_millis(storage_timeout_ms),
            expose_error_details: lookup("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("development"))
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(AuthError::Configuration(
                "JWT_SECRET_KEY and JWT_REFRESH_KEY must not be empty".to_string(),
            ));
        }

        if self.access_secret == self.refresh_secret {
            return Err(AuthError::Configuration(
                "JWT_SECRET_KEY and JWT_REFRESH_KEY must differ".to_string(),
            ));
        }

        if self.access_token_lifetime <= Duration::zero() {
            return Err(AuthError::Configuration(
                "JWT_EXPIRES_IN must be positive".to_string(),
            ));
        }

        if self.refresh_token_lifetime <= self.access_token_lifetime {
            return Err(AuthError::Configuration(
                "JWT_REFRESH_EXPIRES_IN must be greater than JWT_EXPIRES_IN".to_string(),
            ));
        }

        // Expiry instants must stay representable for every token issued
        if Utc::now()
            .checked_add_signed(self.refresh_token_lifetime)
            .is_none()
        {
            return Err(AuthError::Configuration(
                "JWT_REFRESH_EXPIRES_IN is too large".to_string(),
            ));
        }

        if self.storage_timeout.is_zero() {
            return Err(AuthError::Configuration(
                "STORAGE_TIMEOUT_MS must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("argon2_memory_cost", &self.argon2_memory_cost)
            .field("argon2_time_cost", &self.argon2_time_cost)
            .field("argon2_parallelism", &self.argon2_parallelism)
            .field("storage_timeout", &self.storage_timeout)
            .field("expose_error_details", &self.expose_error_details)
            .finish()
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthError::Configuration(format!("{} environment variable must be set", key)))
}

fn number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AuthError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AuthError::Configuration(format!("{} must be a number, got {:?}", key, raw))),
        None => Ok(default),
    }
}

fn lifetime<F>(lookup: &F, key: &str, default: &str) -> Result<Duration, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    parse_lifetime(&raw)
        .ok_or_else(|| AuthError::Configuration(format!("{} is not a valid lifetime: {:?}", key, raw)))
}

/// Parse a lifetime such as `900`, `30s`, `15m`, `12h` or `7d`.
/// A bare number is seconds.
pub fn parse_lifetime(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: i64 = digits.parse().ok()?;

    let duration = match unit {
        "" | "s" => Duration::try_seconds(amount)?,
        "m" => Duration::try_minutes(amount)?,
        "h" => Duration::try_hours(amount)?,
        "d" => Duration::try_days(amount)?,
        _ => return None,
    };

    Some(duration)
}
