//! Authentication Core
//!
//! Registration, login, logout and token verification for an HTTP API:
//! - Argon2id password hashing (legacy bcrypt digests still verify)
//! - JWT access and refresh tokens signed with separate keys
//! - One outstanding refresh token per user, replaced on every login
//! - Case-insensitive unique email addresses
//! - Role-based route guards
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_SECRET_KEY` - Secret key for signing access tokens (required)
//! - `JWT_REFRESH_KEY` - Secret key for signing refresh tokens (required, distinct)
//! - `JWT_EXPIRES_IN` - Access token lifetime, e.g. `15m` (default: 15m)
//! - `JWT_REFRESH_EXPIRES_IN` - Refresh token lifetime, e.g. `7d` (default: 7d)
//! - `STORAGE_TIMEOUT_MS` - Bound on every storage call (default: 5000)
//! - `APP_ENV` - `development` exposes internal error detail in responses
//!
//! # Usage
//!
//! ```rust,ignore
//! use auth_core::{create_routes, AuthConfig, AuthService, PgStore};
//!
//! let store = Arc::new(PgStore::new(pool));
//! store.migrate().await?;
//!
//! let auth = AuthService::new(AuthConfig::from_env()?, store.clone(), store)?;
//! let app = create_routes(Arc::new(auth));
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hasher;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod service;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{AuthUser, ClientInfo};
pub use handlers::{create_routes, AuthState};
pub use hasher::CredentialHasher;
pub use models::*;
pub use service::AuthService;
pub use store::{MemoryStore, PgStore, TokenStore, UserDirectory};
pub use token::{TokenIssuer, TokenKind};
