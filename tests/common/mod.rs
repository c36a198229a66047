#![allow(dead_code)]

use std::sync::Arc;

use auth_core::{AuthConfig, AuthService, MemoryStore};
use chrono::Duration;

pub const ACCESS_SECRET: &str = "access-secret-for-tests";
pub const REFRESH_SECRET: &str = "refresh-secret-for-tests";

/// Config with cheap Argon2 parameters
pub fn test_config() -> AuthConfig {
    AuthConfig {
        access_secret: ACCESS_SECRET.into(),
        refresh_secret: REFRESH_SECRET.into(),
        access_token_lifetime: Duration::minutes(15),
        refresh_token_lifetime: Duration::days(7),
        argon2_memory_cost: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        storage_timeout: std::time::Duration::from_secs(1),
        expose_error_details: false,
    }
}

pub fn service_with(config: AuthConfig) -> (Arc<AuthService>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = AuthService::new(config, store.clone(), store.clone()).unwrap();
    (Arc::new(service), store)
}

pub fn service() -> (Arc<AuthService>, Arc<MemoryStore>) {
    service_with(test_config())
}
