//! Logging setup and structured security events.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Default directives when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,tower_http=info";

/// Initialize logging, honouring `RUST_LOG`
///
/// ```no_run
/// auth_core::logging::init();
/// tracing::info!("Server starting");
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Logging initialized");
}

/// Log an authentication security event. Never pass secrets or passwords.
pub fn log_security_event(
    event_type: &str,
    user_id: Option<Uuid>,
    ip_address: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id.map(|id| id.to_string()),
        ip_address = ip_address,
        "SECURITY: {}",
        message
    );
}
