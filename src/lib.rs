//! Librarium - multi-tenant library management SaaS, application tier
//!
//! Librarium is the presentation and orchestration tier of a multi-tenant
//! library management platform. Organizations manage book catalogs,
//! memberships, loans, reservations, and subscription billing; all of the
//! transactional business logic lives in the external managed data
//! platform, and this crate provides the typed clients, the tenant
//! context, and the thin HTTP surface on top of it.
//!
//! # Components
//!
//! - **Session**: the authenticated principal and its lifecycle against
//!   the external identity provider
//! - **Platform**: typed client for the data platform's RPC surface, with
//!   an in-memory implementation for tests
//! - **Directory**: organization listing/switching/creation and the
//!   invitation operations, normalized into typed outcomes
//! - **Tenant**: the tenant context - current organization, role, and
//!   derived capability flags - consumed by every page
//! - **Circulation**: borrow/return/reserve forwarding
//! - **Billing**: checkout and portal orchestration against the payment
//!   processor
//! - **HTTP**: the few endpoints this tier exposes itself
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use librarium::ConfigBuilder;
//!
//! #[tokio::main]
//! async fn main() {
//!     librarium::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build();
//!     // wire AppState and serve librarium::http::router(...)
//!     let _ = config;
//! }
//! ```

pub mod billing;
pub mod circulation;
mod config;
pub mod directory;
pub mod email;
mod error;
pub mod http;
pub mod platform;
pub mod session;
pub mod tenant;

// Re-exports for the public API
pub use circulation::CirculationClient;
pub use config::{
    BillingConfig, Config, ConfigBuilder, EmailConfig, LoggingConfig, PlatformConfig, ServerConfig,
};
pub use directory::{DirectoryClient, DirectoryError};
pub use error::{ErrorResponse, LibrariumError, Result};
pub use platform::PlatformClient;
pub use session::{Principal, SessionStore};
pub use tenant::{Capabilities, Role, TenantContext, TenantSnapshot, TenantState};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging with sensible defaults.
///
/// Call early in `main()`, before constructing clients.
///
/// # Environment Variables
///
/// - `RUST_LOG`: log level filter (e.g. "info", "librarium=debug")
/// - `LIBRARIUM_LOG_JSON`: set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("LIBRARIUM_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from a [`Config`].
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
