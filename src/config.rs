use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for a Librarium deployment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub platform: PlatformConfig,
    pub billing: BillingConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Connection settings for the managed data platform.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// Base URL of the platform, e.g. `https://project.example.co`.
    #[serde(default)]
    pub base_url: String,
    /// Privileged service key used by server-side RPCs.
    #[serde(default)]
    pub service_key: String,
    /// Public (anon) key used when forwarding a user's own session.
    #[serde(default)]
    pub anon_key: String,
}

/// Settings for the payment-processor integration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_success_url")]
    pub checkout_success_url: String,
    #[serde(default = "default_cancel_url")]
    pub checkout_cancel_url: String,
    #[serde(default = "default_portal_return_url")]
    pub portal_return_url: String,
    /// Domains accepted for checkout redirect URLs. Empty allows any HTTPS URL.
    #[serde(default)]
    pub allowed_redirect_domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Base URL used in invitation acceptance links.
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            checkout_success_url: default_success_url(),
            checkout_cancel_url: default_cancel_url(),
            portal_return_url: default_portal_return_url(),
            allowed_redirect_domains: Vec::new(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_from_address(),
            app_url: default_app_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_success_url() -> String {
    "https://localhost/billing/success".to_string()
}

fn default_cancel_url() -> String {
    "https://localhost/billing/cancel".to_string()
}

fn default_portal_return_url() -> String {
    "https://localhost/settings/billing".to_string()
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for [`Config`] with environment variable support.
///
/// Environment variables use the `LIBRARIUM_` prefix:
/// `LIBRARIUM_HOST`, `LIBRARIUM_PORT`, `LIBRARIUM_LOG_LEVEL`,
/// `LIBRARIUM_PLATFORM_URL`, `LIBRARIUM_PLATFORM_SERVICE_KEY`,
/// `LIBRARIUM_PLATFORM_ANON_KEY`, `LIBRARIUM_STRIPE_SECRET_KEY`,
/// `LIBRARIUM_SMTP_HOST`, `LIBRARIUM_SMTP_PORT`, `LIBRARIUM_SMTP_USERNAME`,
/// `LIBRARIUM_SMTP_PASSWORD`, `LIBRARIUM_EMAIL_FROM`, `LIBRARIUM_APP_URL`.
#[must_use = "builder does nothing until you call build()"]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from `LIBRARIUM_`-prefixed environment variables.
    pub fn from_env(mut self) -> Self {
        if let Some(host) = env_var("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = env_var("PORT").and_then(|p| p.parse().ok()) {
            self.config.server.port = port;
        }
        if let Some(level) = env_var("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = env_var("LOG_JSON").and_then(|v| v.parse().ok()) {
            self.config.logging.json = json;
        }
        if let Some(url) = env_var("PLATFORM_URL") {
            self.config.platform.base_url = url;
        }
        if let Some(key) = env_var("PLATFORM_SERVICE_KEY") {
            self.config.platform.service_key = key;
        }
        if let Some(key) = env_var("PLATFORM_ANON_KEY") {
            self.config.platform.anon_key = key;
        }
        if let Some(key) = env_var("STRIPE_SECRET_KEY") {
            self.config.billing.secret_key = key;
        }
        if let Some(url) = env_var("CHECKOUT_SUCCESS_URL") {
            self.config.billing.checkout_success_url = url;
        }
        if let Some(url) = env_var("CHECKOUT_CANCEL_URL") {
            self.config.billing.checkout_cancel_url = url;
        }
        if let Some(url) = env_var("PORTAL_RETURN_URL") {
            self.config.billing.portal_return_url = url;
        }
        if let Some(host) = env_var("SMTP_HOST") {
            self.config.email.smtp_host = host;
        }
        if let Some(port) = env_var("SMTP_PORT").and_then(|p| p.parse().ok()) {
            self.config.email.smtp_port = port;
        }
        if let Some(user) = env_var("SMTP_USERNAME") {
            self.config.email.smtp_username = user;
        }
        if let Some(pass) = env_var("SMTP_PASSWORD") {
            self.config.email.smtp_password = pass;
        }
        if let Some(from) = env_var("EMAIL_FROM") {
            self.config.email.from_address = from;
        }
        if let Some(url) = env_var("APP_URL") {
            self.config.email.app_url = url;
        }
        self
    }

    /// Override the server bind address.
    pub fn server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.server.host = host.into();
        self.config.server.port = port;
        self
    }

    /// Override the platform connection settings.
    pub fn platform(mut self, platform: PlatformConfig) -> Self {
        self.config.platform = platform;
        self
    }

    /// Override the billing settings.
    pub fn billing(mut self, billing: BillingConfig) -> Self {
        self.config.billing = billing;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("LIBRARIUM_{suffix}")).ok()
}
