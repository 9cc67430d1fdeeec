//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the portal.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the portal.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PortalConfig {
    /// Application identity and mount point.
    pub app: AppConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Session cookie and lifetime settings.
    pub session: SessionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits and response headers.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Back-office accounts created at startup.
    pub accounts: Vec<AccountConfig>,
}

/// Application settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display name.
    pub name: String,

    pub version: String,

    /// Public URL, used to build links in logged mails.
    pub base_url: String,

    /// Mount prefix (e.g. "/pasha-benefits"). Stripped before routing and
    /// prepended to redirects.
    pub base_path: String,

    /// Default page size for listings.
    pub items_per_page: usize,

    /// Answer 503 to everyone but admins.
    pub maintenance_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "PASHA Benefits Portal".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            base_url: "http://localhost:8080".to_string(),
            base_path: "/".to_string(),
            items_per_page: 10,
            maintenance_mode: false,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,

    /// Idle lifetime of a session in seconds.
    pub lifetime_secs: u64,

    /// Lifetime when "remember me" was ticked at login.
    pub remember_me_secs: u64,

    /// Mark the cookie `Secure`.
    pub secure: bool,

    /// Mark the cookie `HttpOnly`.
    pub http_only: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "pasha_session".to_string(),
            lifetime_secs: 86_400,
            remember_me_secs: 30 * 24 * 60 * 60,
            secure: false,
            http_only: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Add X-Content-Type-Options, X-Frame-Options and Referrer-Policy.
    pub enable_headers: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    pub min_password_length: usize,

    /// Password reset links expire after this many seconds.
    pub reset_token_ttl_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024,
            min_password_length: 8,
            reset_token_ttl_secs: 3600,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A back-office account seeded at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,

    /// admin, staff or partner.
    pub role: String,

    /// Required for partner accounts.
    #[serde(default)]
    pub partner_id: Option<u64>,
}
