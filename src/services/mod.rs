//! Shared application services.
//!
//! # Data Flow
//! ```text
//! PortalConfig
//!     → PortalServices::from_config (store, hasher, exporter, settings)
//!     → Arc<PortalServices> in every RequestContext
//!     → controllers (fresh per request) borrow it
//! ```
//!
//! # Design Decisions
//! - One services handle per process, shared read-mostly
//! - Hashing and exporting sit behind traits so they can be swapped
//! - Runtime settings saved from the admin screen override config defaults

pub mod accounts;
pub mod export;
pub mod password;
pub mod verification;

use std::sync::Arc;

use crate::config::PortalConfig;
use crate::store::MemoryStore;

pub use export::{CsvExporter, Export, ExportError, ReportExporter};
pub use password::{Argon2Hasher, PasswordHasher};
pub use verification::VerificationResult;

/// Values the controllers need from configuration.
#[derive(Debug, Clone)]
pub struct PortalSettings {
    pub app_name: String,
    pub base_url: String,
    pub base_path: String,
    pub items_per_page: usize,
    pub maintenance_mode: bool,
    pub min_password_length: usize,
    pub reset_token_ttl_secs: u64,
}

impl From<&PortalConfig> for PortalSettings {
    fn from(config: &PortalConfig) -> Self {
        Self {
            app_name: config.app.name.clone(),
            base_url: config.app.base_url.clone(),
            base_path: config.app.base_path.clone(),
            items_per_page: config.app.items_per_page,
            maintenance_mode: config.app.maintenance_mode,
            min_password_length: config.security.min_password_length,
            reset_token_ttl_secs: config.security.reset_token_ttl_secs,
        }
    }
}

pub struct PortalServices {
    pub store: MemoryStore,
    pub hasher: Arc<dyn PasswordHasher>,
    pub exporter: Arc<dyn ReportExporter>,
    pub settings: PortalSettings,
}

impl PortalServices {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            store: MemoryStore::new(),
            hasher: Arc::new(Argon2Hasher),
            exporter: Arc::new(CsvExporter),
            settings: PortalSettings::from(config),
        }
    }

    /// Stored setting, falling back to `default`.
    pub fn setting(&self, key: &str, default: &str) -> String {
        self.store.get_setting(key, default)
    }

    /// Page size: the saved `items_per_page` setting, else the configured one.
    pub fn items_per_page(&self) -> usize {
        self.setting("items_per_page", "")
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(self.settings.items_per_page)
    }

    /// Maintenance is on when configured or switched on from the settings screen.
    pub fn maintenance_mode(&self) -> bool {
        self.settings.maintenance_mode || self.setting("maintenance_mode", "0") == "1"
    }

    /// Absolute URL for an application path.
    pub fn url(&self, path: &str) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        let mount = self.settings.base_path.trim_matches('/');
        let path = path.trim_start_matches('/');
        if mount.is_empty() {
            format!("{}/{}", base, path)
        } else {
            format!("{}/{}/{}", base, mount, path)
        }
    }
}

impl Default for PortalServices {
    fn default() -> Self {
        Self::from_config(&PortalConfig::default())
    }
}
