//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the dispatcher and refuse to start when a route cannot resolve
//! - Seed configured accounts
//! - Start the metrics endpoint when enabled
//! - Bind the listener and run the server until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::PortalConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::routes::build_dispatcher;
use crate::routing::{Dispatcher, RouteError};
use crate::services::PortalServices;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Routes(#[from] RouteError),

    #[error("unresolved routes: {}", .0.join("; "))]
    UnresolvedRoutes(Vec<String>),

    #[error("invalid {field} address '{value}'")]
    Address { field: &'static str, value: String },

    #[error("failed to start metrics endpoint: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Dispatcher whose every route resolves to a controller action.
pub fn checked_dispatcher() -> Result<Arc<Dispatcher>, StartupError> {
    let dispatcher = build_dispatcher()?;
    let unresolved: Vec<String> = dispatcher
        .unresolved()
        .into_iter()
        .map(|(route, err)| {
            format!(
                "{} {} -> {}: {}",
                route.method,
                route.pattern.as_str(),
                route.handler,
                err
            )
        })
        .collect();

    if !unresolved.is_empty() {
        for line in &unresolved {
            tracing::error!(route = %line, "Route handler does not resolve");
        }
        return Err(StartupError::UnresolvedRoutes(unresolved));
    }

    tracing::info!(routes = dispatcher.table().len(), "Route table ready");
    Ok(dispatcher)
}

/// Shared services with the configured accounts seeded.
pub fn prepare_services(config: &PortalConfig) -> Arc<PortalServices> {
    let services = PortalServices::from_config(config);
    let seeded = services.seed_accounts(&config.accounts);
    tracing::info!(seeded, "Accounts ready");
    Arc::new(services)
}

/// Bring the portal up and serve until `shutdown` fires.
pub async fn start(config: PortalConfig, shutdown: Arc<Shutdown>) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address {
                field: "observability.metrics_address",
                value: config.observability.metrics_address.clone(),
            })?;
        metrics::init_metrics(addr)?;
    }

    let dispatcher = checked_dispatcher()?;
    let services = prepare_services(&config);

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    HttpServer::new(config, services, dispatcher)
        .run(listener, shutdown)
        .await
        .map_err(StartupError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use crate::store::Table;

    #[test]
    fn test_checked_dispatcher_accepts_portal_routes() {
        assert!(checked_dispatcher().is_ok());
    }

    #[test]
    fn test_prepare_services_seeds_once() {
        let mut config = PortalConfig::default();
        config.accounts.push(AccountConfig {
            email: "admin@pasha.az".into(),
            password: "secret123".into(),
            first_name: "Admin".into(),
            last_name: "User".into(),
            role: "admin".into(),
            partner_id: None,
        });
        let services = prepare_services(&config);
        assert_eq!(services.seed_accounts(&config.accounts), 0);
        assert_eq!(services.store.all(Table::Users).len(), 1);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = PortalConfig::default();
        config.listener.bind_address = taken.local_addr().unwrap().to_string();
        let err = start(config, Arc::new(Shutdown::new())).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
    }
}
