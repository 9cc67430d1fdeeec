//! PASHA Benefits Portal library.
//!
//! Membership verification and partner offers for PASHA Holding members,
//! served through a regex route table and controller dispatcher.

pub mod config;
pub mod controllers;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routes;
pub mod routing;
pub mod security;
pub mod services;
pub mod store;

pub use config::schema::PortalConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
