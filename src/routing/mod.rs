//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, raw path, mount prefix)
//!     → dispatcher.rs (normalize path)
//!     → table.rs (routes for the method, registration order)
//!     → pattern.rs (anchored regex, positional captures)
//!     → handler.rs (resolve Controller@action, invoke with params)
//!     → PortalResponse, or the not-found fallback
//!
//! Route table construction (at startup):
//!     register(method, pattern, handler) in order
//!     → compile patterns
//!     → freeze as immutable Dispatcher behind Arc
//! ```
//!
//! # Design Decisions
//! - First match wins; registration order is the only priority
//! - Patterns are raw regex fragments anchored to the whole path
//! - Misconfigured handlers are fatal errors, not 404s

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod pattern;
pub mod table;

pub use dispatcher::{normalize_path, Dispatcher, RouteMatch};
pub use error::{DispatchError, RouteError};
pub use handler::{Action, Controller, ControllerRegistry, Halt, HandlerRef, Outcome};
pub use pattern::RoutePattern;
pub use table::{HttpMethod, Route, RouteTable};
