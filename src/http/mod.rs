//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, catch-all handler)
//!     → request.rs (request ID, cookie and form detection)
//!     → session.rs (load the visitor's session)
//!     → context.rs (inputs, guards, flash, activity log)
//!     → [dispatcher picks the controller action]
//!     → response.rs (view JSON, redirect, attachment)
//!     → Send to client
//! ```

pub mod context;
pub mod request;
pub mod response;
pub mod server;
pub mod session;

pub use context::RequestContext;
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::PortalResponse;
pub use server::{AppState, HttpServer};
pub use session::{FlashKind, Role, Session, SessionStore, SessionTransaction};
