//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → body limit (reject oversized POST bodies)
//!     → session + CSRF checks (in the request context, per action)
//!     → headers.rs (security headers on the way out)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing or wrong CSRF token rejects the form
//! - No trust in client input: inputs are escaped before they reach views

pub mod headers;

pub use headers::with_security_headers;
