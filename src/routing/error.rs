//! Routing errors.
//!
//! Registration errors surface at startup. Dispatch errors mean the route table
//! points at something that does not exist; they are never turned into a 404.

use thiserror::Error;

/// Error raised while building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Fatal misconfiguration detected while resolving a matched route.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("controller {0} not found")]
    ControllerNotFound(String),

    #[error("action {action} not found in controller {controller}")]
    ActionNotFound { controller: String, action: String },

    #[error("action {controller}@{action} takes {expected} parameter(s), route captured {given}")]
    ArityMismatch {
        controller: String,
        action: String,
        expected: usize,
        given: usize,
    },

    #[error("invalid handler reference `{0}`")]
    InvalidHandler(String),
}
