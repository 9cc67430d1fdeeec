//! Route table.
//!
//! # Responsibilities
//! - Store compiled routes per HTTP method, in registration order
//! - Hold the single not-found fallback
//!
//! # Design Decisions
//! - Registration order is the priority; no specificity ranking
//! - No deduplication: an identical later pattern is simply unreachable
//! - No removal; the table is frozen behind an `Arc` before serving

use std::fmt;
use std::str::FromStr;

use crate::routing::error::RouteError;
use crate::routing::handler::HandlerRef;
use crate::routing::pattern::RoutePattern;

/// Methods the portal registers routes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned for any method the table does not know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            other => Err(UnsupportedMethod(other.to_string())),
        }
    }
}

/// A registered (method, pattern, handler) triple.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: HttpMethod,
    pub pattern: RoutePattern,
    pub handler: HandlerRef,
}

/// Ordered routes plus the not-found fallback.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    get: Vec<Route>,
    post: Vec<Route>,
    not_found: Option<HandlerRef>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append the route to the method's list.
    pub fn register(
        &mut self,
        method: HttpMethod,
        pattern: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<&mut Self, RouteError> {
        let route = Route {
            method,
            pattern: RoutePattern::compile(pattern)?,
            handler: handler.into(),
        };
        match method {
            HttpMethod::Get => self.get.push(route),
            HttpMethod::Post => self.post.push(route),
        }
        Ok(self)
    }

    pub fn get(
        &mut self,
        pattern: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<&mut Self, RouteError> {
        self.register(HttpMethod::Get, pattern, handler)
    }

    pub fn post(
        &mut self,
        pattern: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<&mut Self, RouteError> {
        self.register(HttpMethod::Post, pattern, handler)
    }

    /// Set the handler used when nothing matches. It is invoked with no parameters.
    pub fn set_not_found(&mut self, handler: impl Into<HandlerRef>) -> &mut Self {
        self.not_found = Some(handler.into());
        self
    }

    pub fn not_found(&self) -> Option<&HandlerRef> {
        self.not_found.as_ref()
    }

    /// Routes for one method, in registration order.
    pub fn routes_for(&self, method: HttpMethod) -> &[Route] {
        match method {
            HttpMethod::Get => &self.get,
            HttpMethod::Post => &self.post,
        }
    }

    /// Every route, GET first then POST, each in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.get.iter().chain(self.post.iter())
    }

    pub fn len(&self) -> usize {
        self.get.len() + self.post.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order_is_kept() {
        let mut table = RouteTable::new();
        table.get("/a", "A@one").unwrap();
        table.get("/b", "B@two").unwrap();
        table.post("/a", "A@save").unwrap();

        let patterns: Vec<_> = table
            .routes_for(HttpMethod::Get)
            .iter()
            .map(|r| r.pattern.as_str())
            .collect();
        assert_eq!(patterns, vec!["/a", "/b"]);
        assert_eq!(table.routes_for(HttpMethod::Post).len(), 1);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_duplicates_are_accepted() {
        let mut table = RouteTable::new();
        table.get("/x/([0-9]+)", "First@one").unwrap();
        table.get("/x/([0-9]+)", "Second@one").unwrap();
        assert_eq!(table.routes_for(HttpMethod::Get).len(), 2);
    }

    #[test]
    fn test_bad_pattern_fails_registration() {
        let mut table = RouteTable::new();
        assert!(table.get("/x/(", "X@y").is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("GET".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!("POST".parse::<HttpMethod>(), Ok(HttpMethod::Post));
        assert!("DELETE".parse::<HttpMethod>().is_err());
        assert!("get".parse::<HttpMethod>().is_err());
    }
}
