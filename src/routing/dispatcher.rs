//! Request dispatch.
//!
//! # Responsibilities
//! - Normalize the request path (query string, mount prefix, trailing slash)
//! - Find the first route registered for the method that matches
//! - Invoke it with the captured parameters, or the not-found fallback
//!
//! # Design Decisions
//! - Unknown methods behave exactly like "no route matched"
//! - Resolution failures propagate as `DispatchError`, never as a 404
//! - No logging or recovery here; the HTTP layer owns both

use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::routing::error::DispatchError;
use crate::routing::handler::{ControllerRegistry, HandlerRef};
use crate::routing::table::{HttpMethod, Route, RouteTable};

/// Body of the built-in fallback when no not-found handler is set.
pub const DEFAULT_NOT_FOUND_BODY: &str = "404 Page Not Found";

/// Strip the query string and the mount prefix, then canonicalize slashes.
pub fn normalize_path(raw_path: &str, base_path: &str) -> String {
    let path = match raw_path.find('?') {
        Some(pos) => &raw_path[..pos],
        None => raw_path,
    };

    let base = base_path.trim_end_matches('/');
    let path = if base.is_empty() {
        path
    } else {
        path.strip_prefix(base).unwrap_or(path)
    };

    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    normalized
}

/// The route that matched and what it captured.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: Vec<String>,
}

impl RouteMatch<'_> {
    pub fn pattern(&self) -> &str {
        self.route.pattern.as_str()
    }
}

/// Route table plus controller registry; immutable once built.
#[derive(Clone)]
pub struct Dispatcher {
    table: RouteTable,
    registry: ControllerRegistry,
}

impl Dispatcher {
    pub fn new(table: RouteTable, registry: ControllerRegistry) -> Self {
        Self { table, registry }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// First route for `method` matching the already-normalized `path`.
    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let method: HttpMethod = method.parse().ok()?;
        self.table
            .routes_for(method)
            .iter()
            .find_map(|route| {
                route
                    .pattern
                    .captures(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    /// Run one request through the table.
    pub fn dispatch(&self, ctx: &mut RequestContext) -> Result<PortalResponse, DispatchError> {
        let path = normalize_path(&ctx.raw_path, &ctx.script_base_path);
        let method = ctx.method.clone();

        if let Some(matched) = self.find(&method, &path) {
            ctx.matched_pattern = Some(matched.pattern().to_string());
            return matched.route.handler.invoke(&self.registry, ctx, &matched.params);
        }

        match self.table.not_found() {
            Some(handler) => handler.invoke(&self.registry, ctx, &[]),
            None => Ok(PortalResponse::text(404, DEFAULT_NOT_FOUND_BODY)),
        }
    }

    /// Routes whose handler cannot be resolved, with the reason.
    ///
    /// Dispatch would fail on these; callers may report them at startup.
    pub fn unresolved(&self) -> Vec<(&Route, DispatchError)> {
        self.table
            .routes()
            .filter_map(|route| match &route.handler {
                HandlerRef::ControllerAction { controller, action } => {
                    match self.registry.arity_of(controller, action) {
                        Ok(arity) if arity == route.pattern.capture_count() => None,
                        Ok(arity) => Some((
                            route,
                            DispatchError::ArityMismatch {
                                controller: controller.clone(),
                                action: action.clone(),
                                expected: arity,
                                given: route.pattern.capture_count(),
                            },
                        )),
                        Err(e) => Some((route, e)),
                    }
                }
                HandlerRef::Invalid(text) => {
                    Some((route, DispatchError::InvalidHandler(text.clone())))
                }
                HandlerRef::Callable(_) => None,
            })
            .collect()
    }
}
