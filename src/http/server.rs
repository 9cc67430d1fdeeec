//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (tracing, limits, request ID, security headers)
//! - Run each request under its session's lock and set the session cookie
//! - Hand every request to the dispatcher and render its response
//! - Sweep expired sessions in the background
//!
//! # Design Decisions
//! - Routing is owned by the dispatcher, not by Axum
//! - A dispatch error is a deployment bug: logged, counted, answered with 500
//! - Maintenance mode is enforced here so controllers never see the request

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::PortalConfig;
use crate::http::context::RequestContext;
use crate::http::request::{cookie, is_form, request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::PortalResponse;
use crate::http::session::{Role, SessionStore};
use crate::lifecycle::shutdown::{wait_for, Shutdown};
use crate::observability::metrics;
use crate::routing::{normalize_path, Dispatcher};
use crate::security::with_security_headers;
use crate::services::PortalServices;

/// How often expired sessions are dropped.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const MAINTENANCE_MESSAGE: &str =
    "The portal is undergoing maintenance. Please check back shortly.";

/// Paths reachable while the portal is in maintenance mode.
const MAINTENANCE_OPEN_PATHS: [&str; 2] = ["/login", "/logout"];

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionStore>,
    pub services: Arc<PortalServices>,
    pub config: Arc<PortalConfig>,
}

/// HTTP server for the portal.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(
        config: PortalConfig,
        services: Arc<PortalServices>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(
            Duration::from_secs(config.session.lifetime_secs),
            Duration::from_secs(config.session.remember_me_secs),
        ));

        let state = AppState {
            dispatcher,
            sessions,
            services,
            config: Arc::new(config),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = Arc::clone(&state.config);

        let router = Router::new()
            .fallback(portal_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        let router = if config.security.enable_headers {
            with_security_headers(router)
        } else {
            router
        };

        router
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request_id(request.headers()),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Arc<Shutdown>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            base_path = %self.state.config.app.base_path,
            "HTTP server starting"
        );

        let sessions = Arc::clone(&self.state.sessions);
        let mut sweep_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let purged = sessions.purge_expired();
                        if purged > 0 {
                            tracing::debug!(
                                purged,
                                remaining = sessions.len(),
                                "Expired sessions purged"
                            );
                        }
                    }
                    _ = sweep_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// The 503 page, unless the visitor is an admin or is signing in or out.
fn maintenance_gate(ctx: &RequestContext) -> Option<PortalResponse> {
    if !ctx.services().maintenance_mode() || ctx.session.has_role(&[Role::Admin]) {
        return None;
    }

    let path = normalize_path(&ctx.raw_path, &ctx.script_base_path);
    if MAINTENANCE_OPEN_PATHS.contains(&path.as_str()) {
        return None;
    }

    Some(
        ctx.render_bare("maintenance", json!({ "message": MAINTENANCE_MESSAGE }))
        .with_status(503),
    )
}

fn session_cookie(state: &AppState, id: &str, max_age: Duration) -> Option<HeaderValue> {
    let session = &state.config.session;
    let mut value = format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax",
        session.cookie_name,
        id,
        max_age.as_secs()
    );
    if session.http_only {
        value.push_str("; HttpOnly");
    }
    if session.secure {
        value.push_str("; Secure");
    }
    HeaderValue::from_str(&value).ok()
}

/// Catch-all handler: session in, dispatcher, session out.
async fn portal_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();

    let request_id = request_id(&parts.headers).to_string();
    let method = parts.method.as_str().to_string();
    let raw_path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %raw_path,
        "Dispatching request"
    );

    let body = match axum::body::to_bytes(body, state.config.security.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_request(&method, 413, "none", start_time);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let cookie_value = cookie(&parts.headers, &state.config.session.cookie_name);
    let base_path = state.config.app.base_path.clone();
    let form = is_form(&parts.headers);

    // Dispatch runs while this session is locked; nothing below may await.
    let tx = state.sessions.transact(cookie_value.as_deref(), |session| {
        let mut ctx = RequestContext::new(method.clone(), raw_path.clone())
            .with_base_path(base_path.clone())
            .with_session(session)
            .with_services(Arc::clone(&state.services));
        if form {
            ctx = ctx.with_form(&body);
        }
        if let Some(ip) = remote_addr {
            ctx = ctx.with_remote_addr(ip);
        }

        let outcome = match maintenance_gate(&ctx) {
            Some(page) => Ok(page),
            None => state.dispatcher.dispatch(&mut ctx),
        };

        let route = ctx
            .matched_pattern
            .clone()
            .unwrap_or_else(|| "not_found".to_string());

        let portal_response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    method = %method,
                    path = %raw_path,
                    route = %route,
                    error = %e,
                    "Dispatch failed"
                );
                metrics::record_dispatch_error(&route);
                PortalResponse::text(500, "500 Internal Server Error")
            }
        };

        let mut session = std::mem::take(&mut ctx.session);
        let response = portal_response.render(&mut session, &base_path);
        (session, (response, route))
    });
    let (mut response, route) = tx.value;

    if let Some(value) = session_cookie(&state, &tx.id, tx.max_age) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    let status = response.status().as_u16();
    metrics::record_request(&method, status, &route, start_time);
    tracing::debug!(
        request_id = %request_id,
        status,
        route = %route,
        new_session = tx.is_new,
        session_rotated = tx.rotated,
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
