//! Handler responses and their HTTP rendering.
//!
//! # Responsibilities
//! - Describe what a controller wants sent back (view, redirect, JSON, text, download)
//! - Render views as a template-name + data document with flash, CSRF and user
//! - Prefix redirect locations with the mount path
//!
//! # Design Decisions
//! - Controllers never touch HTTP types directly
//! - Rendering a view consumes pending flash messages
//! - Template rendering itself is out of process; views go out as JSON documents

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::session::{Role, Session};

/// Page chrome a view is wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Main,
    Admin,
    Partner,
}

impl Layout {
    /// Layout for the signed-in role (or anonymous visitor).
    pub fn for_role(role: Option<Role>) -> Self {
        match role {
            Some(Role::Admin) | Some(Role::Staff) => Layout::Admin,
            Some(Role::Partner) => Layout::Partner,
            None => Layout::Main,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortalResponse {
    View {
        status: u16,
        template: String,
        layout: Option<Layout>,
        data: Value,
    },
    Redirect {
        location: String,
    },
    Json {
        status: u16,
        value: Value,
    },
    Text {
        status: u16,
        body: String,
    },
    Attachment {
        filename: String,
        content_type: String,
        body: Vec<u8>,
    },
}

impl PortalResponse {
    pub fn view(template: impl Into<String>, layout: Option<Layout>, data: Value) -> Self {
        PortalResponse::View {
            status: 200,
            template: template.into(),
            layout,
            data,
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        PortalResponse::Redirect {
            location: location.into(),
        }
    }

    pub fn json(status: u16, value: Value) -> Self {
        PortalResponse::Json { status, value }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        PortalResponse::Text {
            status,
            body: body.into(),
        }
    }

    pub fn attachment(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        body: Vec<u8>,
    ) -> Self {
        PortalResponse::Attachment {
            filename: filename.into(),
            content_type: content_type.into(),
            body,
        }
    }

    /// Override the status of a view, JSON or text response.
    pub fn with_status(mut self, new_status: u16) -> Self {
        match &mut self {
            PortalResponse::View { status, .. }
            | PortalResponse::Json { status, .. }
            | PortalResponse::Text { status, .. } => *status = new_status,
            PortalResponse::Redirect { .. } | PortalResponse::Attachment { .. } => {}
        }
        self
    }

    pub fn status(&self) -> u16 {
        match self {
            PortalResponse::View { status, .. }
            | PortalResponse::Json { status, .. }
            | PortalResponse::Text { status, .. } => *status,
            PortalResponse::Redirect { .. } => 302,
            PortalResponse::Attachment { .. } => 200,
        }
    }

    pub fn body_text(&self) -> Option<&str> {
        match self {
            PortalResponse::Text { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            PortalResponse::Redirect { location } => Some(location),
            _ => None,
        }
    }

    pub fn template(&self) -> Option<&str> {
        match self {
            PortalResponse::View { template, .. } => Some(template),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            PortalResponse::View { data, .. } => Some(data),
            PortalResponse::Json { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Turn the response into an HTTP response.
    ///
    /// Views pull flash messages, CSRF token and user from `session`;
    /// redirects to absolute paths get `base_path` prepended.
    pub fn render(self, session: &mut Session, base_path: &str) -> Response {
        match self {
            PortalResponse::View {
                status,
                template,
                layout,
                data,
            } => {
                let document = json!({
                    "view": template,
                    "layout": layout,
                    "data": data,
                    "flash": session.take_flash(),
                    "csrf_token": session.csrf_token(),
                    "user": session.user,
                });
                (status_code(status), Json(document)).into_response()
            }
            PortalResponse::Redirect { location } => {
                let location = with_base_path(&location, base_path);
                match HeaderValue::from_str(&location) {
                    Ok(value) => {
                        let mut response = StatusCode::FOUND.into_response();
                        response.headers_mut().insert(header::LOCATION, value);
                        response
                    }
                    Err(_) => {
                        tracing::error!(
                            location = %location,
                            "Redirect location is not a valid header value"
                        );
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                }
            }
            PortalResponse::Json { status, value } => {
                (status_code(status), Json(value)).into_response()
            }
            PortalResponse::Text { status, body } => (status_code(status), body).into_response(),
            PortalResponse::Attachment {
                filename,
                content_type,
                body,
            } => {
                let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
                let mut response = Response::new(Body::from(body));
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    response.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                if let Ok(value) = HeaderValue::from_str(&disposition) {
                    response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
                }
                response
            }
        }
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Prefix an application-absolute location with the mount path.
pub fn with_base_path(location: &str, base_path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() || !location.starts_with('/') || location.starts_with("//") {
        location.to_string()
    } else {
        format!("{}{}", base, location)
    }
}
