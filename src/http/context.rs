//! Per-request context handed to every handler.
//!
//! Replaces ambient request/session globals: method, path, inputs, session and
//! shared services all travel in one value scoped to a single request.

use std::net::IpAddr;
use std::sync::Arc;

use serde_json::Value;

use crate::http::response::{Layout, PortalResponse};
use crate::http::session::{FlashKind, Role, Session};
use crate::routing::handler::Halt;
use crate::services::PortalServices;
use crate::store::{Record, Table};

const INVALID_FORM: &str = "Invalid form submission, please try again";

/// Escape text for safe inclusion in HTML (`&`, `<`, `>`, quotes).
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

fn parse_pairs(bytes: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(bytes).into_owned().collect()
}

pub struct RequestContext {
    pub method: String,
    /// Path as received, including the query string.
    pub raw_path: String,
    /// Mount prefix stripped before matching.
    pub script_base_path: String,
    pub remote_addr: Option<IpAddr>,
    pub session: Session,
    /// Pattern of the route that matched, set by the dispatcher.
    pub matched_pattern: Option<String>,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    services: Arc<PortalServices>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, raw_path: impl Into<String>) -> Self {
        let raw_path = raw_path.into();
        let query = raw_path
            .split_once('?')
            .map(|(_, q)| parse_pairs(q.as_bytes()))
            .unwrap_or_default();

        Self {
            method: method.into(),
            raw_path,
            script_base_path: "/".to_string(),
            remote_addr: None,
            session: Session::default(),
            matched_pattern: None,
            query,
            form: Vec::new(),
            services: Arc::new(PortalServices::default()),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.script_base_path = base_path.into();
        self
    }

    /// Attach an `application/x-www-form-urlencoded` body.
    pub fn with_form(mut self, body: &[u8]) -> Self {
        self.form = parse_pairs(body);
        self
    }

    pub fn with_form_pairs<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.form = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn with_services(mut self, services: Arc<PortalServices>) -> Self {
        self.services = services;
        self
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn services(&self) -> &Arc<PortalServices> {
        &self.services
    }

    pub fn is_post(&self) -> bool {
        self.method == "POST"
    }

    /// Unescaped input, POST body first, then query string.
    pub fn raw_input(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .chain(self.query.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Raw input, or `default` when absent.
    pub fn raw_input_or(&self, key: &str, default: &str) -> String {
        self.raw_input(key).unwrap_or(default).to_string()
    }

    /// HTML-escaped input.
    pub fn input(&self, key: &str) -> Option<String> {
        self.raw_input(key).map(escape_html)
    }

    /// Non-empty input parsed as a number.
    pub fn input_number(&self, key: &str) -> Option<u64> {
        self.raw_input(key).and_then(|v| v.trim().parse().ok())
    }

    /// Checkbox semantics: ticked boxes submit `on`.
    pub fn checkbox(&self, key: &str) -> bool {
        self.raw_input(key) == Some("on")
    }

    /// Requested page number, defaulting to 1.
    pub fn page(&self) -> usize {
        self.raw_input("page")
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }

    /// Names of required fields that are absent or empty.
    pub fn missing_fields(&self, fields: &[&str]) -> Vec<String> {
        fields
            .iter()
            .filter(|f| self.raw_input(f).map_or(true, |v| v.is_empty()))
            .map(|f| f.to_string())
            .collect()
    }

    /// Collect the named fields into a record, trimmed. Absent fields become empty strings.
    pub fn record_from(&self, fields: &[&str]) -> Record {
        fields
            .iter()
            .map(|f| {
                let value = self.raw_input(f).unwrap_or_default().trim().to_string();
                (f.to_string(), Value::String(value))
            })
            .collect()
    }

    pub fn flash(&mut self, kind: FlashKind, message: impl Into<String>) {
        self.session.flash(kind, message);
    }

    /// Flash a message and redirect.
    pub fn redirect_with(
        &mut self,
        kind: FlashKind,
        message: impl Into<String>,
        location: &str,
    ) -> Halt {
        self.flash(kind, message);
        Halt(PortalResponse::redirect(location))
    }

    pub fn require_auth(&mut self) -> Result<(), Halt> {
        if self.session.is_authenticated() {
            return Ok(());
        }
        Err(self.redirect_with(FlashKind::Error, "Please log in to access this page", "/login"))
    }

    pub fn require_role(&mut self, roles: &[Role]) -> Result<(), Halt> {
        self.require_auth()?;
        if self.session.has_role(roles) {
            return Ok(());
        }
        Err(self.redirect_with(
            FlashKind::Error,
            "You do not have permission to access this page",
            "/",
        ))
    }

    /// Reject POSTs without a valid CSRF token, redirecting to `back`.
    pub fn require_csrf(&mut self, back: &str) -> Result<(), Halt> {
        let submitted = self.raw_input("csrf_token").map(str::to_string);
        if self.session.validate_csrf(submitted.as_deref()) {
            return Ok(());
        }
        Err(self.redirect_with(FlashKind::Error, INVALID_FORM, back))
    }

    /// Reject submissions missing any of `fields`, redirecting to `back`.
    pub fn require_fields(&mut self, fields: &[&str], back: &str) -> Result<(), Halt> {
        let missing = self.missing_fields(fields);
        if missing.is_empty() {
            return Ok(());
        }
        Err(self.redirect_with(
            FlashKind::Error,
            format!("Please fill in all required fields: {}", missing.join(", ")),
            back,
        ))
    }

    /// Render a view inside the layout for the current role.
    pub fn render(&self, template: &str, data: Value) -> PortalResponse {
        PortalResponse::view(template, Some(Layout::for_role(self.session.role())), data)
    }

    /// Render a view without layout.
    pub fn render_bare(&self, template: &str, data: Value) -> PortalResponse {
        PortalResponse::view(template, None, data)
    }

    /// Record a back-office action. Anonymous requests are not logged.
    pub fn log_activity(
        &self,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<u64>,
        details: Option<String>,
    ) {
        let Some(user_id) = self.session.user_id() else {
            return;
        };
        let ip_address = self.remote_addr.map(|ip| ip.to_string()).unwrap_or_default();

        tracing::info!(
            target: "activity",
            user_id,
            action,
            entity_type = entity_type.unwrap_or(""),
            entity_id = ?entity_id,
            ip = %ip_address,
            "Activity recorded"
        );

        let mut record = Record::new();
        record.insert("user_id".into(), Value::from(user_id));
        record.insert("action".into(), Value::from(action));
        record.insert("entity_type".into(), entity_type.map(Value::from).unwrap_or(Value::Null));
        record.insert("entity_id".into(), entity_id.map(Value::from).unwrap_or(Value::Null));
        record.insert("details".into(), details.map(Value::from).unwrap_or(Value::Null));
        record.insert("ip_address".into(), Value::from(ip_address));
        self.services.store.insert(Table::ActivityLogs, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::SessionUser;

    fn staff_session() -> Session {
        let mut session = Session::default();
        session.login(
            SessionUser {
                id: 5,
                email: "staff@pasha.org".into(),
                name: "Sam Staff".into(),
                role: Role::Staff,
                partner_id: None,
            },
            false,
        );
        session
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href='x'>&\"</a>"),
            "&lt;a href=&#039;x&#039;&gt;&amp;&quot;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_post_input_wins_over_query() {
        let ctx = RequestContext::new("POST", "/verify?verification_type=company&x=1")
            .with_form(b"verification_type=id&value=A%26B");
        assert_eq!(ctx.raw_input("verification_type"), Some("id"));
        assert_eq!(ctx.raw_input("x"), Some("1"));
        assert_eq!(ctx.input("value").as_deref(), Some("A&amp;B"));
        assert_eq!(ctx.raw_input("missing"), None);
    }

    #[test]
    fn test_missing_fields() {
        let ctx = RequestContext::new("POST", "/contact").with_form(b"name=Ann&email=");
        assert_eq!(ctx.missing_fields(&["name", "email", "subject"]), vec!["email", "subject"]);
    }

    #[test]
    fn test_page_defaults_to_one() {
        assert_eq!(RequestContext::new("GET", "/offers").page(), 1);
        assert_eq!(RequestContext::new("GET", "/offers?page=0").page(), 1);
        assert_eq!(RequestContext::new("GET", "/offers?page=3").page(), 3);
    }

    #[test]
    fn test_require_auth_redirects_to_login() {
        let mut ctx = RequestContext::new("GET", "/admin");
        let Halt(response) = ctx.require_auth().unwrap_err();
        assert_eq!(response.location(), Some("/login"));
        assert_eq!(ctx.session.flash.len(), 1);
    }

    #[test]
    fn test_require_role_redirects_home() {
        let mut ctx = RequestContext::new("GET", "/admin/users").with_session(staff_session());
        assert!(ctx.require_role(&[Role::Admin, Role::Staff]).is_ok());
        let Halt(response) = ctx.require_role(&[Role::Admin]).unwrap_err();
        assert_eq!(response.location(), Some("/"));
    }

    #[test]
    fn test_require_csrf() {
        let mut session = Session::default();
        let token = session.csrf_token();
        let body = format!("csrf_token={}", token);
        let mut ctx = RequestContext::new("POST", "/contact")
            .with_session(session.clone())
            .with_form(body.as_bytes());
        assert!(ctx.require_csrf("/contact").is_ok());

        let mut ctx = RequestContext::new("POST", "/contact").with_session(session);
        let Halt(response) = ctx.require_csrf("/contact").unwrap_err();
        assert_eq!(response.location(), Some("/contact"));
    }

    #[test]
    fn test_render_picks_layout() {
        let ctx = RequestContext::new("GET", "/admin").with_session(staff_session());
        match ctx.render("admin/dashboard", Value::Null) {
            PortalResponse::View { layout, .. } => assert_eq!(layout, Some(Layout::Admin)),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_log_activity_requires_user() {
        let ctx = RequestContext::new("POST", "/x");
        ctx.log_activity("Nothing", None, None, None);
        assert_eq!(ctx.services().store.all(Table::ActivityLogs).len(), 0);

        let ctx = RequestContext::new("POST", "/x").with_session(staff_session());
        ctx.log_activity("Offer updated", Some("offer"), Some(3), None);
        let logs = ctx.services().store.all(Table::ActivityLogs);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["action"], "Offer updated");
    }
}
