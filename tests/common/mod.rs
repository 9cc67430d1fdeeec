//! Shared utilities for end-to-end tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::net::TcpListener;

use pasha_portal::config::{AccountConfig, PortalConfig};
use pasha_portal::lifecycle::startup::{checked_dispatcher, prepare_services};
use pasha_portal::services::PortalServices;
use pasha_portal::{HttpServer, Shutdown};

pub const PASSWORD: &str = "correct-horse";

/// A running portal on an ephemeral port.
pub struct TestPortal {
    pub addr: SocketAddr,
    pub services: Arc<PortalServices>,
    pub shutdown: Arc<Shutdown>,
}

impl TestPortal {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestPortal {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

fn account(email: &str, role: &str, partner_id: Option<u64>) -> AccountConfig {
    AccountConfig {
        email: email.into(),
        password: PASSWORD.into(),
        first_name: "Test".into(),
        last_name: role.into(),
        role: role.into(),
        partner_id,
    }
}

/// Default config with an admin, a staff member and a partner user for partner 1.
pub fn test_config() -> PortalConfig {
    let mut config = PortalConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.accounts = vec![
        account("admin@pasha.az", "admin", None),
        account("staff@pasha.az", "staff", None),
        account("partner@cafe.az", "partner", Some(1)),
    ];
    config
}

/// Start the portal with `config` on 127.0.0.1 and an ephemeral port.
pub async fn spawn_portal(config: PortalConfig) -> TestPortal {
    let services = prepare_services(&config);
    let dispatcher = checked_dispatcher().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());

    let server = HttpServer::new(config, Arc::clone(&services), dispatcher);
    let server_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestPortal {
        addr,
        services,
        shutdown,
    }
}

/// Client that keeps the session cookie and does not follow redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// GET a view and return its JSON document.
pub async fn view(client: &reqwest::Client, url: &str) -> Value {
    let response = client.get(url).send().await.unwrap();
    assert!(response.status().is_success(), "GET {} returned {}", url, response.status());
    response.json().await.unwrap()
}

/// CSRF token of the current session, read from a rendered view.
pub async fn csrf_token(client: &reqwest::Client, portal: &TestPortal) -> String {
    let document = view(client, &portal.url("/about")).await;
    document["csrf_token"].as_str().unwrap().to_string()
}

/// POST a form with the session's CSRF token attached.
pub async fn post_form(
    client: &reqwest::Client,
    portal: &TestPortal,
    path: &str,
    fields: &[(&str, &str)],
) -> reqwest::Response {
    let token = csrf_token(client, portal).await;
    let mut form: Vec<(&str, &str)> = fields.to_vec();
    form.push(("csrf_token", &token));
    client.post(portal.url(path)).form(&form).send().await.unwrap()
}

/// Location header of a redirect.
pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Sign in and return the redirect target.
pub async fn login(client: &reqwest::Client, portal: &TestPortal, email: &str) -> String {
    let form = [("email", email), ("password", PASSWORD)];
    let response = post_form(client, portal, "/login", &form).await;
    assert_eq!(response.status(), 302);
    location(&response).to_string()
}
