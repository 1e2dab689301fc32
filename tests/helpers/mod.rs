//! Shared fixtures: a stub portal and a router wired to it.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use figment::Figment;
use figment::providers::{Format, Toml};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use vtop::config::Config;
use vtop::state::AppState;
use vtop::vtop::{CaptchaSolver, Portal};
use vtop::web::create_router;
use wiremock::MockServer;

/// Config pointing every portal URL at `server`.
pub fn config_for(server: &MockServer) -> Config {
    config_with(server, "")
}

/// [`config_for`] with `overrides` (TOML) merged on top.
pub fn config_with(server: &MockServer, overrides: &str) -> Config {
    let uri = server.uri();
    Figment::new()
        .merge(Toml::string(&format!(
            r#"
            login_page_url = "{uri}/vtop/login"
            base_url = "{uri}/vtop/open/page"
            page_timeout = "5s"
            submit_timeout = "5s"
            timetable_timeout = "5s"
            "#
        )))
        .merge(Toml::string(overrides))
        .extract()
        .expect("test config")
}

pub fn portal_for(server: &MockServer) -> Portal {
    Portal::new(&config_for(server)).expect("portal")
}

pub fn router_for(server: &MockServer) -> Router {
    create_router(AppState::new(Arc::new(portal_for(server))))
}

/// Send one request through the router and decode the JSON body.
pub async fn call(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}

pub const LOGIN_PAGE: &str = r#"<html><body>
    <form id="vtopLoginForm" action="/doLogin" method="post">
        <input type="hidden" name="_csrf" value="csrf-token-1">
        <input type="text" name="username">
        <input type="password" name="password">
        <img id="imgCaptcha" src="/c.png">
        <input type="text" name="captchaCode">
    </form>
</body></html>"#;

pub const CAPTCHA_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-captcha";

/// Recognizer stand-in that always reads the same text.
pub struct FixedSolver(pub &'static str);

#[async_trait::async_trait]
impl CaptchaSolver for FixedSolver {
    async fn solve(&self, image: &[u8]) -> anyhow::Result<String> {
        assert_eq!(image, CAPTCHA_PNG);
        Ok(self.0.to_string())
    }
}

/// `"METHOD /path"` for every request `server` has seen, in order.
pub async fn request_log(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}
