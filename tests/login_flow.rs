//! End-to-end login flow through the web API against a stub portal.

mod helpers;

use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use helpers::{CAPTCHA_PNG, FixedSolver, LOGIN_PAGE, call, portal_for, request_log, router_for};
use serde_json::json;
use vtop::vtop::cookies;
use vtop::vtop::{CaptchaSolver, CookieMap, LoginSubmission, VtopError};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token(pairs: &[(&str, &str)]) -> String {
    let map: CookieMap = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    cookies::encode(&map)
}

async fn mount_login_page(server: &MockServer, html: &str) {
    Mock::given(method("GET"))
        .and(path("/vtop/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .append_header("set-cookie", "JSESSIONID=abc; Path=/vtop; HttpOnly")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    let (status, body) = call(router_for(&server), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = MockServer::start().await;
    let (status, body) = call(router_for(&server), "GET", "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_start_returns_captcha_and_token() {
    let server = MockServer::start().await;
    mount_login_page(&server, LOGIN_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/c.png"))
        .and(header("cookie", "JSESSIONID=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CAPTCHA_PNG))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = call(router_for(&server), "POST", "/login/start", None).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["captcha_needed"], true);
    assert_eq!(body["login_form_action"], "/doLogin");
    assert_eq!(
        body["captcha_image_b64"].as_str().unwrap(),
        STANDARD.encode(CAPTCHA_PNG)
    );

    let restored = cookies::decode(body["prelogin_cookies_token"].as_str().unwrap()).unwrap();
    assert_eq!(restored.get("JSESSIONID").map(String::as_str), Some("abc"));
}

#[tokio::test]
async fn test_start_without_captcha() {
    let server = MockServer::start().await;
    mount_login_page(&server, r#"<form><input name="username"></form>"#).await;

    let (status, body) = call(router_for(&server), "POST", "/login/start", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["captcha_needed"], false);
    assert!(body["captcha_image_b64"].is_null());
    assert!(body["login_form_action"].is_null());
}

#[tokio::test]
async fn test_start_with_broken_captcha_image() {
    let server = MockServer::start().await;
    mount_login_page(&server, LOGIN_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/c.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (status, body) = call(router_for(&server), "POST", "/login/start", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["captcha_needed"], true);
    assert!(body["captcha_image_b64"].is_null());
}

#[tokio::test]
async fn test_start_login_page_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vtop/login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (status, body) = call(router_for(&server), "POST", "/login/start", None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["detail"], "Failed to open login page: 503");
}

#[tokio::test]
async fn test_finish_success_follows_redirect_and_keeps_cookies() {
    let server = MockServer::start().await;
    mount_login_page(&server, LOGIN_PAGE).await;
    Mock::given(method("POST"))
        .and(path("/doLogin"))
        .and(header("cookie", "JSESSIONID=abc"))
        .and(body_string_contains("_csrf=csrf-token-1"))
        .and(body_string_contains("username=21BCE1234"))
        .and(body_string_contains("password=s3cret"))
        .and(body_string_contains("captchaCode=AB12C"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/vtop/content")
                .append_header("set-cookie", "AUTH=token-9; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vtop/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<nav><a href="/vtop/logout">Logout</a></nav>"#,
        ))
        .mount(&server)
        .await;

    let request = json!({
        "username": "21BCE1234",
        "password": "s3cret",
        "captcha_text": "AB12C",
        "prelogin_cookies_token": token(&[("JSESSIONID", "abc")]),
    });
    let (status, body) = call(router_for(&server), "POST", "/login/finish", Some(request)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["cookies"]["JSESSIONID"], "abc");
    assert_eq!(body["cookies"]["AUTH"], "token-9");
    assert!(
        body["landing_url"].as_str().unwrap().ends_with("/vtop/content"),
        "{body}"
    );
}

#[tokio::test]
async fn test_finish_uses_caller_action_and_omits_empty_captcha() {
    let server = MockServer::start().await;
    mount_login_page(&server, LOGIN_PAGE).await;
    Mock::given(method("POST"))
        .and(path("/vtop/processLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Dashboard</h1>"))
        .expect(1)
        .mount(&server)
        .await;

    let request = json!({
        "username": "u",
        "password": "p",
        "captcha_text": "",
        "prelogin_cookies_token": token(&[]),
        "login_form_action": "/vtop/processLogin",
    });
    let (status, body) = call(router_for(&server), "POST", "/login/finish", Some(request)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let received = server.received_requests().await.unwrap();
    let post = received
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let form = String::from_utf8_lossy(&post.body);
    // The page's empty captchaCode input is still sent, but without a value.
    assert!(form.contains("captchaCode=&") || form.ends_with("captchaCode="), "{form}");
}

#[tokio::test]
async fn test_finish_falls_back_when_form_has_no_action() {
    let server = MockServer::start().await;
    mount_login_page(&server, r#"<form><input name="username"></form>"#).await;
    Mock::given(method("POST"))
        .and(path("/vtop/doLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("logout"))
        .expect(1)
        .mount(&server)
        .await;

    let request = json!({
        "username": "u",
        "password": "p",
        "prelogin_cookies_token": token(&[]),
    });
    let (status, _) = call(router_for(&server), "POST", "/login/finish", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
}

/// Login page whose form posts back to itself, so a rejection lands on the login URL.
const SELF_POSTING_PAGE: &str = r#"<form action="/vtop/login"><input name="username"></form>"#;

async fn finish_with_rejection(answer: &str) -> (StatusCode, serde_json::Value) {
    let server = MockServer::start().await;
    mount_login_page(&server, SELF_POSTING_PAGE).await;
    Mock::given(method("POST"))
        .and(path("/vtop/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(answer))
        .mount(&server)
        .await;

    let request = json!({
        "username": "u",
        "password": "p",
        "captcha_text": "XXXX",
        "prelogin_cookies_token": token(&[("JSESSIONID", "abc")]),
    });
    call(router_for(&server), "POST", "/login/finish", Some(request)).await
}

#[tokio::test]
async fn test_finish_captcha_rejected() {
    let (status, body) = finish_with_rejection("<p class=error>Invalid Captcha</p>").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Captcha required or incorrect");
}

#[tokio::test]
async fn test_finish_credentials_rejected() {
    let (status, body) = finish_with_rejection("<p>Invalid username or password</p>").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid credentials");
}

#[tokio::test]
async fn test_finish_unclassified() {
    let (status, body) = finish_with_rejection("<p>Please sign in</p>").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Login failed; check form field names/action URL");
}

#[tokio::test]
async fn test_finish_bad_token() {
    let server = MockServer::start().await;
    let request = json!({
        "username": "u",
        "password": "p",
        "prelogin_cookies_token": "%%%",
    });
    let (status, body) = call(router_for(&server), "POST", "/login/finish", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Invalid prelogin_cookies_token")
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_finish_missing_fields() {
    let server = MockServer::start().await;
    let (status, body) = call(
        router_for(&server),
        "POST",
        "/login/finish",
        Some(json!({ "username": "u" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_one_shot_login_on_single_session() {
    let server = MockServer::start().await;
    mount_login_page(&server, LOGIN_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/c.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CAPTCHA_PNG))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/doLogin"))
        .and(body_string_contains("_csrf=csrf-token-1"))
        .and(body_string_contains("captchaCode=ZX9Q"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Student Dashboard"))
        .expect(1)
        .mount(&server)
        .await;

    let portal = portal_for(&server);
    let pending = portal.begin_login().await.unwrap();
    let image = pending.captcha_image.clone().unwrap();
    let captcha_text = FixedSolver("ZX9Q").solve(&image).await.unwrap();

    let submission = LoginSubmission {
        username: "21BCE1234".to_string(),
        password: "pw".to_string(),
        captcha_text: Some(captcha_text),
        form_action: None,
    };
    let session = portal.complete_login(pending, &submission).await.unwrap();

    assert_eq!(session.cookies.get("JSESSIONID").map(String::as_str), Some("abc"));
    assert!(session.landing_url.ends_with("/doLogin"));
    // The captcha answered belongs to the only login page served.
    assert_eq!(
        request_log(&server).await,
        ["GET /vtop/login", "GET /c.png", "POST /doLogin"]
    );
}

#[tokio::test]
async fn test_portal_finish_refreshes_login_page() {
    let server = MockServer::start().await;
    mount_login_page(&server, LOGIN_PAGE).await;
    Mock::given(method("POST"))
        .and(path("/doLogin"))
        .and(body_string_contains("_csrf=csrf-token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("logout"))
        .expect(1)
        .mount(&server)
        .await;

    let submission = LoginSubmission {
        username: "u".to_string(),
        password: "p".to_string(),
        captcha_text: Some("AB12C".to_string()),
        form_action: None,
    };
    let session = portal_for(&server)
        .finish(&token(&[("JSESSIONID", "abc")]), &submission)
        .await
        .unwrap();

    assert_eq!(session.cookies.get("JSESSIONID").map(String::as_str), Some("abc"));
    assert_eq!(request_log(&server).await, ["GET /vtop/login", "POST /doLogin"]);
}

#[tokio::test]
async fn test_portal_finish_rejects_bad_token_before_any_request() {
    let server = MockServer::start().await;
    let submission = LoginSubmission {
        username: "u".to_string(),
        password: "p".to_string(),
        captcha_text: None,
        form_action: None,
    };
    let err = portal_for(&server).finish("%%%", &submission).await.unwrap_err();
    assert!(matches!(err, VtopError::Decode(_)), "{err:?}");
    assert!(request_log(&server).await.is_empty());
}

#[tokio::test]
async fn test_finish_submit_failure_names_submission() {
    let server = MockServer::start().await;
    mount_login_page(&server, LOGIN_PAGE).await;

    // Nothing listens on port 1, so the credential POST itself fails.
    let request = json!({
        "username": "u",
        "password": "p",
        "prelogin_cookies_token": token(&[]),
        "login_form_action": "http://127.0.0.1:1/doLogin",
    });
    let (status, body) = call(router_for(&server), "POST", "/login/finish", Some(request)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["detail"], "Failed to submit login: portal unreachable");
}

#[tokio::test]
async fn test_captcha_resolves_against_login_page_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vtop/login"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/vtop/open/login"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vtop/open/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form action="doLogin"><img id="imgCaptcha" src="captcha.png"></form>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vtop/captcha.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CAPTCHA_PNG))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vtop/doLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("dashboard"))
        .expect(1)
        .mount(&server)
        .await;

    let portal = portal_for(&server);
    let pending = portal.begin_login().await.unwrap();
    assert_eq!(pending.captcha_image.as_deref(), Some(CAPTCHA_PNG));

    let submission = LoginSubmission {
        username: "u".to_string(),
        password: "p".to_string(),
        captcha_text: Some("AB12C".to_string()),
        form_action: None,
    };
    portal.complete_login(pending, &submission).await.unwrap();
}
