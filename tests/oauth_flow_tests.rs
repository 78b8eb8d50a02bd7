//! OAuth PKCE login flow tests
//!
//! Drives the loopback callback server over real HTTP and checks the token
//! exchange against a wiremock token endpoint.

use std::net::TcpListener;
use std::time::Duration;

use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reflect_mcp::Error;
use reflect_mcp::config::AuthConfig;
use reflect_mcp::oauth::{AuthFlow, CallbackResult, FlowPhase, OAuthEndpoints, pkce};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A port that was free a moment ago
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

fn auth_config(port: u16) -> AuthConfig {
    AuthConfig {
        client_id: "abc123".to_string(),
        client_secret: Some("s3cret".to_string()),
        redirect_uri: format!("http://127.0.0.1:{port}/callback"),
    }
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// The listener is released asynchronously after the guard drops
async fn wait_until_bindable(port: u16) -> bool {
    for _ in 0..50 {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

// ---------------------------------------------------------------------------
// Authorization URL
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authorization_url_carries_pkce_parameters() {
    let port = free_port();
    let flow = AuthFlow::new(&auth_config(port)).unwrap();
    let pending = flow.start().await.unwrap();
    let url = pending.authorization_url().clone();

    assert!(url.as_str().starts_with("https://reflect.app/oauth?"));
    let encoded =
        format!("client_id=abc123&redirect_uri=http%3A%2F%2F127.0.0.1%3A{port}%2Fcallback");
    assert!(url.as_str().contains(&encoded), "{url}");
    assert!(url.as_str().contains("code_challenge_method=S256"));
    assert_eq!(query_param(&url, "response_type").as_deref(), Some("code"));
    assert_eq!(
        query_param(&url, "scope").as_deref(),
        Some("read:graph write:graph")
    );
    assert_eq!(query_param(&url, "state").unwrap().len(), 22);
    assert_eq!(query_param(&url, "code_challenge").unwrap().len(), 43);
}

// ---------------------------------------------------------------------------
// Callback server over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn callback_ignores_wrong_path_then_accepts_matching_state() {
    let port = free_port();
    let flow = AuthFlow::new(&auth_config(port)).unwrap();
    let pending = flow.start().await.unwrap();
    let state = query_param(pending.authorization_url(), "state").unwrap();
    let challenge = query_param(pending.authorization_url(), "code_challenge").unwrap();

    let waiter = tokio::spawn(pending.wait_for_code());
    let http = reqwest::Client::new();

    let resp = http
        .get(format!("http://127.0.0.1:{port}/favicon.ico"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = http
        .get(format!(
            "http://127.0.0.1:{port}/callback?code=XYZ&state={state}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("close this tab"));

    let (callback, material) = waiter.await.unwrap().unwrap();
    assert_eq!(
        callback,
        CallbackResult {
            code: "XYZ".to_string(),
            state: state.clone(),
        }
    );
    assert_eq!(material.state(), state);
    assert_eq!(material.code_challenge(), challenge);
    assert_eq!(pkce::code_challenge(material.code_verifier()), challenge);

    assert!(wait_until_bindable(port).await, "port {port} still held");
}

#[tokio::test]
async fn callback_with_wrong_state_fails_the_flow() {
    let port = free_port();
    let flow = AuthFlow::new(&auth_config(port)).unwrap();
    let pending = flow.start().await.unwrap();

    let waiter = tokio::spawn(pending.wait_for_code());
    let resp = reqwest::get(format!(
        "http://127.0.0.1:{port}/callback?code=XYZ&state=forged"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 400);

    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::InvalidCallback(ref m) if m == "Invalid state"), "{err}");
    assert!(wait_until_bindable(port).await, "port {port} still held");
}

#[tokio::test]
async fn rejection_page_is_still_readable_after_the_flow_fails() {
    let port = free_port();
    let flow = AuthFlow::new(&auth_config(port)).unwrap();
    let pending = flow.start().await.unwrap();

    let waiter = tokio::spawn(pending.wait_for_code());
    let resp = reqwest::get(format!(
        "http://127.0.0.1:{port}/callback?code=XYZ&state=forged"
    ))
    .await
    .unwrap();

    // The wait has returned and the server is shut down before the body is read
    assert!(waiter.await.unwrap().is_err());
    assert_eq!(resp.status(), 400);
    let page = resp.text().await.unwrap();
    assert!(page.contains("Authorization Failed"), "{page}");
    assert!(page.contains("Invalid state"), "{page}");
}

#[tokio::test]
async fn callback_with_provider_error_fails_the_flow() {
    let port = free_port();
    let flow = AuthFlow::new(&auth_config(port)).unwrap();
    let pending = flow.start().await.unwrap();

    let waiter = tokio::spawn(pending.wait_for_code());
    let resp = reqwest::get(format!(
        "http://127.0.0.1:{port}/callback?error=access_denied&error_description=User%20said%20no"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 400);

    let err = waiter.await.unwrap().unwrap_err();
    let Error::InvalidCallback(message) = &err else {
        panic!("expected InvalidCallback, got {err}");
    };
    assert!(message.contains("access_denied"));
    assert!(message.contains("User said no"));
}

#[tokio::test]
async fn start_fails_when_port_is_taken() {
    let holder = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = holder.local_addr().unwrap().port();

    let flow = AuthFlow::new(&auth_config(port)).unwrap();
    let err = flow.start().await.err().expect("bind should fail");
    assert!(matches!(err, Error::Listener(_)), "{err}");
}

#[test]
fn non_loopback_redirect_is_rejected_before_binding() {
    let mut config = auth_config(8787);
    config.redirect_uri = "http://example.com:8787/callback".to_string();
    assert!(matches!(AuthFlow::new(&config), Err(Error::Config(_))));

    config.redirect_uri = "https://127.0.0.1:8787/callback".to_string();
    assert!(matches!(AuthFlow::new(&config), Err(Error::Config(_))));
}

// ---------------------------------------------------------------------------
// Token exchange
// ---------------------------------------------------------------------------

fn flow_against(server: &MockServer) -> AuthFlow {
    AuthFlow::new(&auth_config(8787))
        .unwrap()
        .with_endpoints(OAuthEndpoints {
            token_url: format!("{}/api/oauth/token", server.uri()),
            ..OAuthEndpoints::default()
        })
}

fn callback() -> CallbackResult {
    CallbackResult {
        code: "XYZ".to_string(),
        state: "irrelevant".to_string(),
    }
}

#[tokio::test]
async fn token_exchange_posts_verifier_and_returns_token() {
    let server = MockServer::start().await;
    let material = pkce::generate();

    Mock::given(method("POST"))
        .and(path("/api/oauth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_id=abc123"))
        .and(body_string_contains("client_secret=s3cret"))
        .and(body_string_contains("code=XYZ"))
        .and(body_string_contains(format!(
            "code_verifier={}",
            material.code_verifier()
        )))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "abc", "token_type": "Bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let flow = flow_against(&server);
    let token = flow.exchange_code(&callback(), &material).await.unwrap();
    assert_eq!(token.access_token, "abc");
    assert_eq!(token.token_type.as_deref(), Some("Bearer"));
}

#[tokio::test]
async fn token_exchange_sends_redirect_uri_form_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2F127.0.0.1%3A8787%2Fcallback",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let flow = flow_against(&server);
    flow.exchange_code(&callback(), &pkce::generate())
        .await
        .unwrap();
}

#[tokio::test]
async fn token_exchange_surfaces_http_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let flow = flow_against(&server);
    let err = flow
        .exchange_code(&callback(), &pkce::generate())
        .await
        .unwrap_err();
    let Error::TokenExchange { status, body } = &err else {
        panic!("expected TokenExchange, got {err}");
    };
    assert_eq!(*status, 401);
    assert_eq!(body, "invalid_client");
}

#[tokio::test]
async fn token_exchange_without_access_token_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token_type": "Bearer"})),
        )
        .mount(&server)
        .await;

    let flow = flow_against(&server);
    let err = flow
        .exchange_code(&callback(), &pkce::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedTokenResponse(_)), "{err}");
}

#[tokio::test]
async fn token_exchange_with_non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let flow = flow_against(&server);
    let err = flow
        .exchange_code(&callback(), &pkce::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedTokenResponse(_)), "{err}");
}

// ---------------------------------------------------------------------------
// Whole flow
// ---------------------------------------------------------------------------

fn flow_on(port: u16, server: &MockServer) -> AuthFlow {
    AuthFlow::new(&auth_config(port))
        .unwrap()
        .with_endpoints(OAuthEndpoints {
            token_url: format!("{}/api/oauth/token", server.uri()),
            ..OAuthEndpoints::default()
        })
}

/// Acts as the browser: follows the redirect with the URL's own state, or
/// with `forged_state` when given
fn browser(port: u16, forged_state: Option<&'static str>) -> impl FnOnce(&Url) {
    move |url: &Url| {
        let state = forged_state.map_or_else(
            || query_param(url, "state").expect("state in authorization URL"),
            str::to_string,
        );
        tokio::spawn(async move {
            reqwest::get(format!(
                "http://127.0.0.1:{port}/callback?code=XYZ&state={state}"
            ))
            .await
        });
    }
}

#[tokio::test]
async fn run_ends_complete_after_callback_and_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/oauth/token"))
        .and(body_string_contains("code=XYZ"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "abc", "expires_in": "3600"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let port = free_port();
    let flow = flow_on(port, &server);
    let mut phase = FlowPhase::Idle;

    let token = flow
        .run_with(&mut phase, browser(port, None))
        .await
        .unwrap();
    assert_eq!(token.access_token, "abc");
    assert_eq!(token.expires_in, Some(3600));
    assert_eq!(phase, FlowPhase::Complete);
    assert!(wait_until_bindable(port).await, "port {port} still held");
}

#[tokio::test]
async fn run_ends_failed_on_state_mismatch_without_exchanging() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let port = free_port();
    let flow = flow_on(port, &server);
    let mut phase = FlowPhase::Idle;

    let err = flow
        .run_with(&mut phase, browser(port, Some("forged")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCallback(ref m) if m == "Invalid state"), "{err}");
    assert_eq!(phase, FlowPhase::Failed);
}

#[tokio::test]
async fn run_ends_failed_when_exchange_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .expect(1)
        .mount(&server)
        .await;

    let port = free_port();
    let flow = flow_on(port, &server);
    let mut phase = FlowPhase::Idle;

    let err = flow
        .run_with(&mut phase, browser(port, None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenExchange { status: 400, .. }), "{err}");
    assert_eq!(phase, FlowPhase::Failed);
}

#[tokio::test]
async fn run_ends_failed_when_port_is_taken() {
    let holder = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = holder.local_addr().unwrap().port();
    let server = MockServer::start().await;

    let flow = flow_on(port, &server);
    let mut phase = FlowPhase::Idle;
    let mut prompted = false;

    let err = flow
        .run_with(&mut phase, |_| prompted = true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Listener(_)), "{err}");
    assert_eq!(phase, FlowPhase::Failed);
    assert!(!prompted, "URL must not be shown before the listener is bound");
}
