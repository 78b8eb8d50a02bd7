//! Authorization Code + PKCE login flow
//!
//! `Idle → AwaitingAuthorization → CodeReceived → Exchanging → Complete`,
//! with every failure terminal. Nothing here retries: a fresh flow means
//! fresh state and verifier.

use std::net::SocketAddr;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::callback::{CallbackResult, CallbackServer, RedirectTarget, validate_redirect_uri};
use super::pkce::{self, PkceMaterial};
use crate::config::AuthConfig;
use crate::{Error, Result};

/// Reflect's authorization endpoint
pub const AUTHORIZATION_ENDPOINT: &str = "https://reflect.app/oauth";

/// Reflect's token endpoint
pub const TOKEN_ENDPOINT: &str = "https://reflect.app/api/oauth/token";

/// Scope requested for every login
pub const DEFAULT_SCOPE: &str = "read:graph write:graph";

/// Where the flow sends the user and the code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    /// Authorization endpoint (opened by the user's browser)
    pub authorization_url: String,
    /// Token endpoint (contacted directly)
    pub token_url: String,
    /// Space-separated scopes
    pub scope: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorization_url: AUTHORIZATION_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

/// Flow lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    /// Nothing generated yet
    Idle,
    /// Listener bound, waiting for the browser redirect
    AwaitingAuthorization,
    /// Valid callback captured
    CodeReceived,
    /// Token request in flight
    Exchanging,
    /// Token obtained
    Complete,
    /// Terminal failure
    Failed,
}

impl FlowPhase {
    /// Whether the flow can move from `self` to `next`
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::AwaitingAuthorization)
                | (Self::AwaitingAuthorization, Self::CodeReceived)
                | (Self::CodeReceived, Self::Exchanging)
                | (Self::Exchanging, Self::Complete)
        ) || (next == Self::Failed && !self.is_terminal())
    }

    /// `Complete` and `Failed` end the flow
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    fn advance(&mut self, next: Self) -> Result<()> {
        if !self.can_advance_to(next) {
            return Err(Error::Internal(format!(
                "Illegal OAuth flow transition {self:?} -> {next:?}"
            )));
        }
        debug!(from = ?*self, to = ?next, "OAuth flow transition");
        *self = next;
        Ok(())
    }
}

/// Authorization request URL, fixed once built
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    url: Url,
}

impl AuthorizationRequest {
    /// Build the request for one flow
    pub fn new(
        endpoints: &OAuthEndpoints,
        client_id: &str,
        redirect: &RedirectTarget,
        pkce: &PkceMaterial,
    ) -> Result<Self> {
        let mut url = Url::parse(&endpoints.authorization_url)
            .map_err(|e| Error::Config(format!("Invalid authorization endpoint: {e}")))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect.uri())
            .append_pair("scope", &endpoints.scope)
            .append_pair("state", pkce.state())
            .append_pair("code_challenge", pkce.code_challenge())
            .append_pair("code_challenge_method", pkce.code_challenge_method());

        Ok(Self { url })
    }

    /// The URL to open in a browser
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Token endpoint response
#[derive(Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// Bearer token for the Reflect API
    pub access_token: String,
    /// Usually "Bearer"
    pub token_type: Option<String>,
    /// Granted scopes
    pub scope: Option<String>,
    /// Lifetime in seconds
    pub expires_in: Option<u64>,
    /// Refresh token (handed back, never used)
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Parse a 2xx token endpoint body.
///
/// Only a non-JSON body or a missing or empty `access_token` is fatal. The
/// other fields are informational and are dropped when they have an
/// unexpected shape.
pub fn parse_token_response(raw: &str) -> Result<TokenResponse> {
    let body: Value = serde_json::from_str(raw)
        .map_err(|e| Error::MalformedTokenResponse(format!("body is not valid JSON: {e}")))?;

    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            Error::MalformedTokenResponse("Token response missing access_token.".to_string())
        })?
        .to_string();

    Ok(TokenResponse {
        access_token,
        token_type: string_field(&body, "token_type"),
        scope: scope_field(&body),
        expires_in: body.get("expires_in").and_then(lifetime_seconds),
        refresh_token: string_field(&body, "refresh_token"),
    })
}

fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

/// RFC 6749 says space-separated, some servers send a list
fn scope_field(body: &Value) -> Option<String> {
    match body.get("scope")? {
        Value::String(scope) => Some(scope.clone()),
        Value::Array(items) => {
            let scopes: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            Some(scopes.join(" "))
        }
        _ => None,
    }
}

/// Accepts `3600`, `3600.0` and `"3600"`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lifetime_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A started flow: material generated, URL built, listener bound
pub struct PendingAuthorization {
    request: AuthorizationRequest,
    pkce: PkceMaterial,
    server: CallbackServer,
}

impl PendingAuthorization {
    /// URL the user must open
    #[must_use]
    pub fn authorization_url(&self) -> &Url {
        self.request.url()
    }

    /// Address the callback listener is bound to
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Block until the redirect arrives; the listener is gone when this returns
    pub async fn wait_for_code(self) -> Result<(CallbackResult, PkceMaterial)> {
        let Self { pkce, server, .. } = self;
        let callback = server.wait().await?;
        Ok((callback, pkce))
    }
}

/// The OAuth PKCE login helper
pub struct AuthFlow {
    http: Client,
    client_id: String,
    client_secret: Option<String>,
    redirect: RedirectTarget,
    endpoints: OAuthEndpoints,
}

impl AuthFlow {
    /// Validate configuration. Fails before any socket is opened.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.client_id.is_empty() {
            return Err(Error::Config("REFLECT_CLIENT_ID must not be empty".to_string()));
        }
        let redirect = validate_redirect_uri(&config.redirect_uri)?;

        let http = Client::builder()
            .user_agent(concat!("reflect-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect,
            endpoints: OAuthEndpoints::default(),
        })
    }

    /// Override the endpoints (tests, staging deployments)
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// The validated redirect target
    #[must_use]
    pub fn redirect(&self) -> &RedirectTarget {
        &self.redirect
    }

    /// Generate material, build the authorization URL and bind the listener
    pub async fn start(&self) -> Result<PendingAuthorization> {
        let pkce = pkce::generate();
        let request =
            AuthorizationRequest::new(&self.endpoints, &self.client_id, &self.redirect, &pkce)?;
        let server = CallbackServer::bind(&self.redirect, pkce.state().to_string()).await?;

        Ok(PendingAuthorization {
            request,
            pkce,
            server,
        })
    }

    /// Exchange the authorization code for a token
    pub async fn exchange_code(
        &self,
        callback: &CallbackResult,
        pkce: &PkceMaterial,
    ) -> Result<TokenResponse> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        form.push(("code", callback.code.as_str()));
        form.push(("redirect_uri", self.redirect.uri()));
        form.push(("code_verifier", pkce.code_verifier()));

        debug!(endpoint = %self.endpoints.token_url, "Exchanging authorization code");

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            let body = if raw.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                raw
            };
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        parse_token_response(&raw)
    }

    /// Run the whole flow, prompting on stderr
    pub async fn run(&self) -> Result<TokenResponse> {
        let mut phase = FlowPhase::Idle;
        self.run_with(&mut phase, |url| {
            eprintln!("Open this URL to authorize Reflect:\n");
            eprintln!("{url}\n");
            eprintln!("Listening for OAuth callback on {}", self.redirect.uri());
        })
        .await
    }

    /// Run the whole flow, tracking progress in `phase`.
    ///
    /// `on_listening` gets the authorization URL once the listener is bound.
    /// `phase` ends as `Complete` or `Failed`.
    pub async fn run_with<F>(
        &self,
        phase: &mut FlowPhase,
        on_listening: F,
    ) -> Result<TokenResponse>
    where
        F: FnOnce(&Url),
    {
        match self.drive(phase, on_listening).await {
            Ok(token) => {
                phase.advance(FlowPhase::Complete)?;
                info!("OAuth flow complete");
                Ok(token)
            }
            Err(e) => {
                warn!(phase = ?*phase, error = %e, "OAuth flow failed");
                // `Failed` is reachable from every non-terminal phase
                let _ = phase.advance(FlowPhase::Failed);
                Err(e)
            }
        }
    }

    async fn drive<F>(&self, phase: &mut FlowPhase, on_listening: F) -> Result<TokenResponse>
    where
        F: FnOnce(&Url),
    {
        let pending = self.start().await?;
        phase.advance(FlowPhase::AwaitingAuthorization)?;
        on_listening(pending.authorization_url());

        let (callback, pkce) = pending.wait_for_code().await?;
        phase.advance(FlowPhase::CodeReceived)?;

        phase.advance(FlowPhase::Exchanging)?;
        self.exchange_code(&callback, &pkce).await
    }
}
