//! OAuth Callback Server
//!
//! A one-shot loopback HTTP server that captures the authorization code from
//! the browser redirect. Requests on other paths are answered with 404 and the
//! server keeps listening; the first request on the redirect path settles the
//! flow either way.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::{Error, Result};

/// Hosts the login helper is willing to listen on
pub const LOOPBACK_HOSTS: [&str; 2] = ["127.0.0.1", "localhost"];

/// A validated loopback redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    uri: String,
    host: String,
    port: u16,
    path: String,
}

impl RedirectTarget {
    /// The redirect URI exactly as configured (sent verbatim to both endpoints)
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Loopback host to bind
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port to bind
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path the authorization server redirects to
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Validate a redirect URI: `http://`, explicit port, loopback host.
///
/// Runs before any socket is opened.
pub fn validate_redirect_uri(raw: &str) -> Result<RedirectTarget> {
    let url = Url::parse(raw).map_err(|e| {
        Error::Config(format!("REFLECT_OAUTH_REDIRECT_URI is not a valid URL: {e}"))
    })?;

    if url.scheme() != "http" {
        return Err(Error::Config(
            "REFLECT_OAUTH_REDIRECT_URI must be an http:// localhost URL.".to_string(),
        ));
    }

    // `Url::port` is None both when absent and when equal to the scheme default
    let Some(port) = url.port() else {
        return Err(Error::Config(
            "REFLECT_OAUTH_REDIRECT_URI must include an explicit port (e.g. 8787).".to_string(),
        ));
    };

    let host = url.host_str().unwrap_or_default();
    if !LOOPBACK_HOSTS.contains(&host) {
        return Err(Error::Config(format!(
            "OAuth redirect host must be localhost/127.0.0.1 for the helper to work (got {host})."
        )));
    }

    Ok(RedirectTarget {
        uri: raw.to_string(),
        host: host.to_string(),
        port,
        path: url.path().to_string(),
    })
}

/// OAuth callback result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    /// Authorization code
    pub code: String,

    /// State parameter (already compared against the expected value)
    pub state: String,
}

/// What to do with one incoming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackDecision {
    /// Wrong path: answer 404 and keep listening
    NotFound,
    /// Right path, unusable parameters: answer 400 and fail the flow
    Rejected(String),
    /// Right path, matching state: answer 200 and resolve the flow
    Accepted(CallbackResult),
}

impl CallbackDecision {
    /// Whether this decision ends the wait
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Decide how to answer a request for `path?query`.
#[must_use]
pub fn classify(
    path: &str,
    query: Option<&str>,
    expected_path: &str,
    expected_state: &str,
) -> CallbackDecision {
    if path != expected_path {
        return CallbackDecision::NotFound;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let slot = match &*key {
            "code" => &mut code,
            "state" => &mut state,
            "error" => &mut error,
            "error_description" => &mut error_description,
            _ => continue,
        };
        // First occurrence wins
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    if let Some(error) = error {
        let description = error_description.unwrap_or_else(|| "Unknown error".to_string());
        return CallbackDecision::Rejected(format!(
            "Authorization server returned error: {error} - {description}"
        ));
    }

    let (Some(code), Some(state)) = (
        code.filter(|c| !c.is_empty()),
        state.filter(|s| !s.is_empty()),
    ) else {
        return CallbackDecision::Rejected("Missing code/state".to_string());
    };

    if state != expected_state {
        return CallbackDecision::Rejected("Invalid state".to_string());
    }

    CallbackDecision::Accepted(CallbackResult { code, state })
}

/// Shared between the request handler and the waiting flow
enum Slot {
    Waiting {
        expected_path: String,
        expected_state: String,
        tx: oneshot::Sender<Result<CallbackResult>>,
    },
    Settled,
}

impl Slot {
    fn settle(&mut self, outcome: Result<CallbackResult>) {
        if let Self::Waiting { tx, .. } = std::mem::replace(self, Self::Settled) {
            let _ = tx.send(outcome);
        }
    }
}

/// How long a settled server may take to finish writing its last response
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A bound callback listener.
///
/// Owns the serving task. `wait` shuts it down gracefully so the final page
/// reaches the browser; dropping the guard aborts whatever is left and
/// releases the port.
pub struct CallbackServer {
    local_addr: SocketAddr,
    rx: oneshot::Receiver<Result<CallbackResult>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl CallbackServer {
    /// Bind the redirect target's host and port and start serving
    pub async fn bind(target: &RedirectTarget, expected_state: String) -> Result<Self> {
        let listener = TcpListener::bind((target.host(), target.port()))
            .await
            .map_err(|e| {
                Error::Listener(format!(
                    "Failed to bind callback server on {}:{}: {e}",
                    target.host(),
                    target.port()
                ))
            })?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Listener(format!("Failed to get callback server address: {e}")))?;

        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Slot::Waiting {
            expected_path: target.path().to_string(),
            expected_state,
            tx,
        }));

        let app = Router::new().fallback(handle_request).with_state(slot);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|e| Error::Listener(format!("Callback server error: {e}")))
        });

        info!(addr = %local_addr, path = %target.path(), "Listening for OAuth callback");

        Ok(Self {
            local_addr,
            rx,
            shutdown: Some(shutdown),
            task,
        })
    }

    /// Address actually bound
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait, without a deadline, for the first terminal callback.
    ///
    /// The listener is closed when this returns, on every path.
    pub async fn wait(mut self) -> Result<CallbackResult> {
        let outcome = tokio::select! {
            received = &mut self.rx => received.map_err(|_| {
                Error::Listener("Callback channel closed unexpectedly".to_string())
            }),
            served = &mut self.task => {
                return Err(match served {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => {
                        Error::Listener("Callback server stopped unexpectedly".to_string())
                    }
                    Err(e) => Error::Listener(format!("Callback server task failed: {e}")),
                });
            }
        };

        self.shutdown_gracefully().await;
        outcome?
    }

    /// Let in-flight responses finish, then stop serving
    async fn shutdown_gracefully(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task)
            .await
            .is_err()
        {
            debug!(addr = %self.local_addr, "Callback server did not drain in time");
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.task.abort();
        debug!(addr = %self.local_addr, "OAuth callback server closed");
    }
}

/// Single fallback handler: every path is classified here
async fn handle_request(State(slot): State<Arc<Mutex<Slot>>>, uri: Uri) -> Response {
    let mut slot = slot.lock().await;

    let decision = match &*slot {
        Slot::Waiting {
            expected_path,
            expected_state,
            ..
        } => classify(uri.path(), uri.query(), expected_path, expected_state),
        Slot::Settled => {
            return (StatusCode::GONE, "Authorization already handled").into_response();
        }
    };

    match decision {
        CallbackDecision::NotFound => {
            debug!(path = %uri.path(), "Ignoring request on unexpected path");
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
        CallbackDecision::Rejected(reason) => {
            warn!(%reason, "Rejected OAuth callback");
            slot.settle(Err(Error::InvalidCallback(reason.clone())));
            (StatusCode::BAD_REQUEST, Html(error_page(&reason))).into_response()
        }
        CallbackDecision::Accepted(result) => {
            debug!("Received authorization code");
            slot.settle(Ok(result));
            (StatusCode::OK, Html(success_page())).into_response()
        }
    }
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head>
    <title>Authorization Successful</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
        }
        .container { text-align: center; padding: 2rem; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Reflect authorization complete</h1>
        <p>You can close this tab and return to the terminal.</p>
    </div>
</body>
</html>"#
        .to_string()
}

fn error_page(reason: &str) -> String {
    let reason = escape_html(reason);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Authorization Failed</title>
</head>
<body>
    <h1>Authorization Failed</h1>
    <p>{reason}</p>
    <p>Restart the login from the terminal.</p>
</body>
</html>"#
    )
}

/// Provider error descriptions are attacker-controlled query input
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
