//! OAuth 2.0 login helper for Reflect
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for
//! command-line use:
//! - `S256` challenge generation
//! - Authorization URL construction (printed, never opened automatically)
//! - One-shot loopback callback server
//! - Code-for-token exchange
//!
//! The resulting token is handed back to the caller and never stored.

mod callback;
mod flow;
pub mod pkce;

pub use callback::{
    CallbackDecision, CallbackResult, CallbackServer, LOOPBACK_HOSTS, RedirectTarget, classify,
    validate_redirect_uri,
};
pub use flow::{
    AUTHORIZATION_ENDPOINT, AuthFlow, AuthorizationRequest, DEFAULT_SCOPE, FlowPhase,
    OAuthEndpoints, PendingAuthorization, TOKEN_ENDPOINT, TokenResponse, parse_token_response,
};
pub use pkce::PkceMaterial;
