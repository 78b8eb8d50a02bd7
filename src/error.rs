//! Error types for the Reflect MCP connector

use std::io;

use thiserror::Error;

/// Result type alias for the connector
pub type Result<T> = std::result::Result<T, Error>;

/// Connector errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (raised before any network or listener activity)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Loopback callback listener failed to bind or serve
    #[error("Callback listener error: {0}")]
    Listener(String),

    /// Callback request was rejected (state mismatch, missing code/state, provider error)
    #[error("Invalid OAuth callback: {0}")]
    InvalidCallback(String),

    /// Token endpoint answered with a non-success status
    #[error("Token exchange failed ({status}): {body}")]
    TokenExchange {
        /// HTTP status code
        status: u16,
        /// Response body (or canonical reason when empty)
        body: String,
    },

    /// Token endpoint answered 2xx but the body is unusable
    #[error("Malformed token response: {0}")]
    MalformedTokenResponse(String),

    /// Reflect API error
    #[error("Reflect API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
        /// Response body or description
        message: String,
    },

    /// No graph id given and the user has none
    #[error("No graph ids found for current user.")]
    NoGraph,

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
        /// Optional data
        data: Option<serde_json::Value>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::Config(_) => rpc_codes::INVALID_PARAMS,
            Self::Api { .. } | Self::Http(_) | Self::NoGraph => rpc_codes::SERVER_ERROR_START,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }

    /// Message suitable for showing to a human (tool results, CLI output).
    ///
    /// API errors carry the request URL so the operator can tell which call failed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { url, .. } => format!("{self} ({url})"),
            Self::JsonRpc { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server error range start
    pub const SERVER_ERROR_START: i32 = -32000;
}
