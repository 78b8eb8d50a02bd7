//! Reflect MCP connector
//!
//! Exposes a Reflect notes account to MCP clients as a set of tools over
//! stdio, plus a command-line OAuth (PKCE) helper that obtains the access
//! token the server needs.
//!
//! # Modules
//!
//! - [`server`]: JSON-RPC dispatch and the `reflect_*` tools
//! - [`transport`]: newline-delimited stdio transport
//! - [`reflect`]: REST client for the Reflect API
//! - [`oauth`]: authorization-code + PKCE login with a loopback callback
//! - [`config`]: environment-driven configuration

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod oauth;
pub mod protocol;
pub mod reflect;
pub mod server;
pub mod transport;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// MCP protocol version spoken by the server
pub const MCP_PROTOCOL_VERSION: &str = protocol::PROTOCOL_VERSION;

/// Setup tracing/logging.
///
/// Always writes to stderr: stdout carries the JSON-RPC stream.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
