//! MCP protocol types (version 2025-11-25)

mod messages;
mod types;

pub use messages::*;
pub use types::*;

/// MCP protocol version spoken by default
pub const PROTOCOL_VERSION: &str = "2025-11-25";

/// Versions the server will echo back when a client asks for them, newest first
pub const SUPPORTED_VERSIONS: &[&str] = &[
    PROTOCOL_VERSION,
    "2025-06-18",
    "2025-03-26",
    "2024-11-05",
];

/// Pick the version to answer `initialize` with.
///
/// A supported client version is echoed; anything else gets [`PROTOCOL_VERSION`].
#[must_use]
pub fn negotiate_version(client_version: &str) -> &'static str {
    SUPPORTED_VERSIONS
        .iter()
        .copied()
        .find(|v| *v == client_version)
        .unwrap_or(PROTOCOL_VERSION)
}
