//! Transports carrying MCP messages to the server

mod stdio;

pub use self::stdio::{serve, serve_stdio};
