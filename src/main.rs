//! Reflect MCP connector
//!
//! `reflect-mcp` serves the Reflect tools over stdio; `reflect-mcp auth login`
//! obtains an access token through the browser.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use reflect_mcp::{
    Result,
    cli::{AuthCommand, Cli, Command, LogFormat},
    config::{AuthConfig, ServerConfig},
    oauth::{AuthFlow, TokenResponse},
    server::McpServer,
    setup_tracing, transport,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.map(LogFormat::as_str)) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Auth(AuthCommand::Login)) => run_auth_login().await,
        Some(Command::Serve) | None => run_server().await,
    }
}

/// Run the stdio MCP server until stdin closes
async fn run_server() -> ExitCode {
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        api_base_url = %config.api_base_url,
        default_graph = config.default_graph_id.is_some(),
        "Starting Reflect MCP server"
    );

    let server = match McpServer::new(&config) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create server: {e}");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = transport::serve_stdio(&server).await {
        error!("Server error: {e}");
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}

/// Run the OAuth login and print the token for the MCP client config
async fn run_auth_login() -> ExitCode {
    match login().await {
        Ok(token) => {
            eprintln!("\nOAuth complete.\n");
            eprintln!("Set this environment variable in your MCP client:");
            eprintln!("REFLECT_ACCESS_TOKEN=\"{}\"", token.access_token);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn login() -> Result<TokenResponse> {
    let config = AuthConfig::load()?;
    AuthFlow::new(&config)?.run().await
}
