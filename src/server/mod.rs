//! MCP tool server backed by the Reflect API
//!
//! Transport-agnostic: [`McpServer::handle_line`] takes one JSON-RPC message
//! and returns the response to write back, if any.

mod tools;

pub use tools::{ReflectTool, tool_definitions};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::rpc_codes::{INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
use crate::protocol::{
    Info, InitializeResult, JSONRPC_VERSION, JsonRpcResponse, RequestId, ServerCapabilities,
    ToolsCallResult, ToolsCapability, ToolsListResult, negotiate_version,
};
use crate::reflect::ReflectClient;
use crate::{Error, Result};

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "reflect-mcp-connector";

/// Reflect MCP server
#[derive(Debug, Clone)]
pub struct McpServer {
    client: ReflectClient,
    default_graph_id: Option<String>,
}

impl McpServer {
    /// Build a server from validated configuration
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = ReflectClient::new(config.access_token.clone(), &config.api_base_url)?;
        Ok(Self::with_client(client, config.default_graph_id.clone()))
    }

    /// Build a server around an existing client
    #[must_use]
    pub fn with_client(client: ReflectClient, default_graph_id: Option<String>) -> Self {
        Self {
            client,
            default_graph_id,
        }
    }

    /// Handle one raw message. `None` means nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(&value).await,
            Err(e) => {
                warn!(error = %e, "Unparseable JSON-RPC message");
                Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ))
            }
        }
    }

    /// Handle one parsed message
    pub async fn handle_value(&self, value: &Value) -> Option<JsonRpcResponse> {
        let (id, method, params) = match parse_request(value) {
            Ok(parsed) => parsed,
            Err(response) => return Some(response),
        };

        if is_notification_method(&method) {
            debug!(method = %method, "Notification received");
            return None;
        }
        // parse_request guarantees an id for anything that is not a notification
        let id = id?;

        debug!(id = %id, method = %method, "Request received");
        let response = match method.as_str() {
            "initialize" => Self::handle_initialize(id, params.as_ref()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => Self::handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, params.as_ref()).await,
            _ => JsonRpcResponse::error(
                Some(id),
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        };
        Some(response)
    }

    /// `initialize` with version negotiation
    #[must_use]
    pub fn handle_initialize(id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let client_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let negotiated = negotiate_version(client_version);
        info!(
            client = client_version,
            negotiated = negotiated,
            "Protocol version negotiation"
        );

        let result = InitializeResult {
            protocol_version: negotiated.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: Info {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Reflect".to_string()),
            },
            instructions: None,
        };
        to_response(id, &result)
    }

    /// `tools/list`
    #[must_use]
    pub fn handle_tools_list(id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: tool_definitions(),
            next_cursor: None,
        };
        to_response(id, &result)
    }

    /// `tools/call`. Unknown tools are a protocol error; tool failures are
    /// reported in-band with `isError`.
    pub async fn handle_tools_call(
        &self,
        id: RequestId,
        params: Option<&Value>,
    ) -> JsonRpcResponse {
        let tool_name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(tool) = ReflectTool::from_name(tool_name) else {
            return JsonRpcResponse::error(
                Some(id),
                INVALID_PARAMS,
                format!("Unknown tool: {tool_name}"),
            );
        };

        let outcome = match tools::arguments_object(params.and_then(|p| p.get("arguments"))) {
            Ok(arguments) => self.call_tool(tool, &arguments).await,
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(value) => {
                debug!(tool = tool.name(), "Tool call succeeded");
                ToolsCallResult::text(pretty_json(&value))
            }
            Err(e) => {
                warn!(tool = tool.name(), error = %e, "Tool call failed");
                ToolsCallResult::error(e.user_message())
            }
        };
        to_response(id, &result)
    }

    /// Run a tool and return the API's JSON as received
    pub async fn call_tool(&self, tool: ReflectTool, args: &Value) -> Result<Value> {
        match tool {
            ReflectTool::GetMe => self.client.get_me().await,
            ReflectTool::ListGraphs => self.client.list_graphs().await,
            ReflectTool::ListBooks => {
                let graph = self.resolve_graph(args).await?;
                self.client.list_books(&graph).await
            }
            ReflectTool::ListLinks => {
                let graph = self.resolve_graph(args).await?;
                self.client.list_links(&graph).await
            }
            ReflectTool::CreateLink => {
                let link = tools::new_link(args)?;
                let graph = self.resolve_graph(args).await?;
                self.client.create_link(&graph, &link).await
            }
            ReflectTool::AppendDailyNote => {
                let append = tools::daily_note_append(args)?;
                let graph = self.resolve_graph(args).await?;
                self.client.append_daily_note(&graph, &append).await
            }
            ReflectTool::CreateNote => {
                let note = tools::new_note(args)?;
                let graph = self.resolve_graph(args).await?;
                self.client.create_note(&graph, &note).await
            }
        }
    }

    /// Argument, then configured default, then the user's first graph
    async fn resolve_graph(&self, args: &Value) -> Result<String> {
        let explicit = tools::optional_str(args, "graphId")?.or(self.default_graph_id.as_deref());
        self.client.resolve_default_graph_id(explicit).await
    }
}

fn to_response<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            Some(id),
            Error::from(e).to_rpc_code(),
            "Serialization failed",
        ),
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Extract a `RequestId` from a JSON value (string or integer).
fn extract_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

/// Methods under `notifications/` never get a response.
fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// Parse a JSON-RPC request or notification into `(id, method, params)`.
#[allow(clippy::result_large_err)]
fn parse_request(
    value: &Value,
) -> std::result::Result<(Option<RequestId>, String, Option<Value>), JsonRpcResponse> {
    let id = value.get("id").and_then(extract_request_id);

    if value.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(JsonRpcResponse::error(
            id,
            INVALID_REQUEST,
            "Invalid JSON-RPC version",
        ));
    }

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcResponse::error(id.clone(), INVALID_REQUEST, "Missing method"))?;

    if !is_notification_method(method) && id.is_none() {
        return Err(JsonRpcResponse::error(None, INVALID_REQUEST, "Missing id"));
    }

    Ok((id, method.to_string(), value.get("params").cloned()))
}
