//! SAP OData MCP Server
//!
//! Entry point for the MCP server binary.
//! Implements MCP protocol over stdio using JSON-RPC 2.0.

use sap_odata_mcp::config::Config;
use sap_odata_mcp::mcp::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, SapMcpServer, ServerCapabilities, ServerInfo, ToolsCapability,
};
use sap_odata_mcp::odata::ODataClient;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging to stderr (MCP uses stdout for protocol)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    tracing::info!("Starting SAP OData MCP Server...");

    // Load configuration; a missing SAP URL is not fatal, the server keeps
    // serving protocol methods and the echo tool.
    let config = Config::load_default()?;
    let runtime_config = config.to_runtime();

    let client = match &runtime_config.url {
        Some(url) => {
            let auth_info = if runtime_config.username.is_some() {
                "with auth"
            } else {
                "without auth"
            };
            tracing::info!("SAP client configured {} for {}", auth_info, url);
            Some(Arc::new(ODataClient::new(
                url,
                runtime_config.username.clone(),
                runtime_config.password.clone(),
                runtime_config.candidate_services.clone(),
            )))
        }
        None => {
            tracing::warn!(
                "SAP_URL not configured; SAP tools will report a configuration error"
            );
            None
        }
    };

    let server = SapMcpServer::new(client);

    tracing::info!("MCP Server ready, listening on stdio...");

    run_stdio_loop(server).await
}

async fn run_stdio_loop(server: SapMcpServer) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        tracing::debug!("Received: {}", line);

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let error_response =
                    JsonRpcResponse::error(None, -32700, &format!("Parse error: {}", e));
                send_response(&mut stdout, &error_response)?;
                continue;
            }
        };

        let response = handle_request(&server, request).await;
        send_response(&mut stdout, &response)?;
    }

    Ok(())
}

async fn handle_request(server: &SapMcpServer, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();

    match request.method.as_str() {
        "initialize" => {
            let result = InitializeResult {
                protocol_version: "2024-11-05".to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: Some(false),
                    }),
                },
                server_info: ServerInfo {
                    name: "sap-odata-mcp".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            };
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap())
        }

        "initialized" => {
            // Notification, no response needed but we'll acknowledge
            JsonRpcResponse::success(id, serde_json::json!({}))
        }

        "tools/list" => {
            let tools = server.get_tools();
            let result = ListToolsResult { tools };
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap())
        }

        "tools/call" => {
            let params: CallToolParams = match request.params {
                Some(p) => match serde_json::from_value(p) {
                    Ok(params) => params,
                    Err(e) => {
                        return JsonRpcResponse::error(id, -32602, &format!("Invalid params: {}", e));
                    }
                },
                None => {
                    return JsonRpcResponse::error(id, -32602, "Missing params");
                }
            };

            if params.name != "echo" && !server.is_configured() {
                return JsonRpcResponse::error(
                    id,
                    -1,
                    "SAP not configured. Set SAP_URL or create sap-odata-mcp.toml.",
                );
            }

            let args = params.arguments.unwrap_or_default();
            let result: CallToolResult = server.call_tool(&params.name, &args).await;
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap())
        }

        "ping" => JsonRpcResponse::success(id, serde_json::json!({})),

        _ => JsonRpcResponse::error(id, -32601, &format!("Method not found: {}", request.method)),
    }
}

fn send_response(stdout: &mut io::Stdout, response: &JsonRpcResponse) -> io::Result<()> {
    let json = serde_json::to_string(response)?;
    tracing::debug!("Sending: {}", json);
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}
