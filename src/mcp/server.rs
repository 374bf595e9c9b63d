//! MCP Server implementation for SAP OData
//!
//! Exposes tools for discovering, querying, and mutating data across the
//! OData services hosted by an SAP system.

use crate::mcp::protocol::*;
use crate::odata::{
    BatchOperation, ODataClient, ODataError, QueryOptions, QueryOutcome, ServiceInfo,
    UpdateMethod,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// MCP Server for SAP OData
pub struct SapMcpServer {
    client: Option<Arc<ODataClient>>,
}

impl SapMcpServer {
    /// Create a new MCP server instance.
    ///
    /// `client` is `None` when no SAP URL is configured; only `echo` works
    /// in that state.
    pub fn new(client: Option<Arc<ODataClient>>) -> Self {
        Self { client }
    }

    /// Whether a backend connection is configured
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Get list of available tools
    pub fn get_tools(&self) -> Vec<Tool> {
        Self::get_tools_static()
    }

    /// Get list of available tools (static version for unconfigured server)
    pub fn get_tools_static() -> Vec<Tool> {
        vec![
            Tool {
                name: "echo".to_string(),
                description: "Echo back the input message".to_string(),
                input_schema: create_tool_schema(&[SchemaParam::new(
                    "message",
                    "string",
                    "Message to echo back",
                    true,
                )]),
            },
            Tool {
                name: "sap_query".to_string(),
                description: "Flexible SAP OData query with full OData capabilities".to_string(),
                input_schema: create_tool_schema(&[
                    SchemaParam::new("entity_set", "string", "OData entity set to query", true),
                    SchemaParam::new("filter", "string", "OData $filter parameter", false),
                    SchemaParam::new("select", "string", "OData $select parameter", false),
                    SchemaParam::new("expand", "string", "OData $expand parameter", false),
                    SchemaParam::new("orderby", "string", "OData $orderby parameter", false),
                    SchemaParam::new("top", "integer", "OData $top parameter", false),
                    SchemaParam::new("skip", "integer", "OData $skip parameter", false),
                    SchemaParam::new("count", "boolean", "Include $count=true", false),
                    SchemaParam::new("format", "string", "Response format (json/xml)", false),
                ]),
            },
            Tool {
                name: "sap_create".to_string(),
                description: "Create new entity in SAP system".to_string(),
                input_schema: create_tool_schema(&[
                    SchemaParam::new("entity_set", "string", "Entity set to create in", true),
                    SchemaParam::new("data", "object", "Entity data as JSON object", true),
                ]),
            },
            Tool {
                name: "sap_update".to_string(),
                description: "Update existing entity in SAP system".to_string(),
                input_schema: create_tool_schema(&[
                    SchemaParam::new("entity_key", "string", "Entity key/path to update", true),
                    SchemaParam::new("data", "object", "Updated entity data as JSON object", true),
                    SchemaParam::new(
                        "method",
                        "string",
                        "Update method (PUT=replace, PATCH=merge)",
                        false,
                    ),
                ]),
            },
            Tool {
                name: "sap_delete".to_string(),
                description: "Delete entity from SAP system".to_string(),
                input_schema: create_tool_schema(&[SchemaParam::new(
                    "entity_key",
                    "string",
                    "Entity key/path to delete",
                    true,
                )]),
            },
            Tool {
                name: "sap_function".to_string(),
                description: "Call SAP function import".to_string(),
                input_schema: create_tool_schema(&[
                    SchemaParam::new("function_name", "string", "Function import name", true),
                    SchemaParam::new(
                        "parameters",
                        "object",
                        "Function parameters as JSON object",
                        false,
                    ),
                ]),
            },
            Tool {
                name: "sap_batch".to_string(),
                description: "Execute multiple OData operations sequentially".to_string(),
                input_schema: create_tool_schema(&[SchemaParam::new(
                    "operations",
                    "array",
                    "Array of {method, url, data} operations to execute",
                    true,
                )]),
            },
            Tool {
                name: "sap_discover".to_string(),
                description: "Discover and analyze SAP service structure".to_string(),
                input_schema: create_tool_schema(&[
                    SchemaParam::new(
                        "entity_set",
                        "string",
                        "Specific entity set to analyze (optional)",
                        false,
                    ),
                    SchemaParam::new(
                        "deep_analysis",
                        "boolean",
                        "Perform deep structure analysis",
                        false,
                    ),
                ]),
            },
            Tool {
                name: "sap_metadata".to_string(),
                description: "Get comprehensive SAP service metadata".to_string(),
                input_schema: create_tool_schema(&[SchemaParam::new(
                    "format",
                    "string",
                    "Metadata detail level (summary or detailed)",
                    false,
                )]),
            },
            Tool {
                name: "sap_test_connection".to_string(),
                description: "Test SAP connection and show configuration status".to_string(),
                input_schema: create_tool_schema(&[]),
            },
            Tool {
                name: "sap_raw_request".to_string(),
                description: "Make raw HTTP request to SAP system for maximum flexibility"
                    .to_string(),
                input_schema: create_tool_schema(&[
                    SchemaParam::new("endpoint", "string", "API endpoint path", true),
                    SchemaParam::new(
                        "method",
                        "string",
                        "HTTP method (GET, POST, PUT, PATCH, DELETE)",
                        false,
                    ),
                    SchemaParam::new("parameters", "object", "Query parameters", false),
                    SchemaParam::new("data", "object", "Request body data", false),
                ]),
            },
            Tool {
                name: "sap_discover_services".to_string(),
                description: "Discover all available SAP OData services on the system".to_string(),
                input_schema: create_tool_schema(&[SchemaParam::new(
                    "pattern",
                    "string",
                    "Filter services by pattern (optional)",
                    false,
                )]),
            },
            Tool {
                name: "sap_switch_service".to_string(),
                description: "Switch to a different OData service".to_string(),
                input_schema: create_tool_schema(&[SchemaParam::new(
                    "service_name",
                    "string",
                    "Name of the service to switch to",
                    true,
                )]),
            },
            Tool {
                name: "sap_smart_query".to_string(),
                description:
                    "Intelligently query entities across all services (auto-discovers the owning service)"
                        .to_string(),
                input_schema: create_tool_schema(&[
                    SchemaParam::new("entity_set", "string", "OData entity set to query", true),
                    SchemaParam::new("filter", "string", "OData $filter parameter", false),
                    SchemaParam::new("select", "string", "OData $select parameter", false),
                    SchemaParam::new("top", "integer", "OData $top parameter", false),
                ]),
            },
            Tool {
                name: "sap_service_info".to_string(),
                description: "Get information about current service and available services"
                    .to_string(),
                input_schema: create_tool_schema(&[]),
            },
        ]
    }

    /// Handle a tool call
    pub async fn call_tool(&self, name: &str, args: &HashMap<String, Value>) -> CallToolResult {
        if name == "echo" {
            return self.echo(args);
        }

        let client = match &self.client {
            Some(client) => client.clone(),
            None => {
                return CallToolResult::error(
                    "SAP not configured. Set SAP_URL (and optionally SAP_USERNAME, SAP_PASSWORD)."
                        .to_string(),
                )
            }
        };

        match name {
            "sap_query" => self.sap_query(&client, args).await,
            "sap_create" => self.sap_create(&client, args).await,
            "sap_update" => self.sap_update(&client, args).await,
            "sap_delete" => self.sap_delete(&client, args).await,
            "sap_function" => self.sap_function(&client, args).await,
            "sap_batch" => self.sap_batch(&client, args).await,
            "sap_discover" => self.sap_discover(&client, args).await,
            "sap_metadata" => self.sap_metadata(&client, args).await,
            "sap_test_connection" => self.sap_test_connection(&client).await,
            "sap_raw_request" => self.sap_raw_request(&client, args).await,
            "sap_discover_services" => self.sap_discover_services(&client, args).await,
            "sap_switch_service" => self.sap_switch_service(&client, args).await,
            "sap_smart_query" => self.sap_smart_query(&client, args).await,
            "sap_service_info" => self.sap_service_info(&client).await,
            _ => CallToolResult::error(format!("Unknown tool: {}", name)),
        }
    }

    fn echo(&self, args: &HashMap<String, Value>) -> CallToolResult {
        match args.get("message").and_then(|v| v.as_str()) {
            Some(message) => CallToolResult::text(format!("Echo: {}", message)),
            None => CallToolResult::error("Missing required parameter: message".to_string()),
        }
    }

    async fn sap_query(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let entity_set = match args.get("entity_set").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => {
                return CallToolResult::error("Missing required parameter: entity_set".to_string())
            }
        };

        let options = parse_query_options(args);

        match client.query(entity_set, &options).await {
            Ok(outcome) => CallToolResult::text(format_query_outcome(&outcome)),
            Err(e) => CallToolResult::error(format!("Error querying {}: {}", entity_set, e)),
        }
    }

    async fn sap_create(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let entity_set = match args.get("entity_set").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => {
                return CallToolResult::error("Missing required parameter: entity_set".to_string())
            }
        };
        let data = match args.get("data") {
            Some(d) => d,
            None => return CallToolResult::error("Missing required parameter: data".to_string()),
        };

        match client.create(entity_set, data).await {
            Ok(result) => CallToolResult::text(format!(
                "Created new entity in {}:\n{}",
                entity_set,
                pretty(&result)
            )),
            Err(e) => CallToolResult::error(format!("Error creating in {}: {}", entity_set, e)),
        }
    }

    async fn sap_update(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let entity_key = match args.get("entity_key").and_then(|v| v.as_str()) {
            Some(k) => k,
            None => {
                return CallToolResult::error("Missing required parameter: entity_key".to_string())
            }
        };
        let data = match args.get("data") {
            Some(d) => d,
            None => return CallToolResult::error("Missing required parameter: data".to_string()),
        };
        let method = args
            .get("method")
            .and_then(|v| v.as_str())
            .map(UpdateMethod::from_arg)
            .unwrap_or_default();

        match client.update(entity_key, data, method).await {
            Ok(result) => CallToolResult::text(format!(
                "Updated entity {} using {}:\n{}",
                entity_key,
                method.as_str(),
                pretty(&result)
            )),
            Err(e) => CallToolResult::error(format!("Error updating {}: {}", entity_key, e)),
        }
    }

    async fn sap_delete(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let entity_key = match args.get("entity_key").and_then(|v| v.as_str()) {
            Some(k) => k,
            None => {
                return CallToolResult::error("Missing required parameter: entity_key".to_string())
            }
        };

        match client.delete(entity_key).await {
            Ok(result) => CallToolResult::text(format!(
                "Deleted entity {}:\n{}",
                entity_key,
                pretty(&result)
            )),
            Err(e) => CallToolResult::error(format!("Error deleting {}: {}", entity_key, e)),
        }
    }

    async fn sap_function(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let function_name = match args.get("function_name").and_then(|v| v.as_str()) {
            Some(f) => f,
            None => {
                return CallToolResult::error(
                    "Missing required parameter: function_name".to_string(),
                )
            }
        };
        let params = args
            .get("parameters")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        match client.call_function(function_name, &params).await {
            Ok(result) => CallToolResult::text(format!(
                "Function {} result:\n{}",
                function_name,
                pretty(&result)
            )),
            Err(e) => CallToolResult::error(format!("Error calling {}: {}", function_name, e)),
        }
    }

    async fn sap_batch(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let operations = match args.get("operations") {
            Some(ops) => ops.clone(),
            None => {
                return CallToolResult::error("Missing required parameter: operations".to_string())
            }
        };

        let operations: Vec<BatchOperation> = match serde_json::from_value(operations) {
            Ok(ops) => ops,
            Err(e) => return CallToolResult::error(format!("Invalid operations array: {}", e)),
        };

        let outcomes = client.batch(&operations).await;
        let json = serde_json::to_string_pretty(&outcomes).unwrap_or_else(|_| "[]".to_string());
        CallToolResult::text(format!("Batch operation results:\n{}", json))
    }

    async fn sap_discover(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        if let Some(entity_set) = str_arg(args, "entity_set") {
            return match client.analyze_entity_structure(&entity_set).await {
                Ok(structure) => CallToolResult::text(format!(
                    "Entity analysis for {}:\n{}",
                    entity_set,
                    serde_json::to_string_pretty(&structure).unwrap_or_default()
                )),
                Err(ODataError::NoSampleData(_)) => CallToolResult::text(format!(
                    "No sample data available for '{}'",
                    entity_set
                )),
                Err(e) => {
                    CallToolResult::error(format!("Error analyzing {}: {}", entity_set, e))
                }
            };
        }

        let deep_analysis = bool_arg(args, "deep_analysis");

        let entity_sets = match client.discover_entity_sets(None).await {
            Ok(sets) => sets,
            Err(e) => return CallToolResult::error(format!("Error discovering entities: {}", e)),
        };

        let mut output = format!(
            "SAP service discovery\n\nAvailable entity sets ({}):\n{}",
            entity_sets.len(),
            entity_sets
                .iter()
                .map(|e| format!("- {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        );

        if deep_analysis && !entity_sets.is_empty() {
            // Sample the first few sets only; full analysis costs one
            // request per entity set.
            let mut analyses = serde_json::Map::new();
            for entity in entity_sets.iter().take(3) {
                let analysis = match client.analyze_entity_structure(entity).await {
                    Ok(structure) => serde_json::to_value(structure).unwrap_or(Value::Null),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                analyses.insert(entity.clone(), analysis);
            }
            output.push_str(&format!(
                "\n\nSample entity structures:\n{}",
                serde_json::to_string_pretty(&analyses).unwrap_or_default()
            ));
        } else {
            output.push_str("\n\nUse deep_analysis=true for detailed structure analysis");
        }

        CallToolResult::text(output)
    }

    async fn sap_metadata(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let format = args
            .get("format")
            .and_then(|v| v.as_str())
            .unwrap_or("summary");

        let metadata = match client.get_metadata(false).await {
            Ok(m) => m,
            Err(e) => return CallToolResult::error(format!("Error retrieving metadata: {}", e)),
        };
        let entity_sets = client.discover_entity_sets(None).await.unwrap_or_default();
        let entity_list = entity_sets
            .iter()
            .map(|e| format!("- {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        let output = if format == "detailed" {
            format!(
                "Detailed SAP metadata\n\nService information:\n{}\n\nEntity sets ({}):\n{}",
                pretty(&metadata),
                entity_sets.len(),
                entity_list
            )
        } else {
            format!(
                "SAP service summary\n\nBase URL: {}\nEntity sets: {}\nAvailable operations: query, create, update, delete, functions\n\nEntity sets:\n{}\n\nUse format=\"detailed\" for full metadata",
                client.base_url(),
                entity_sets.len(),
                entity_list
            )
        };

        CallToolResult::text(output)
    }

    async fn sap_test_connection(&self, client: &ODataClient) -> CallToolResult {
        let auth_status = if client.has_credentials() {
            "basic auth configured"
        } else {
            "no credentials"
        };

        match client.get_service_document(None).await {
            Ok(_) => {
                let entity_sets = client.discover_entity_sets(None).await.unwrap_or_default();
                let csrf_available = client.fetch_csrf_token().await.is_some();

                CallToolResult::text(format!(
                    "SAP connection status: SUCCESS\n\n\
                     Configuration:\n\
                     - URL: {}\n\
                     - Auth: {}\n\
                     - CSRF support: {}\n\n\
                     Service capabilities:\n\
                     - Entity sets: {}\n\
                     - Read operations: available\n\
                     - Write operations: {}\n\
                     - Function imports: available\n\
                     - Batch operations: available",
                    client.base_url(),
                    auth_status,
                    if csrf_available { "yes" } else { "no" },
                    entity_sets.len(),
                    if csrf_available {
                        "available"
                    } else {
                        "limited (no CSRF token)"
                    },
                ))
            }
            Err(e) => {
                let diagnosis = diagnose_connection_error(&e);
                CallToolResult::text(format!(
                    "SAP connection status: FAILED\n\n\
                     Configuration:\n\
                     - URL: {}\n\
                     - Auth: {}\n\n\
                     Diagnosis: {}\n\n\
                     Check the configuration and network connectivity.",
                    client.base_url(),
                    auth_status,
                    diagnosis
                ))
            }
        }
    }

    async fn sap_raw_request(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let endpoint = match args.get("endpoint").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => {
                return CallToolResult::error("Missing required parameter: endpoint".to_string())
            }
        };
        let method_name = args
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        let method = match reqwest::Method::from_bytes(method_name.as_bytes()) {
            Ok(m) => m,
            Err(_) => return CallToolResult::error(format!("Invalid method: {}", method_name)),
        };

        let params: Vec<(String, String)> = args
            .get("parameters")
            .and_then(|v| v.as_object())
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), param_string(v)))
                    .collect()
            })
            .unwrap_or_default();

        let body = args.get("data").map(|d| d.to_string());

        match client
            .request(endpoint, Some(&params), method, body, None)
            .await
        {
            Ok(result) => CallToolResult::text(format!(
                "Raw {} request to {}:\n{}",
                method_name,
                endpoint,
                pretty(&result)
            )),
            Err(e) => CallToolResult::error(format!("Request failed: {}", e)),
        }
    }

    async fn sap_discover_services(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let mut services = client.discover_all_services().await;

        if let Some(pattern) = args.get("pattern").and_then(|v| v.as_str()) {
            let needle = pattern.to_lowercase();
            services.retain(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.description.to_lowercase().contains(&needle)
            });
        }

        if services.is_empty() {
            return CallToolResult::text(
                "No SAP OData services found. Check system connectivity and permissions."
                    .to_string(),
            );
        }

        CallToolResult::text(format!(
            "Discovered SAP OData services ({}):\n\n{}\n\n\
             Use sap_switch_service to change to a specific service.\n\
             Use sap_smart_query to automatically find the right service for an entity.",
            services.len(),
            format_service_list(&services)
        ))
    }

    async fn sap_switch_service(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let service_name = match args.get("service_name").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => {
                return CallToolResult::error(
                    "Missing required parameter: service_name".to_string(),
                )
            }
        };

        if client.switch_service(service_name).await {
            CallToolResult::text(format!("Switched to service: {}", service_name))
        } else {
            CallToolResult::error(format!(
                "Failed to switch to service: {}. Service may not exist or be accessible.",
                service_name
            ))
        }
    }

    async fn sap_smart_query(
        &self,
        client: &ODataClient,
        args: &HashMap<String, Value>,
    ) -> CallToolResult {
        let entity_set = match args.get("entity_set").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => {
                return CallToolResult::error("Missing required parameter: entity_set".to_string())
            }
        };

        let options = parse_query_options(args);

        match client.smart_query(entity_set, &options).await {
            Ok((service, outcome)) => CallToolResult::text(format!(
                "Auto-discovered entity '{}' in service '{}':\n\n{}",
                entity_set,
                service,
                format_query_outcome(&outcome)
            )),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn sap_service_info(&self, client: &ODataClient) -> CallToolResult {
        if client.known_services().await.is_empty() {
            client.discover_all_services().await;
        }

        let current = client
            .active_service()
            .await
            .unwrap_or_else(|| "None".to_string());
        let services = client.known_services().await;
        let shown: Vec<&ServiceInfo> = services.iter().take(10).collect();
        let more = if services.len() > 10 {
            format!("\n... and {} more", services.len() - 10)
        } else {
            String::new()
        };

        CallToolResult::text(format!(
            "SAP service information\n\n\
             Configuration:\n\
             - Base URL: {}\n\
             - Current service: {}\n\
             - Available services: {}\n\n\
             Services:\n{}{}\n\n\
             Operations: sap_switch_service, sap_smart_query, sap_discover_services, sap_query",
            client.base_url(),
            current,
            services.len(),
            shown
                .iter()
                .map(|s| format!("- {}: {}", s.name, s.description))
                .collect::<Vec<_>>()
                .join("\n"),
            more
        ))
    }
}

/// Build `QueryOptions` from tool arguments, ignoring absent fields.
fn parse_query_options(args: &HashMap<String, Value>) -> QueryOptions {
    QueryOptions {
        filter: str_arg(args, "filter"),
        select: str_arg(args, "select"),
        expand: str_arg(args, "expand"),
        orderby: str_arg(args, "orderby"),
        top: number_arg(args, "top"),
        skip: number_arg(args, "skip"),
        count: bool_arg(args, "count"),
        format: str_arg(args, "format"),
    }
}

fn str_arg(args: &HashMap<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Parse a number argument from JSON (handles both string and number types).
/// Negative values are treated as absent rather than wrapped.
fn number_arg(args: &HashMap<String, Value>, key: &str) -> Option<usize> {
    args.get(key).and_then(|v| {
        v.as_u64()
            .map(|n| n as usize)
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    })
}

fn bool_arg(args: &HashMap<String, Value>, key: &str) -> bool {
    args.get(key)
        .and_then(|v| v.as_bool().or_else(|| v.as_str().map(|s| s == "true")))
        .unwrap_or(false)
}

/// String form of a query parameter value, without JSON quoting
fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn format_service_list(services: &[ServiceInfo]) -> String {
    services
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a query outcome with record counts and the active query facets.
fn format_query_outcome(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Records {
            entity_set,
            records,
            total_count,
            facets,
        } => {
            let query_info = if facets.is_empty() {
                "Query: All records".to_string()
            } else {
                format!("Query: {}", facets.join(", "))
            };
            let count_info = match total_count {
                Some(total) => format!(" (Total: {})", param_string(total)),
                None => String::new(),
            };
            let data = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());

            format!(
                "SAP query results for {}:\n\n{}\nRecords: {}{}\n\nData:\n{}",
                entity_set,
                query_info,
                records.len(),
                count_info,
                data
            )
        }
        QueryOutcome::Raw {
            entity_set,
            response,
        } => format!("{} response:\n{}", entity_set, pretty(response)),
    }
}

/// Classify a connection failure into an actionable diagnosis.
fn diagnose_connection_error(error: &ODataError) -> String {
    match error {
        ODataError::Timeout => {
            "Connection timeout - check SAP server accessibility".to_string()
        }
        ODataError::Http { status: 401, .. } | ODataError::Http { status: 403, .. } => {
            "Authentication error - check credentials".to_string()
        }
        ODataError::Http { status: 404, .. } => {
            "Service not found - check OData service URL".to_string()
        }
        other => format!("Connection error: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_echo_works_without_client() {
        let server = SapMcpServer::new(None);
        let result = server
            .call_tool("echo", &args(&[("message", json!("hello"))]))
            .await;
        assert_eq!(result.content[0].text, "Echo: hello");
        assert!(result.is_error.is_none());
    }

    #[tokio::test]
    async fn test_sap_tools_fail_without_configuration() {
        let server = SapMcpServer::new(None);
        let result = server.call_tool("sap_query", &HashMap::new()).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result.content[0].text.contains("SAP not configured"));
    }

    #[test]
    fn test_tool_list_complete() {
        let tools = SapMcpServer::get_tools_static();
        assert_eq!(tools.len(), 15);
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"echo"));
        assert!(names.contains(&"sap_smart_query"));
        assert!(names.contains(&"sap_batch"));
        assert!(names.contains(&"sap_service_info"));
    }

    #[test]
    fn test_parse_query_options_ignores_absent_fields() {
        let options = parse_query_options(&args(&[("top", json!(5))]));
        assert_eq!(options.top, Some(5));
        assert!(options.filter.is_none());
        assert!(!options.count);
    }

    #[test]
    fn test_parse_query_options_accepts_string_numbers() {
        let options = parse_query_options(&args(&[("top", json!("25")), ("skip", json!(10))]));
        assert_eq!(options.top, Some(25));
        assert_eq!(options.skip, Some(10));
    }

    #[test]
    fn test_parse_query_options_drops_negative_numbers() {
        let options = parse_query_options(&args(&[("top", json!(-1)), ("skip", json!("-5"))]));
        assert!(options.top.is_none());
        assert!(options.skip.is_none());
        assert!(options.to_params().is_empty());
    }

    #[test]
    fn test_bool_arg_accepts_string_and_bool() {
        assert!(bool_arg(&args(&[("count", json!(true))]), "count"));
        assert!(bool_arg(&args(&[("count", json!("true"))]), "count"));
        assert!(!bool_arg(&args(&[("count", json!("false"))]), "count"));
        assert!(!bool_arg(&HashMap::new(), "count"));
    }

    #[test]
    fn test_format_query_outcome_records() {
        let outcome = QueryOutcome::Records {
            entity_set: "Orders".to_string(),
            records: vec![json!({"Id": "1"})],
            total_count: Some(json!("7")),
            facets: vec!["Top: 1".to_string()],
        };
        let text = format_query_outcome(&outcome);
        assert!(text.contains("SAP query results for Orders"));
        assert!(text.contains("Query: Top: 1"));
        assert!(text.contains("Records: 1 (Total: 7)"));
    }

    #[test]
    fn test_diagnose_connection_error() {
        let auth = ODataError::Http {
            status: 401,
            detail: json!("unauthorized"),
        };
        assert!(diagnose_connection_error(&auth).contains("Authentication"));

        let missing = ODataError::Http {
            status: 404,
            detail: json!("not found"),
        };
        assert!(diagnose_connection_error(&missing).contains("Service not found"));

        assert!(diagnose_connection_error(&ODataError::Timeout).contains("timeout"));
    }
}
