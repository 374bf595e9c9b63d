//! Query and command facade
//!
//! Builds `$`-prefixed OData query parameters from structured options and
//! executes reads, writes, function imports, sequential batches, and
//! service-scoped smart queries on top of the transport.

use crate::odata::client::{ODataClient, ODataError};
use crate::odata::shapes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured OData query options.
///
/// Query fragments (filter expressions, select lists, ...) pass through
/// opaquely; absent options emit no parameter at all.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub select: Option<String>,
    pub expand: Option<String>,
    pub orderby: Option<String>,
    pub top: Option<usize>,
    pub skip: Option<usize>,
    pub count: bool,
    pub format: Option<String>,
}

impl QueryOptions {
    /// Map options to their reserved OData parameter names.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(ref filter) = self.filter {
            params.push(("$filter".to_string(), filter.clone()));
        }
        if let Some(ref select) = self.select {
            params.push(("$select".to_string(), select.clone()));
        }
        if let Some(ref expand) = self.expand {
            params.push(("$expand".to_string(), expand.clone()));
        }
        if let Some(ref orderby) = self.orderby {
            params.push(("$orderby".to_string(), orderby.clone()));
        }
        if let Some(top) = self.top {
            params.push(("$top".to_string(), top.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("$skip".to_string(), skip.to_string()));
        }
        if self.count {
            params.push(("$count".to_string(), "true".to_string()));
        }
        if let Some(ref format) = self.format {
            params.push(("$format".to_string(), format.clone()));
        }

        params
    }

    /// Human-readable summary of the active query facets.
    pub fn facets(&self) -> Vec<String> {
        let mut facets = Vec::new();

        if let Some(ref filter) = self.filter {
            facets.push(format!("Filter: {}", filter));
        }
        if let Some(ref select) = self.select {
            facets.push(format!("Select: {}", select));
        }
        if let Some(ref expand) = self.expand {
            facets.push(format!("Expand: {}", expand));
        }
        if let Some(ref orderby) = self.orderby {
            facets.push(format!("Order: {}", orderby));
        }
        if let Some(top) = self.top {
            facets.push(format!("Top: {}", top));
        }
        if let Some(skip) = self.skip {
            facets.push(format!("Skip: {}", skip));
        }

        facets
    }
}

/// Update semantics for entity modifications
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateMethod {
    /// Partial merge (default)
    #[default]
    Patch,
    /// Full replace
    Put,
}

impl UpdateMethod {
    pub fn from_arg(arg: &str) -> Self {
        if arg.eq_ignore_ascii_case("PUT") {
            UpdateMethod::Put
        } else {
            UpdateMethod::Patch
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMethod::Patch => "PATCH",
            UpdateMethod::Put => "PUT",
        }
    }

    fn as_method(self) -> Method {
        match self {
            UpdateMethod::Patch => Method::PATCH,
            UpdateMethod::Put => Method::PUT,
        }
    }
}

/// Outcome of a query, post-processed from the raw OData envelope
#[derive(Debug)]
pub enum QueryOutcome {
    /// Records extracted from a recognized envelope shape
    Records {
        entity_set: String,
        records: Vec<Value>,
        total_count: Option<Value>,
        facets: Vec<String>,
    },
    /// Unrecognized envelope, passed through untouched
    Raw { entity_set: String, response: Value },
}

impl QueryOutcome {
    fn from_response(entity_set: &str, options: &QueryOptions, response: Value) -> Self {
        match shapes::extract_records(&response) {
            Some(records) => QueryOutcome::Records {
                entity_set: entity_set.to_string(),
                records: records.clone(),
                total_count: shapes::extract_total_count(&response),
                facets: options.facets(),
            },
            None => QueryOutcome::Raw {
                entity_set: entity_set.to_string(),
                response,
            },
        }
    }
}

/// One operation in a sequential batch
#[derive(Debug, Clone, Deserialize)]
pub struct BatchOperation {
    #[serde(default = "default_batch_method")]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_batch_method() -> String {
    "GET".to_string()
}

/// Per-operation batch result, 1-indexed
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub operation: usize,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ODataClient {
    /// Query an entity set with the given options.
    pub async fn query(
        &self,
        entity_set: &str,
        options: &QueryOptions,
    ) -> Result<QueryOutcome, ODataError> {
        let params = options.to_params();
        let response = self
            .request(entity_set, Some(&params), Method::GET, None, None)
            .await?;
        Ok(QueryOutcome::from_response(entity_set, options, response))
    }

    /// Create a new entity in `entity_set`.
    pub async fn create(&self, entity_set: &str, data: &Value) -> Result<Value, ODataError> {
        self.request(entity_set, None, Method::POST, Some(data.to_string()), None)
            .await
    }

    /// Update the entity addressed by `entity_key`.
    pub async fn update(
        &self,
        entity_key: &str,
        data: &Value,
        method: UpdateMethod,
    ) -> Result<Value, ODataError> {
        self.request(
            entity_key,
            None,
            method.as_method(),
            Some(data.to_string()),
            None,
        )
        .await
    }

    /// Delete the entity addressed by `entity_key`.
    pub async fn delete(&self, entity_key: &str) -> Result<Value, ODataError> {
        self.request(entity_key, None, Method::DELETE, None, None)
            .await
    }

    /// Call a function import, joining parameters as `Name(k='v',...)`.
    pub async fn call_function(&self, name: &str, params: &Value) -> Result<Value, ODataError> {
        let endpoint = build_function_call(name, params);
        self.request(&endpoint, None, Method::POST, None, None).await
    }

    /// Execute operations sequentially, isolating failures per operation.
    ///
    /// Not atomic: there is no rollback, and one failing operation never
    /// aborts the rest.
    pub async fn batch(&self, operations: &[BatchOperation]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(operations.len());

        for (index, op) in operations.iter().enumerate() {
            let method =
                Method::from_bytes(op.method.to_uppercase().as_bytes()).unwrap_or(Method::GET);
            let body = op.data.as_ref().map(|d| d.to_string());

            match self.request(&op.url, None, method, body, None).await {
                Ok(result) => outcomes.push(BatchOutcome {
                    operation: index + 1,
                    status: "success",
                    result: Some(result),
                    error: None,
                }),
                Err(e) => outcomes.push(BatchOutcome {
                    operation: index + 1,
                    status: "error",
                    result: None,
                    error: Some(e.to_string()),
                }),
            }
        }

        outcomes
    }

    /// Query an entity set wherever it lives: resolve the owning service,
    /// switch to it for the duration of the query, and restore the prior
    /// active service afterwards whether or not the query succeeded.
    ///
    /// Returns the resolved service name alongside the outcome.
    pub async fn smart_query(
        &self,
        entity_set: &str,
        options: &QueryOptions,
    ) -> Result<(String, QueryOutcome), ODataError> {
        let service = match self.find_service_for_entity(entity_set).await {
            Some(service) => service,
            None => {
                // One explicit discovery retry before giving up.
                self.discover_all_services().await;
                match self.find_service_for_entity(entity_set).await {
                    Some(service) => service,
                    None => {
                        let known = self.known_services().await.len();
                        return Err(ODataError::OperationFailed(format!(
                            "Entity '{}' not found in any of the {} available services",
                            entity_set, known
                        )));
                    }
                }
            }
        };

        let prior = self.active_service().await;
        if !self.switch_service(&service).await {
            return Err(ODataError::OperationFailed(format!(
                "Unable to switch to service '{}'",
                service
            )));
        }

        let result = self.query(entity_set, options).await;

        // Restore without a probe so the prior state comes back even when
        // the query failed or the prior service became unreachable.
        self.set_active_service(prior).await;

        result.map(|outcome| (service, outcome))
    }
}

fn build_function_call(name: &str, params: &Value) -> String {
    match params.as_object() {
        Some(map) if !map.is_empty() => {
            let args = map
                .iter()
                .map(|(key, value)| format!("{}='{}'", key, literal(value)))
                .collect::<Vec<_>>()
                .join(",");
            format!("{}({})", name, args)
        }
        _ => name.to_string(),
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_params_empty() {
        let options = QueryOptions::default();
        assert!(options.to_params().is_empty());
    }

    #[test]
    fn test_to_params_top_only() {
        let options = QueryOptions {
            top: Some(5),
            ..Default::default()
        };
        assert_eq!(
            options.to_params(),
            vec![("$top".to_string(), "5".to_string())]
        );
    }

    #[test]
    fn test_to_params_full() {
        let options = QueryOptions {
            filter: Some("Status eq 'Open'".to_string()),
            select: Some("Id,Name".to_string()),
            expand: Some("Items".to_string()),
            orderby: Some("Name asc".to_string()),
            top: Some(10),
            skip: Some(20),
            count: true,
            format: Some("json".to_string()),
        };
        let params = options.to_params();
        assert_eq!(params.len(), 8);
        assert!(params.contains(&("$filter".to_string(), "Status eq 'Open'".to_string())));
        assert!(params.contains(&("$select".to_string(), "Id,Name".to_string())));
        assert!(params.contains(&("$orderby".to_string(), "Name asc".to_string())));
        assert!(params.contains(&("$skip".to_string(), "20".to_string())));
        assert!(params.contains(&("$count".to_string(), "true".to_string())));
    }

    #[test]
    fn test_count_false_emits_nothing() {
        let options = QueryOptions {
            count: false,
            ..Default::default()
        };
        assert!(!options.to_params().iter().any(|(k, _)| k == "$count"));
    }

    #[test]
    fn test_facets_reflect_active_options() {
        let options = QueryOptions {
            filter: Some("A eq 1".to_string()),
            top: Some(3),
            ..Default::default()
        };
        assert_eq!(options.facets(), vec!["Filter: A eq 1", "Top: 3"]);
    }

    #[test]
    fn test_update_method_from_arg() {
        assert_eq!(UpdateMethod::from_arg("PUT"), UpdateMethod::Put);
        assert_eq!(UpdateMethod::from_arg("put"), UpdateMethod::Put);
        assert_eq!(UpdateMethod::from_arg("PATCH"), UpdateMethod::Patch);
        assert_eq!(UpdateMethod::from_arg("anything"), UpdateMethod::Patch);
    }

    #[test]
    fn test_build_function_call_no_params() {
        assert_eq!(build_function_call("Activate", &json!({})), "Activate");
        assert_eq!(build_function_call("Activate", &Value::Null), "Activate");
    }

    #[test]
    fn test_build_function_call_preserves_insertion_order() {
        let params = json!({"OrderId": "500", "Plant": "DE01", "Qty": 3});
        assert_eq!(
            build_function_call("ReleaseOrder", &params),
            "ReleaseOrder(OrderId='500',Plant='DE01',Qty='3')"
        );
    }

    #[test]
    fn test_batch_operation_defaults() {
        let op: BatchOperation = serde_json::from_value(json!({"url": "Orders"})).unwrap();
        assert_eq!(op.method, "GET");
        assert_eq!(op.url, "Orders");
        assert!(op.data.is_none());
    }

    #[test]
    fn test_query_outcome_from_recognized_shape() {
        let response = json!({"d": {"results": [{"Id": "1"}], "__count": "9"}});
        let outcome =
            QueryOutcome::from_response("Orders", &QueryOptions::default(), response);
        match outcome {
            QueryOutcome::Records {
                records,
                total_count,
                ..
            } => {
                assert_eq!(records.len(), 1);
                assert_eq!(total_count, Some(json!("9")));
            }
            QueryOutcome::Raw { .. } => panic!("expected records"),
        }
    }

    #[test]
    fn test_query_outcome_raw_passthrough() {
        let response = json!({"status": "success"});
        let outcome =
            QueryOutcome::from_response("Orders", &QueryOptions::default(), response.clone());
        match outcome {
            QueryOutcome::Raw { response: raw, .. } => assert_eq!(raw, response),
            QueryOutcome::Records { .. } => panic!("expected raw passthrough"),
        }
    }
}
