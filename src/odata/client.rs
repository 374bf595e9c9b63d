//! OData client core
//!
//! HTTP transport, CSRF token handling, and document caching for SAP OData
//! services. The client is a single per-process session: it owns the base
//! URL, the optional active service, credentials, and the discovery caches.

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Request timeout for regular OData calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shorter timeout for the CSRF token probe
const CSRF_TIMEOUT: Duration = Duration::from_secs(30);

/// OData client errors
#[derive(Error, Debug)]
pub enum ODataError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: Value },

    #[error("No sample data available for '{0}'")]
    NoSampleData(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl ODataError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ODataError::Timeout
        } else {
            ODataError::Transport(err.to_string())
        }
    }
}

/// A discovered OData service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub description: String,
    pub version: String,
}

// Two descriptors refer to the same service exactly when their names match.
impl PartialEq for ServiceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ServiceInfo {}

/// Dynamic multi-service OData client
#[derive(Debug)]
pub struct ODataClient {
    base_url: String,
    credentials: Option<(String, String)>,
    candidate_services: Vec<String>,
    http_client: Client,
    active_service: RwLock<Option<String>>,
    service_doc_cache: RwLock<HashMap<String, Value>>,
    metadata_cache: RwLock<Option<Value>>,
    services: RwLock<Vec<ServiceInfo>>,
}

impl ODataClient {
    /// Create a new OData client.
    ///
    /// Accepts either a gateway base URL or a service-specific URL; a URL
    /// like `https://host/sap/opu/odata/sap/API_CUSTOMER_SRV` is split into
    /// the base and an initial active service.
    pub fn new(
        base_url: &str,
        username: Option<String>,
        password: Option<String>,
        candidate_services: Vec<String>,
    ) -> Self {
        let (base_url, initial_service) = split_service_url(base_url);

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap();

        let credentials = match (username, password) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        };

        Self {
            base_url,
            credentials,
            candidate_services,
            http_client,
            active_service: RwLock::new(initial_service),
            service_doc_cache: RwLock::new(HashMap::new()),
            metadata_cache: RwLock::new(None),
            services: RwLock::new(Vec::new()),
        }
    }

    /// Gateway base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether basic-auth credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Configured fallback service candidates for catalog-less systems
    pub fn candidate_services(&self) -> &[String] {
        &self.candidate_services
    }

    /// Currently active service, if any
    pub async fn active_service(&self) -> Option<String> {
        self.active_service.read().await.clone()
    }

    /// Set the active service without a reachability probe.
    ///
    /// Only for restoring a previously saved state; normal switches go
    /// through `switch_service`.
    pub(crate) async fn set_active_service(&self, service: Option<String>) {
        *self.active_service.write().await = service;
    }

    /// Services found by the last discovery run
    pub async fn known_services(&self) -> Vec<ServiceInfo> {
        self.services.read().await.clone()
    }

    /// Replace the cached service list (last discovery wins, never merged)
    pub(crate) async fn replace_services(&self, services: Vec<ServiceInfo>) {
        *self.services.write().await = services;
    }

    fn build_url(&self, endpoint: &str, service: Option<&str>) -> String {
        let endpoint = endpoint.trim_start_matches('/');
        match (service, endpoint.is_empty()) {
            (Some(svc), true) => format!("{}/{}", self.base_url, svc),
            (Some(svc), false) => format!("{}/{}/{}", self.base_url, svc, endpoint),
            (None, true) => self.base_url.clone(),
            (None, false) => format!("{}/{}", self.base_url, endpoint),
        }
    }

    /// Make an HTTP request against the service resolved from `service`
    /// (explicit override) or the session's active service.
    ///
    /// Mutating verbs get a best-effort CSRF token; basic auth is attached
    /// whenever credentials are configured. An empty success body is
    /// normalized into a synthetic status document.
    pub async fn request(
        &self,
        endpoint: &str,
        params: Option<&[(String, String)]>,
        method: Method,
        body: Option<String>,
        service: Option<&str>,
    ) -> Result<Value, ODataError> {
        let target_service = match service {
            Some(svc) => Some(svc.to_string()),
            None => self.active_service.read().await.clone(),
        };
        let url = self.build_url(endpoint, target_service.as_deref());

        let is_mutating = method == Method::POST
            || method == Method::PUT
            || method == Method::PATCH
            || method == Method::DELETE;
        let takes_body = method == Method::POST || method == Method::PUT || method == Method::PATCH;
        let method_name = method.to_string();

        tracing::debug!("{} {}", method_name, url);

        let mut request = self
            .http_client
            .request(method, &url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");

        if let Some(params) = params {
            if !params.is_empty() {
                request = request.query(params);
            }
        }

        if is_mutating {
            if let Some(token) = self.fetch_csrf_token().await {
                request = request.header("X-CSRF-Token", token);
            }
        }

        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        if takes_body {
            if let Some(body) = body.filter(|b| !b.is_empty()) {
                request = request.body(body);
            }
        }

        let response = request.send().await.map_err(ODataError::from_reqwest)?;
        let status = response.status();
        let text = response.text().await.map_err(ODataError::from_reqwest)?;

        if status.as_u16() >= 400 {
            let detail =
                serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone()));
            return Err(ODataError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        if text.trim().is_empty() {
            return Ok(json!({
                "status": "success",
                "message": format!("{} operation completed", method_name),
            }));
        }

        serde_json::from_str(&text).map_err(|_| ODataError::Transport(text))
    }

    /// Fetch a CSRF token for write operations.
    ///
    /// Best-effort: any failure (network, timeout, header missing) yields
    /// `None` and the write proceeds without a token.
    pub async fn fetch_csrf_token(&self) -> Option<String> {
        let mut request = self
            .http_client
            .head(&self.base_url)
            .header("X-CSRF-Token", "fetch")
            .timeout(CSRF_TIMEOUT);

        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        match request.send().await {
            Ok(response) => response
                .headers()
                .get("x-csrf-token")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            Err(e) => {
                tracing::debug!("CSRF token fetch failed: {}", e);
                None
            }
        }
    }

    /// Get the service document for `service` (or the active service),
    /// fetching and caching it on first access.
    pub async fn get_service_document(&self, service: Option<&str>) -> Result<Value, ODataError> {
        let key = match service {
            Some(svc) => svc.to_string(),
            None => self
                .active_service
                .read()
                .await
                .clone()
                .unwrap_or_else(|| "default".to_string()),
        };

        {
            let cache = self.service_doc_cache.read().await;
            if let Some(doc) = cache.get(&key) {
                return Ok(doc.clone());
            }
        }

        let doc = self.request("", None, Method::GET, None, service).await?;
        self.service_doc_cache
            .write()
            .await
            .insert(key, doc.clone());
        Ok(doc)
    }

    /// Get the process-wide metadata document.
    ///
    /// Tries the structured `$metadata?$format=json` endpoint first and
    /// falls back to the service document when the backend cannot serve
    /// metadata as JSON. The fallback result is cached as well.
    pub async fn get_metadata(&self, force_refresh: bool) -> Result<Value, ODataError> {
        if !force_refresh {
            if let Some(metadata) = self.metadata_cache.read().await.clone() {
                return Ok(metadata);
            }
        }

        let params = [("$format".to_string(), "json".to_string())];
        let metadata = match self
            .request("$metadata", Some(&params), Method::GET, None, None)
            .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(
                    "structured $metadata unavailable ({}), falling back to service document",
                    e
                );
                self.get_service_document(None).await?
            }
        };

        *self.metadata_cache.write().await = Some(metadata.clone());
        Ok(metadata)
    }

    /// Drop the cached service document for `service`
    pub async fn invalidate_service_document(&self, service: &str) {
        self.service_doc_cache.write().await.remove(service);
    }
}

/// Split a service-specific SAP gateway URL into base URL and service name.
fn split_service_url(url: &str) -> (String, Option<String>) {
    if let Some((prefix, rest)) = url.split_once("/sap/opu/odata/sap/") {
        let service = rest.trim_matches('/').split('/').next().unwrap_or("");
        if !service.is_empty() {
            return (
                format!("{}/sap/opu/odata/sap", prefix),
                Some(service.to_string()),
            );
        }
    }
    (url.trim_end_matches('/').to_string(), None)
}
