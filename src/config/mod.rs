//! Configuration module
//!
//! Settings come from an optional TOML file in the working directory with
//! environment-variable overrides (`SAP_URL`, `SAP_USERNAME`,
//! `SAP_PASSWORD`). A missing URL is not fatal: the server starts and
//! every SAP tool reports a configuration error until one is provided.

use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;

/// Default config file name, resolved against the working directory
pub const CONFIG_FILE: &str = "sap-odata-mcp.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-disk configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// SAP connection settings
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Discovery settings
#[derive(Debug, Deserialize)]
pub struct DiscoveryConfig {
    /// Service names probed when the gateway catalog is unavailable.
    ///
    /// The default list is a naming-convention guess, not a protocol
    /// guarantee; override it for systems with custom service names.
    #[serde(default = "default_candidate_services")]
    pub candidate_services: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            candidate_services: default_candidate_services(),
        }
    }
}

/// Well-known SAP API service names probed as a catalog fallback
pub fn default_candidate_services() -> Vec<String> {
    [
        "API_CUSTOMER_SRV",
        "API_BILLING_DOCUMENT_SRV",
        "API_SALES_ORDER_SRV",
        "API_MATERIAL_SRV",
        "API_SUPPLIER_SRV",
        "API_FINANCIALSTATEMENT_SRV",
        "API_PURCHASE_ORDER_SRV",
        "API_BUSINESS_PARTNER_SRV",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// Load from the default config file; a missing file yields defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(Path::new(CONFIG_FILE))
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Resolve the runtime configuration, applying environment overrides.
    pub fn to_runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            url: env::var("SAP_URL").ok().or_else(|| self.connection.url.clone()),
            username: env::var("SAP_USERNAME")
                .ok()
                .or_else(|| self.connection.username.clone()),
            password: env::var("SAP_PASSWORD")
                .ok()
                .or_else(|| self.connection.password.clone()),
            candidate_services: self.discovery.candidate_services.clone(),
        }
    }
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub candidate_services: Vec<String>,
}

impl RuntimeConfig {
    /// Whether enough configuration exists to talk to a backend
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}
