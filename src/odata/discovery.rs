//! Service and schema discovery
//!
//! Entity-set enumeration, sample-based structure analysis, and the
//! multi-service catalog: probing the SAP Gateway catalog service, falling
//! back to well-known service name candidates when no catalog exists, and
//! locating which service exposes a given entity set.
//!
//! Discovery failures never abort the caller: catalog and per-service
//! probes degrade to empty lists or `None`.

use crate::odata::client::{ODataClient, ODataError, ServiceInfo};
use crate::odata::shapes;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// SAP Gateway catalog endpoint listing all hosted services
const CATALOG_ENDPOINT: &str = "/IWFND/CATALOGSERVICE;v=2/ServiceCollection";

/// Sample values longer than this are truncated in structure summaries
const SAMPLE_VALUE_MAX_LEN: usize = 100;

/// Per-field summary derived from a sampled record
#[derive(Debug, Clone, Serialize)]
pub struct FieldInfo {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub sample_value: Value,
}

/// Structural summary of an entity set, derived by sampling one record
#[derive(Debug, Clone, Serialize)]
pub struct EntityStructure {
    pub entity_set: String,
    pub fields: BTreeMap<String, FieldInfo>,
    pub sample_count: usize,
}

impl ODataClient {
    /// Discover the entity sets exposed by `service` (or the active
    /// service). Unknown document shapes yield an empty list, not an error.
    pub async fn discover_entity_sets(
        &self,
        service: Option<&str>,
    ) -> Result<Vec<String>, ODataError> {
        let doc = self.get_service_document(service).await?;
        Ok(shapes::extract_entity_sets(&doc))
    }

    /// Analyze an entity set by fetching one sample record.
    ///
    /// Returns `ODataError::NoSampleData` when the collection is empty or
    /// the response matches no known record shape.
    pub async fn analyze_entity_structure(
        &self,
        entity_set: &str,
    ) -> Result<EntityStructure, ODataError> {
        let params = [("$top".to_string(), "1".to_string())];
        let sample = self
            .request(entity_set, Some(&params), Method::GET, None, None)
            .await?;

        let record = shapes::extract_records(&sample)
            .and_then(|records| records.first())
            .ok_or_else(|| ODataError::NoSampleData(entity_set.to_string()))?;

        Ok(summarize_record(entity_set, record))
    }

    /// Discover all OData services hosted by the backend.
    ///
    /// Tries the gateway catalog first; when the catalog is unavailable,
    /// probes the configured candidate service names one by one and keeps
    /// the ones that answer. Either path replaces the cached service list.
    pub async fn discover_all_services(&self) -> Vec<ServiceInfo> {
        let services = match self
            .request(CATALOG_ENDPOINT, None, Method::GET, None, None)
            .await
        {
            Ok(catalog) => parse_catalog(&catalog),
            Err(e) => {
                tracing::debug!("service catalog unavailable ({}), probing candidates", e);
                self.probe_candidate_services().await
            }
        };

        self.replace_services(services.clone()).await;
        services
    }

    async fn probe_candidate_services(&self) -> Vec<ServiceInfo> {
        let mut available = Vec::new();
        for name in self.candidate_services() {
            match self.request("", None, Method::GET, None, Some(name)).await {
                Ok(_) => available.push(ServiceInfo {
                    name: name.clone(),
                    description: describe_candidate(name),
                    version: "1".to_string(),
                }),
                Err(e) => {
                    tracing::debug!("candidate service {} not reachable: {}", name, e);
                }
            }
        }
        available
    }

    /// Find which service exposes `entity_name`.
    ///
    /// Checks the active service first, then scans every known service
    /// (triggering discovery when the list is empty). First match wins;
    /// unreachable services are skipped.
    pub async fn find_service_for_entity(&self, entity_name: &str) -> Option<String> {
        if let Some(active) = self.active_service().await {
            if let Ok(entity_sets) = self.discover_entity_sets(Some(&active)).await {
                if entity_sets.iter().any(|e| e == entity_name) {
                    return Some(active);
                }
            }
        }

        if self.known_services().await.is_empty() {
            self.discover_all_services().await;
        }

        for service in self.known_services().await {
            match self.discover_entity_sets(Some(&service.name)).await {
                Ok(entity_sets) if entity_sets.iter().any(|e| e == entity_name) => {
                    return Some(service.name);
                }
                _ => continue,
            }
        }

        None
    }

    /// Switch the active service after validating it is reachable.
    ///
    /// The active service is left untouched when the probe fails.
    pub async fn switch_service(&self, service_name: &str) -> bool {
        match self.get_service_document(Some(service_name)).await {
            Ok(_) => {
                self.set_active_service(Some(service_name.to_string())).await;
                tracing::info!("switched active service to {}", service_name);
                true
            }
            Err(e) => {
                tracing::debug!("cannot switch to {}: {}", service_name, e);
                false
            }
        }
    }

    /// Session summary: base URL, active service, and discovered services
    pub async fn service_info(&self) -> Value {
        let services = self.known_services().await;
        json!({
            "current_service": self.active_service().await,
            "base_url": self.base_url(),
            "available_services": services.len(),
            "services": services,
        })
    }
}

/// Build an `EntityStructure` from a single sampled record.
///
/// Fields carrying the `__` metadata prefix are excluded; sample values are
/// truncated to 100 characters of their string form.
pub fn summarize_record(entity_set: &str, record: &Value) -> EntityStructure {
    let mut fields = BTreeMap::new();

    if let Value::Object(map) = record {
        for (key, value) in map {
            if key.starts_with("__") {
                continue;
            }
            fields.insert(
                key.clone(),
                FieldInfo {
                    type_tag: type_tag(value).to_string(),
                    sample_value: truncate_sample(value),
                },
            );
        }
    }

    EntityStructure {
        entity_set: entity_set.to_string(),
        fields,
        sample_count: 1,
    }
}

fn type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate_sample(value: &Value) -> Value {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > SAMPLE_VALUE_MAX_LEN {
        Value::String(text.chars().take(SAMPLE_VALUE_MAX_LEN).collect())
    } else {
        value.clone()
    }
}

/// Parse catalog records into service descriptors.
///
/// SAP reports descriptor fields under different names depending on the
/// gateway release; the first available synonym wins.
fn parse_catalog(catalog: &Value) -> Vec<ServiceInfo> {
    let Some(records) = shapes::extract_records(catalog) else {
        return Vec::new();
    };

    records
        .iter()
        .map(|entry| ServiceInfo {
            name: first_str(entry, &["TechnicalServiceName", "ServiceId"])
                .unwrap_or_else(|| "Unknown".to_string()),
            description: first_str(entry, &["ServiceDescription", "Title"]).unwrap_or_default(),
            version: first_str(entry, &["ServiceVersion"]).unwrap_or_else(|| "1".to_string()),
        })
        .collect()
}

fn first_str(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .map(String::from)
}

/// Derive a human-readable description from a candidate service name by
/// stripping the conventional `API_` / `_SRV` tokens.
fn describe_candidate(name: &str) -> String {
    format!("SAP {} Service", name.replace("API_", "").replace("_SRV", ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_catalog_nested() {
        let catalog = json!({"d": {"results": [
            {"TechnicalServiceName": "API_CUSTOMER_SRV", "ServiceDescription": "Customers", "ServiceVersion": "2"},
            {"ServiceId": "ZSALES", "Title": "Sales"}
        ]}});
        let services = parse_catalog(&catalog);
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name, "API_CUSTOMER_SRV");
        assert_eq!(services[0].description, "Customers");
        assert_eq!(services[0].version, "2");
        assert_eq!(services[1].name, "ZSALES");
        assert_eq!(services[1].description, "Sales");
        assert_eq!(services[1].version, "1");
    }

    #[test]
    fn test_parse_catalog_flat() {
        let catalog = json!({"value": [
            {"TechnicalServiceName": "API_MATERIAL_SRV", "ServiceDescription": "Materials"}
        ]});
        let services = parse_catalog(&catalog);
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "API_MATERIAL_SRV");
    }

    #[test]
    fn test_parse_catalog_unknown_shape() {
        let catalog = json!({"unexpected": true});
        assert!(parse_catalog(&catalog).is_empty());
    }

    #[test]
    fn test_parse_catalog_missing_fields() {
        let catalog = json!({"value": [{}]});
        let services = parse_catalog(&catalog);
        assert_eq!(services[0].name, "Unknown");
        assert_eq!(services[0].description, "");
        assert_eq!(services[0].version, "1");
    }

    #[test]
    fn test_describe_candidate() {
        assert_eq!(
            describe_candidate("API_BUSINESS_PARTNER_SRV"),
            "SAP BUSINESS_PARTNER Service"
        );
        assert_eq!(describe_candidate("ZCUSTOM"), "SAP ZCUSTOM Service");
    }

    #[test]
    fn test_summarize_record_excludes_metadata_fields() {
        let record = json!({
            "Id": "1",
            "__metadata": {"uri": "http://host/Orders('1')"}
        });
        let summary = summarize_record("Orders", &record);
        assert_eq!(summary.entity_set, "Orders");
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.fields.len(), 1);
        let field = summary.fields.get("Id").unwrap();
        assert_eq!(field.type_tag, "string");
        assert_eq!(field.sample_value, json!("1"));
    }

    #[test]
    fn test_summarize_record_type_tags() {
        let record = json!({
            "Name": "Acme",
            "Amount": 12.5,
            "Active": true,
            "Tags": ["a"],
            "Address": {"City": "Berlin"},
            "Notes": null
        });
        let summary = summarize_record("Customers", &record);
        assert_eq!(summary.fields["Name"].type_tag, "string");
        assert_eq!(summary.fields["Amount"].type_tag, "number");
        assert_eq!(summary.fields["Active"].type_tag, "boolean");
        assert_eq!(summary.fields["Tags"].type_tag, "array");
        assert_eq!(summary.fields["Address"].type_tag, "object");
        assert_eq!(summary.fields["Notes"].type_tag, "null");
    }

    #[test]
    fn test_summarize_record_truncates_long_samples() {
        let long = "x".repeat(250);
        let record = json!({ "Description": long });
        let summary = summarize_record("Orders", &record);
        let sample = summary.fields["Description"].sample_value.as_str().unwrap();
        assert_eq!(sample.len(), 100);
    }

    #[test]
    fn test_summarize_record_short_samples_kept_verbatim() {
        let record = json!({ "Count": 7 });
        let summary = summarize_record("Orders", &record);
        assert_eq!(summary.fields["Count"].sample_value, json!(7));
    }
}
