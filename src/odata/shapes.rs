//! OData response shape detection
//!
//! SAP backends answer in several OData dialects (V2 nested envelopes,
//! V4 flat envelopes, and a bare legacy form). Extraction goes through an
//! ordered list of shape matchers; the first match wins and unknown shapes
//! degrade to empty results rather than errors.

use serde_json::Value;

/// Known OData response envelope shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"d": {"EntitySets": [...]}}` — V2 service document
    NestedEntitySets,
    /// `{"value": [{"name": ...}, ...]}` — V4 service document
    NamedCollections,
    /// `{"EntitySets": [...]}` — legacy flat service document
    FlatEntitySets,
    /// `{"d": {"results": [...]}}` — V2 result set
    NestedResults,
    /// `{"value": [...]}` — V4 result set
    ValueArray,
    /// None of the above
    Unknown,
}

impl ResponseShape {
    /// Classify a service document
    pub fn of_service_document(doc: &Value) -> Self {
        if doc
            .get("d")
            .and_then(|d| d.get("EntitySets"))
            .and_then(Value::as_array)
            .is_some()
        {
            ResponseShape::NestedEntitySets
        } else if doc.get("value").and_then(Value::as_array).is_some() {
            ResponseShape::NamedCollections
        } else if doc.get("EntitySets").and_then(Value::as_array).is_some() {
            ResponseShape::FlatEntitySets
        } else {
            ResponseShape::Unknown
        }
    }

    /// Classify a query/entity result set
    pub fn of_result_set(doc: &Value) -> Self {
        if doc
            .get("d")
            .and_then(|d| d.get("results"))
            .and_then(Value::as_array)
            .is_some()
        {
            ResponseShape::NestedResults
        } else if doc.get("value").and_then(Value::as_array).is_some() {
            ResponseShape::ValueArray
        } else {
            ResponseShape::Unknown
        }
    }
}

/// Extract entity set names from a service document.
///
/// Returns an empty vec for unrecognized shapes; discovery must never fail
/// just because a backend speaks an unexpected dialect.
pub fn extract_entity_sets(doc: &Value) -> Vec<String> {
    match ResponseShape::of_service_document(doc) {
        ResponseShape::NestedEntitySets => doc["d"]["EntitySets"]
            .as_array()
            .map(|sets| {
                sets.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        ResponseShape::NamedCollections => doc["value"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        ResponseShape::FlatEntitySets => doc["EntitySets"]
            .as_array()
            .map(|sets| {
                sets.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Extract the record array from a query response, if the envelope is known.
pub fn extract_records(doc: &Value) -> Option<&Vec<Value>> {
    match ResponseShape::of_result_set(doc) {
        ResponseShape::NestedResults => doc["d"]["results"].as_array(),
        ResponseShape::ValueArray => doc["value"].as_array(),
        _ => None,
    }
}

/// Extract the server-reported total count, when the backend included one.
///
/// V2 reports `d.__count` (a string), V4 reports `@odata.count` (a number).
pub fn extract_total_count(doc: &Value) -> Option<Value> {
    doc.get("d")
        .and_then(|d| d.get("__count"))
        .or_else(|| doc.get("@odata.count"))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_entity_sets_shape() {
        let doc = json!({"d": {"EntitySets": ["Orders", "Customers"]}});
        assert_eq!(
            ResponseShape::of_service_document(&doc),
            ResponseShape::NestedEntitySets
        );
        assert_eq!(extract_entity_sets(&doc), vec!["Orders", "Customers"]);
    }

    #[test]
    fn test_named_collections_shape() {
        let doc = json!({"value": [{"name": "Orders", "url": "Orders"}, {"name": "Customers"}]});
        assert_eq!(
            ResponseShape::of_service_document(&doc),
            ResponseShape::NamedCollections
        );
        assert_eq!(extract_entity_sets(&doc), vec!["Orders", "Customers"]);
    }

    #[test]
    fn test_flat_entity_sets_shape() {
        let doc = json!({"EntitySets": ["Products"]});
        assert_eq!(
            ResponseShape::of_service_document(&doc),
            ResponseShape::FlatEntitySets
        );
        assert_eq!(extract_entity_sets(&doc), vec!["Products"]);
    }

    #[test]
    fn test_unknown_shape_yields_empty() {
        let doc = json!({"odata": {"something": "else"}});
        assert_eq!(
            ResponseShape::of_service_document(&doc),
            ResponseShape::Unknown
        );
        assert!(extract_entity_sets(&doc).is_empty());
    }

    #[test]
    fn test_named_collections_entries_without_name_skipped() {
        let doc = json!({"value": [{"url": "Orders"}, {"name": "Customers"}]});
        assert_eq!(extract_entity_sets(&doc), vec!["Customers"]);
    }

    #[test]
    fn test_extract_records_v2() {
        let doc = json!({"d": {"results": [{"Id": "1"}, {"Id": "2"}]}});
        let records = extract_records(&doc).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_extract_records_v4() {
        let doc = json!({"value": [{"Id": "1"}]});
        let records = extract_records(&doc).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_extract_records_unknown() {
        let doc = json!({"status": "success"});
        assert!(extract_records(&doc).is_none());
    }

    #[test]
    fn test_extract_total_count() {
        let v2 = json!({"d": {"__count": "42", "results": []}});
        assert_eq!(extract_total_count(&v2), Some(json!("42")));

        let v4 = json!({"@odata.count": 42, "value": []});
        assert_eq!(extract_total_count(&v4), Some(json!(42)));

        let none = json!({"value": []});
        assert_eq!(extract_total_count(&none), None);
    }
}
