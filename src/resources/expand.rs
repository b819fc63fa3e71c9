//! Batched `$expand` resolution (§4.5 step 6): one `IN (...)` query per
//! requested navigation property, attached to every parent row that carries
//! a matching foreign key. Unmatched rows are left unattached — no error.

use super::envelope::reshape;
use crate::db::SharedGateway;
use crate::error::{Result, ServiceError};
use crate::odata::fields::FieldMap;
use crate::value::{row_get, Param, Value};
use serde_json::{Map, Value as Json};
use std::collections::HashSet;

/// Static description of one navigable relationship: the parent's foreign
/// key (already reshaped to its RESO name) and the related table/column to
/// resolve it against.
pub struct ExpandSpec {
    pub name: &'static str,
    pub parent_key_reso: &'static str,
    pub related_table: &'static str,
    pub related_key_column: &'static str,
    pub related_fields: &'static FieldMap,
}

/// Runs one batched query per requested expansion and splices the resolved
/// objects into `values` under the navigation name. `values` entries are
/// mutated in place; each must be a `Json::Object`.
pub async fn batch_expand(
    gateway: &SharedGateway,
    requested: &[&'static str],
    specs: &[ExpandSpec],
    values: &mut [Json],
) -> Result<()> {
    for name in requested {
        let spec = specs
            .iter()
            .find(|s| s.name == *name)
            .ok_or_else(|| ServiceError::ParseError(format!("Invalid $expand: {name}")))?;

        let mut keys: Vec<i64> = Vec::new();
        let mut seen = HashSet::new();
        for value in values.iter() {
            if let Some(key) = value.get(spec.parent_key_reso).and_then(Json::as_i64) {
                if seen.insert(key) {
                    keys.push(key);
                }
            }
        }

        if keys.is_empty() {
            continue;
        }

        let placeholders: Vec<String> = (0..keys.len()).map(|i| format!("@k{i}")).collect();
        let sql = format!(
            "SELECT * FROM {} WHERE {} IN ({})",
            spec.related_table,
            spec.related_key_column,
            placeholders.join(", ")
        );
        let params: Vec<(String, Param)> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (format!("k{i}"), Param::Int(*k)))
            .collect();

        let rows = gateway
            .query(&sql, &params)
            .await
            .map_err(|err| ServiceError::Backend(err.to_string()))?;

        let mut by_key: std::collections::HashMap<i64, Map<String, Json>> = std::collections::HashMap::new();
        for row in &rows {
            if let Some(key) = row_get(row, spec.related_key_column).and_then(Value::as_i64) {
                by_key.insert(key, reshape(row, spec.related_fields));
            }
        }

        for value in values.iter_mut() {
            let Some(obj) = value.as_object_mut() else { continue };
            let Some(key) = obj.get(spec.parent_key_reso).and_then(Json::as_i64) else {
                continue;
            };
            if let Some(related) = by_key.get(&key) {
                obj.insert(name.to_string(), Json::Object(related.clone()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockGateway;
    use crate::odata::fields::MEMBER_FIELDS;
    use crate::value::Value;
    use serde_json::json;
    use std::sync::Arc;

    const SPECS: &[ExpandSpec] = &[ExpandSpec {
        name: "ListAgent",
        parent_key_reso: "ListAgentKey",
        related_table: "AGENT",
        related_key_column: "AGENTKEY",
        related_fields: &MEMBER_FIELDS,
    }];

    #[tokio::test]
    async fn attaches_resolved_object_under_navigation_name() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_response(vec![vec![
            ("AGENTKEY".to_string(), Value::Int(100)),
            ("GIVENNAME".to_string(), Value::String("John".to_string())),
            ("SURNAME".to_string(), Value::String("Agent".to_string())),
        ]]);
        let gateway: SharedGateway = gateway;

        let mut values = vec![json!({"ListAgentKey": 100})];
        batch_expand(&gateway, &["ListAgent"], SPECS, &mut values).await.unwrap();

        assert_eq!(values[0]["ListAgent"]["MemberKey"], 100);
        assert_eq!(values[0]["ListAgent"]["MemberFirstName"], "John");
    }

    #[tokio::test]
    async fn rows_with_no_match_are_left_unattached() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_response(vec![]);
        let gateway: SharedGateway = gateway;

        let mut values = vec![json!({"ListAgentKey": 999})];
        batch_expand(&gateway, &["ListAgent"], SPECS, &mut values).await.unwrap();
        assert!(values[0].get("ListAgent").is_none());
    }

    #[tokio::test]
    async fn unknown_expansion_name_is_a_parse_error() {
        let gateway: SharedGateway = Arc::new(MockGateway::new());
        let mut values = vec![json!({})];
        let err = batch_expand(&gateway, &["InvalidExpand"], SPECS, &mut values)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid $expand"));
    }
}
