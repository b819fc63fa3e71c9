//! Property resource driver (§4.5): list and get orchestration plus the two
//! Property-specific transforms the spec calls out — key codec on
//! `ListingKey` and photo-XML-to-`Media` parsing.

use super::envelope::{collection_context, collection_envelope, entity_context, entity_envelope, reshape};
use super::expand::{batch_expand, ExpandSpec};
use crate::db::SharedGateway;
use crate::error::{Result, ServiceError};
use crate::odata::fields::{MEMBER_FIELDS, OFFICE_FIELDS, PROPERTY_FIELDS, PROPERTY_KEY_FIELD};
use crate::odata::key_registry::KeyRegistry;
use crate::odata::query_builder::{build, QueryBuilderInput, RawQueryOptions};
use crate::value::{row_get, Param, Value};
use serde_json::{Map, Value as Json};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const TABLE: &str = "PROPERTY";
const PHOTO_XML_COLUMN: &str = "PHOTOXML";
const ALLOWED_EXPANSIONS: &[&str] = &["ListAgent", "ListOffice"];

const EXPANSIONS: &[ExpandSpec] = &[
    ExpandSpec {
        name: "ListAgent",
        parent_key_reso: "ListAgentKey",
        related_table: "AGENT",
        related_key_column: "AGENTKEY",
        related_fields: &MEMBER_FIELDS,
    },
    ExpandSpec {
        name: "ListOffice",
        parent_key_reso: "ListOfficeKey",
        related_table: "OFFICE",
        related_key_column: "OFFICEKEY",
        related_fields: &OFFICE_FIELDS,
    },
];

/// Extracts `<URL>…</URL>` occurrences in document order and builds the
/// `Media` array the spec describes: `MediaKey` (first 16 hex chars of
/// SHA-256 of the URL), `ResourceRecordKey` (the encoded `ListingKey`),
/// `MediaURL`, `Order` (1-based). Absent/empty XML yields an empty array.
fn parse_media(photo_xml: Option<&str>, encoded_listing_key: &str) -> Vec<Json> {
    let xml = match photo_xml {
        Some(x) if !x.is_empty() => x,
        _ => return Vec::new(),
    };

    let mut media = Vec::new();
    let mut rest = xml;
    let mut order = 1i64;
    while let Some(start) = rest.find("<URL>") {
        let after_open = &rest[start + "<URL>".len()..];
        let Some(end) = after_open.find("</URL>") else {
            break;
        };
        let url = &after_open[..end];
        let media_key = hex::encode(&Sha256::digest(url.as_bytes())[..8]);

        let mut entry = Map::new();
        entry.insert("MediaKey".to_string(), Json::String(media_key));
        entry.insert(
            "ResourceRecordKey".to_string(),
            Json::String(encoded_listing_key.to_string()),
        );
        entry.insert("MediaURL".to_string(), Json::String(url.to_string()));
        entry.insert("Order".to_string(), Json::Number(order.into()));
        media.push(Json::Object(entry));

        order += 1;
        rest = &after_open[end + "</URL>".len()..];
    }
    media
}

fn apply_property_transforms(mut fields: Map<String, Json>, row: &crate::value::Row, registry: &KeyRegistry) -> Map<String, Json> {
    if let Some(backend_key) = row_get(row, "LISTINGKEY").and_then(Value::as_str) {
        let encoded = registry.observe(backend_key);
        let media = parse_media(row_get(row, PHOTO_XML_COLUMN).and_then(Value::as_str), &encoded);
        fields.insert("ListingKey".to_string(), Json::String(encoded));
        fields.insert("Media".to_string(), Json::Array(media));
    }
    fields
}

pub struct PropertyDriver {
    gateway: SharedGateway,
    registry: Arc<KeyRegistry>,
    base_url: String,
}

impl PropertyDriver {
    pub fn new(gateway: SharedGateway, registry: Arc<KeyRegistry>, base_url: String) -> Self {
        Self { gateway, registry, base_url }
    }

    pub async fn list(&self, query: RawQueryOptions<'_>) -> Result<Json> {
        let collection_url = format!("{}/Property", self.base_url);
        let plan = build(QueryBuilderInput {
            table: TABLE,
            fields: &PROPERTY_FIELDS,
            query,
            key_field: PROPERTY_KEY_FIELD,
            key_value: None,
            base_url: Some(collection_url),
            base_where: None,
            allowed_expansions: ALLOWED_EXPANSIONS,
            default_top: 100,
            max_top: 1000,
            extra_select_columns: &[PHOTO_XML_COLUMN],
        })?;

        let (data_rows, count) = if let Some(count_sql) = &plan.count_sql {
            let (data, count) = tokio::try_join!(
                self.gateway.query(&plan.data_sql, &plan.params),
                self.gateway.query(count_sql, &plan.params),
            )
            .map_err(|err| ServiceError::Backend(err.to_string()))?;
            let total = count
                .first()
                .and_then(|row| row_get(row, "total"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            (data, Some(total))
        } else {
            let data = self
                .gateway
                .query(&plan.data_sql, &plan.params)
                .await
                .map_err(|err| ServiceError::Backend(err.to_string()))?;
            (data, None)
        };

        let mut values: Vec<Json> = Vec::with_capacity(data_rows.len());
        for row in &data_rows {
            let fields = reshape(row, &PROPERTY_FIELDS);
            let fields = apply_property_transforms(fields, row, &self.registry);
            values.push(Json::Object(fields));
        }

        if !plan.expansions.is_empty() {
            batch_expand(&self.gateway, &plan.expansions, EXPANSIONS, &mut values).await?;
        }

        let next_link = count.and_then(|total| plan.next_link(total));
        let envelope = collection_envelope(
            collection_context(&self.base_url, "Property"),
            count,
            next_link,
            values,
        );
        Ok(envelope)
    }

    pub async fn get(&self, path_key: &str, query: RawQueryOptions<'_>) -> Result<Json> {
        let stripped = path_key.trim_matches('\'');
        let backend_key = self
            .registry
            .resolve(stripped)
            .ok_or(ServiceError::NotFound { resource: "Property", key: path_key.to_string() })?;

        let plan = build(QueryBuilderInput {
            table: TABLE,
            fields: &PROPERTY_FIELDS,
            query,
            key_field: PROPERTY_KEY_FIELD,
            key_value: Some(Param::Str(backend_key)),
            base_url: None,
            base_where: None,
            allowed_expansions: ALLOWED_EXPANSIONS,
            default_top: 1,
            max_top: 1,
            extra_select_columns: &[PHOTO_XML_COLUMN],
        })?;

        let rows = self
            .gateway
            .query(&plan.data_sql, &plan.params)
            .await
            .map_err(|err| ServiceError::Backend(err.to_string()))?;

        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound { resource: "Property", key: path_key.to_string() })?;

        let fields = reshape(row, &PROPERTY_FIELDS);
        let mut fields = apply_property_transforms(fields, row, &self.registry);

        if !plan.expansions.is_empty() {
            let mut single = vec![Json::Object(std::mem::take(&mut fields))];
            batch_expand(&self.gateway, &plan.expansions, EXPANSIONS, &mut single).await?;
            if let Json::Object(reshaped) = single.remove(0) {
                fields = reshaped;
            }
        }

        Ok(entity_envelope(entity_context(&self.base_url, "Property"), fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_media_extracts_urls_in_document_order_with_1_based_order() {
        let xml = "<Photos><Item><URL>https://example.com/a.jpg</URL></Item><Item><URL>https://example.com/b.jpg</URL></Item></Photos>";
        let media = parse_media(Some(xml), "123");
        assert_eq!(media.len(), 2);
        assert_eq!(media[0]["MediaURL"], "https://example.com/a.jpg");
        assert_eq!(media[0]["Order"], 1);
        assert_eq!(media[0]["ResourceRecordKey"], "123");
        assert_eq!(media[1]["MediaURL"], "https://example.com/b.jpg");
        assert_eq!(media[1]["Order"], 2);
        assert_eq!(media[0]["MediaKey"].as_str().unwrap().len(), 16);
    }

    #[test]
    fn parse_media_is_empty_for_absent_or_empty_xml() {
        assert!(parse_media(None, "123").is_empty());
        assert!(parse_media(Some(""), "123").is_empty());
    }

    #[test]
    fn media_key_is_deterministic_for_the_same_url() {
        let xml = "<URL>https://example.com/a.jpg</URL>";
        let first = parse_media(Some(xml), "1");
        let second = parse_media(Some(xml), "2");
        assert_eq!(first[0]["MediaKey"], second[0]["MediaKey"]);
    }
}
