//! Office resource driver (§4.5): list and get, no expansions. Mirrors
//! `member.rs`'s shape against the `OFFICE` table.

use super::envelope::{collection_context, collection_envelope, entity_context, entity_envelope, reshape};
use crate::db::SharedGateway;
use crate::error::{Result, ServiceError};
use crate::odata::fields::{OFFICE_FIELDS, OFFICE_KEY_FIELD};
use crate::odata::query_builder::{build, QueryBuilderInput, RawQueryOptions};
use crate::value::{row_get, Param, Value};
use serde_json::Value as Json;

const TABLE: &str = "OFFICE";

fn parse_path_key(path_key: &str) -> Param {
    let stripped = path_key.trim_matches('\'');
    match stripped.parse::<i64>() {
        Ok(n) => Param::Int(n),
        Err(_) => Param::Str(stripped.to_string()),
    }
}

pub struct OfficeDriver {
    gateway: SharedGateway,
    base_url: String,
}

impl OfficeDriver {
    pub fn new(gateway: SharedGateway, base_url: String) -> Self {
        Self { gateway, base_url }
    }

    pub async fn list(&self, query: RawQueryOptions<'_>) -> Result<Json> {
        let collection_url = format!("{}/Office", self.base_url);
        let plan = build(QueryBuilderInput {
            table: TABLE,
            fields: &OFFICE_FIELDS,
            query,
            key_field: OFFICE_KEY_FIELD,
            key_value: None,
            base_url: Some(collection_url),
            base_where: None,
            allowed_expansions: &[],
            default_top: 100,
            max_top: 1000,
            extra_select_columns: &[],
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

        let values: Vec<Json> = data_rows
            .iter()
            .map(|row| Json::Object(reshape(row, &OFFICE_FIELDS)))
            .collect();

        let next_link = count.and_then(|total| plan.next_link(total));
        Ok(collection_envelope(
            collection_context(&self.base_url, "Office"),
            count,
            next_link,
            values,
        ))
    }

    pub async fn get(&self, path_key: &str, query: RawQueryOptions<'_>) -> Result<Json> {
        let key_value = parse_path_key(path_key);
        let plan = build(QueryBuilderInput {
            table: TABLE,
            fields: &OFFICE_FIELDS,
            query,
            key_field: OFFICE_KEY_FIELD,
            key_value: Some(key_value),
            base_url: None,
            base_where: None,
            allowed_expansions: &[],
            default_top: 1,
            max_top: 1,
            extra_select_columns: &[],
        })?;

        let rows = self
            .gateway
            .query(&plan.data_sql, &plan.params)
            .await
            .map_err(|err| ServiceError::Backend(err.to_string()))?;

        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound { resource: "Office", key: path_key.to_string() })?;

        let fields = reshape(row, &OFFICE_FIELDS);
        Ok(entity_envelope(entity_context(&self.base_url, "Office"), fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_key_parses_as_integer_when_possible() {
        assert_eq!(parse_path_key("42"), Param::Int(42));
    }
}
