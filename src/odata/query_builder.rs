//! Query builder (C4): combines the filter compiler and clause parsers with
//! pagination, base predicates, key lookup, and an optional count query +
//! next-link builder.

use super::clauses::{parse_expand, parse_orderby, parse_select, OrderDirection};
use super::fields::FieldMap;
use super::filter::compile as compile_filter;
use crate::error::Result;
use crate::value::Param;

/// Raw, still-untrusted query options lifted straight from the request.
#[derive(Debug, Clone, Default)]
pub struct RawQueryOptions<'a> {
    pub select: Option<&'a str>,
    pub filter: Option<&'a str>,
    pub orderby: Option<&'a str>,
    pub top: Option<&'a str>,
    pub skip: Option<&'a str>,
    pub count: bool,
    pub expand: Option<&'a str>,
}

pub struct QueryBuilderInput<'a> {
    pub table: &'static str,
    pub fields: &'static FieldMap,
    pub query: RawQueryOptions<'a>,
    pub key_field: &'static str,
    pub key_value: Option<Param>,
    pub base_url: Option<String>,
    pub base_where: Option<String>,
    pub allowed_expansions: &'static [&'static str],
    pub default_top: i64,
    pub max_top: i64,
    /// Backend columns fetched unconditionally alongside the select list,
    /// e.g. Property's photo XML blob (§4.5) — never client-selectable, not
    /// part of the field map, dropped from the envelope by the reshape step
    /// and consumed directly by the resource driver instead.
    pub extra_select_columns: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub data_sql: String,
    pub count_sql: Option<String>,
    pub params: Vec<(String, Param)>,
    pub top: i64,
    pub skip: i64,
    pub count_requested: bool,
    pub expansions: Vec<&'static str>,
    next_link_base: Option<String>,
    next_link_query: Vec<(String, String)>,
}

impl QueryPlan {
    /// Returns `None` when `skip + top >= total`, else the next page URL
    /// re-propagating any of `$select, $filter, $orderby, $count` the
    /// client supplied. `$` is URL-encoded as `%24`, matching a literal
    /// query-string encoder.
    pub fn next_link(&self, total: i64) -> Option<String> {
        let base = self.next_link_base.as_ref()?;
        if self.skip + self.top >= total {
            return None;
        }
        let next_skip = self.skip + self.top;
        let mut pairs: Vec<(String, String)> = self
            .next_link_query
            .iter()
            .cloned()
            .filter(|(k, _)| k != "$top" && k != "$skip")
            .collect();
        pairs.push(("$top".to_string(), self.top.to_string()));
        pairs.push(("$skip".to_string(), next_skip.to_string()));

        let qs = pairs
            .into_iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    urlencoding::encode(&k),
                    urlencoding::encode(&v)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        Some(format!("{base}?{qs}"))
    }
}

pub fn build(input: QueryBuilderInput<'_>) -> Result<QueryPlan> {
    let top = clamp_top(
        input.query.top,
        input.default_top,
        input.max_top,
    );
    let skip = clamp_skip(input.query.skip);

    let select_cols = parse_select(input.query.select, input.fields)?;
    let order_clauses = parse_orderby(input.query.orderby, input.fields)?;
    let expansions = parse_expand(input.query.expand, input.allowed_expansions)?;

    let mut params: Vec<(String, Param)> = Vec::new();
    let mut where_parts: Vec<String> = Vec::new();

    if let Some(base) = &input.base_where {
        where_parts.push(base.clone());
    }

    // keyValue wins over $filter when both are present.
    if let Some(key_value) = input.key_value {
        let key_column = input
            .fields
            .to_column(input.key_field)
            .expect("key field must be declared in its own field map");
        where_parts.push(format!("{key_column} = @keyValue"));
        params.push(("keyValue".to_string(), key_value));
    } else if let Some(filter) = input.query.filter {
        let compiled = compile_filter(filter, input.fields)?;
        where_parts.push(compiled.sql);
        params.extend(compiled.params);
    }

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let order_by = if order_clauses.is_empty() {
        // Stable order invariant: default to the first declared column.
        let default_col = input
            .fields
            .declared_order()
            .next()
            .and_then(|reso| input.fields.to_column(reso))
            .expect("field map must declare at least one field");
        format!(" ORDER BY {default_col} ASC")
    } else {
        let rendered = order_clauses
            .iter()
            .map(|c| {
                let dir = match c.direction {
                    OrderDirection::Asc => "ASC",
                    OrderDirection::Desc => "DESC",
                };
                format!("{} {dir}", c.column)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ORDER BY {rendered}")
    };

    let mut select_all = select_cols.clone();
    select_all.extend(input.extra_select_columns.iter().copied());
    let select_list = select_all.join(", ");
    let data_sql = format!(
        "SELECT {select_list} FROM {table}{where_clause}{order_by} OFFSET {skip} ROWS FETCH NEXT {top} ROWS ONLY",
        table = input.table,
    );

    let count_sql = if input.query.count {
        Some(format!(
            "SELECT COUNT(*) AS total FROM {table}{where_clause}",
            table = input.table,
        ))
    } else {
        None
    };

    let (next_link_base, next_link_query) = match (input.query.count, &input.base_url) {
        (true, Some(base)) => (
            Some(base.clone()),
            collect_propagated_query(&input.query),
        ),
        _ => (None, Vec::new()),
    };

    Ok(QueryPlan {
        data_sql,
        count_sql,
        params,
        top,
        skip,
        count_requested: input.query.count,
        expansions,
        next_link_base,
        next_link_query,
    })
}

fn collect_propagated_query(query: &RawQueryOptions<'_>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Some(v) = query.select {
        pairs.push(("$select".to_string(), v.to_string()));
    }
    if let Some(v) = query.filter {
        pairs.push(("$filter".to_string(), v.to_string()));
    }
    if let Some(v) = query.orderby {
        pairs.push(("$orderby".to_string(), v.to_string()));
    }
    if query.count {
        pairs.push(("$count".to_string(), "true".to_string()));
    }
    pairs
}

fn clamp_top(raw: Option<&str>, default: i64, max: i64) -> i64 {
    let parsed = raw.and_then(|s| s.parse::<i64>().ok()).unwrap_or(default);
    parsed.clamp(1, max)
}

fn clamp_skip(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
        .max(0)
}
