//! `$select`, `$orderby` and `$expand` clause parsers (C3). Comma-split,
//! whitelist-validated, mapped to DB identifiers.

use super::fields::FieldMap;
use crate::error::{Result, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderClause {
    pub column: &'static str,
    pub direction: OrderDirection,
}

/// Comma-split (trim each); every name must be in the field map. Empty or
/// absent input means "all columns in map-declaration order".
pub fn parse_select(raw: Option<&str>, fields: &'static FieldMap) -> Result<Vec<&'static str>> {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return Ok(fields.all_columns()),
    };

    raw.split(',')
        .map(|name| {
            let name = name.trim();
            fields.to_column(name).ok_or_else(|| {
                ServiceError::ParseError(format!("Invalid field in $select: {name}"))
            })
        })
        .collect()
}

/// Comma-split; each entry is `<name> [asc|desc]` (default asc).
pub fn parse_orderby(raw: Option<&str>, fields: &'static FieldMap) -> Result<Vec<OrderClause>> {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return Ok(Vec::new()),
    };

    raw.split(',')
        .map(|entry| {
            let entry = entry.trim();
            let mut parts = entry.split_whitespace();
            let name = parts.next().unwrap_or_default();
            let column = fields.to_column(name).ok_or_else(|| {
                ServiceError::ParseError(format!("Invalid field in $orderby: {name}"))
            })?;
            let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => OrderDirection::Asc,
                Some("desc") => OrderDirection::Desc,
                Some(other) => {
                    return Err(ServiceError::ParseError(format!(
                        "Invalid field in $orderby: unknown direction '{other}'"
                    )))
                }
            };
            Ok(OrderClause { column, direction })
        })
        .collect()
}

/// Comma-split; each entry must be in `allowed`, else fail. Returns the
/// requested navigation names; the resource driver decides how to satisfy
/// them.
pub fn parse_expand(raw: Option<&str>, allowed: &[&'static str]) -> Result<Vec<&'static str>> {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return Ok(Vec::new()),
    };

    raw.split(',')
        .map(|entry| {
            let entry = entry.trim();
            allowed
                .iter()
                .find(|name| name.eq_ignore_ascii_case(entry))
                .copied()
                .ok_or_else(|| {
                    ServiceError::ParseError(format!(
                        "Invalid $expand: {entry}. Allowed: {}",
                        allowed.join(", ")
                    ))
                })
        })
        .collect()
}
