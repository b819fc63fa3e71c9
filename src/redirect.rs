//! MLS-number redirect handler (§1, §2): a thin surface sharing the DB
//! gateway with the OData core but specified only to that extent — it
//! queries a view keyed by MLS number and issues a 302 to the canonical
//! listing URL.

use crate::db::SharedGateway;
use crate::error::ServiceError;
use crate::value::{row_get, Param, Value};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

const REDIRECT_VIEW: &str = "MLS_REDIRECT_VIEW";

#[derive(Clone)]
pub struct RedirectState {
    pub gateway: SharedGateway,
}

pub async fn redirect_to_listing(
    State(state): State<RedirectState>,
    Path(mls_number): Path<String>,
) -> Result<Response, ServiceError> {
    let sql = format!("SELECT CANONICALURL FROM {REDIRECT_VIEW} WHERE MLSNUMBER = @mlsNumber");
    let params = vec![("mlsNumber".to_string(), Param::Str(mls_number.clone()))];

    let rows = state
        .gateway
        .query(&sql, &params)
        .await
        .map_err(|err| ServiceError::Backend(err.to_string()))?;

    let url = rows
        .first()
        .and_then(|row| row_get(row, "CANONICALURL"))
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::NotFound { resource: "Listing", key: mls_number.clone() })?;

    // §1/§4.6 call for a 302, not axum's built-in 303/307/308 `Redirect`
    // helpers, so the Location header is set on a plain `StatusCode::FOUND`
    // response instead.
    let mut response = StatusCode::FOUND.into_response();
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_str(url).map_err(|_| {
            ServiceError::Backend("canonical listing URL is not a valid header value".to_string())
        })?);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockGateway;
    use std::sync::Arc;

    #[tokio::test]
    async fn redirects_to_the_canonical_url_for_a_known_mls_number() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_response(vec![vec![(
            "CANONICALURL".to_string(),
            Value::String("https://example.com/listing/1".to_string()),
        )]]);
        let state = RedirectState { gateway: gateway.clone() as SharedGateway };

        let response = redirect_to_listing(State(state), Path("MLS-1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::FOUND);
        assert_eq!(
            response.headers().get(axum::http::header::LOCATION).unwrap(),
            "https://example.com/listing/1"
        );
    }

    #[tokio::test]
    async fn unknown_mls_number_is_not_found() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_response(vec![]);
        let state = RedirectState { gateway: gateway.clone() as SharedGateway };

        let err = redirect_to_listing(State(state), Path("MLS-404".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }
}
