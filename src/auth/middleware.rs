//! Bearer-token extraction (§4.8): every resource route requires
//! `Authorization: Bearer <token>`, looked up against the token store and
//! rejected with 401 when missing, malformed, unknown, or expired.

use super::store::SharedTokenStore;
use crate::error::ServiceError;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::Utc;

/// Proof that a request carried a valid, unexpired bearer token. Handlers
/// that need authentication take this as an extractor argument; axum
/// rejects the request with `ServiceError::Unauthorized` before the
/// handler body runs if extraction fails.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    pub client_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedClient
where
    SharedTokenStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = SharedTokenStore::from_ref(state);
        let token = extract_bearer(parts)?;

        let record = store
            .get(token)
            .await
            .map_err(|err| ServiceError::Backend(err.to_string()))?
            .ok_or(ServiceError::Unauthorized)?;

        if record.expires_at < Utc::now() {
            // Lazy deletion per §4.8: an expired token is purged the moment
            // it's observed rather than waiting on the sweeper's cadence.
            store
                .delete(token)
                .await
                .map_err(|err| ServiceError::Backend(err.to_string()))?;
            return Err(ServiceError::Unauthorized);
        }

        Ok(AuthenticatedClient {
            client_id: record.client_id,
        })
    }
}

fn extract_bearer(parts: &Parts) -> Result<&str, ServiceError> {
    let header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .ok_or(ServiceError::Unauthorized)?
        .to_str()
        .map_err(|_| ServiceError::Unauthorized)?;

    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or(ServiceError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{MockTokenStore, TokenStore};
    use axum::http::{HeaderMap, HeaderValue};
    use chrono::Duration;
    use std::sync::Arc;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let (mut parts, _) = http::Request::builder()
            .body(())
            .unwrap()
            .into_parts();
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        parts.headers = headers;
        parts
    }

    #[test]
    fn missing_header_is_rejected() {
        let parts = parts_with_auth(None);
        assert!(matches!(extract_bearer(&parts), Err(ServiceError::Unauthorized)));
    }

    #[test]
    fn malformed_scheme_is_rejected() {
        let parts = parts_with_auth(Some("Token abc"));
        assert!(matches!(extract_bearer(&parts), Err(ServiceError::Unauthorized)));
    }

    #[test]
    fn empty_bearer_value_is_rejected() {
        let parts = parts_with_auth(Some("Bearer "));
        assert!(matches!(extract_bearer(&parts), Err(ServiceError::Unauthorized)));
    }

    #[test]
    fn well_formed_bearer_is_extracted() {
        let parts = parts_with_auth(Some("Bearer abc123"));
        assert_eq!(extract_bearer(&parts).unwrap(), "abc123");
    }

    #[tokio::test]
    async fn expired_token_is_rejected_and_purged_from_the_store() {
        let store: SharedTokenStore = Arc::new(MockTokenStore::new());
        store
            .save("stale-token", "client-a", Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        let mut parts = parts_with_auth(Some("Bearer stale-token"));
        let result = AuthenticatedClient::from_request_parts(&mut parts, &store).await;

        assert!(matches!(result, Err(ServiceError::Unauthorized)));
        assert!(store.get("stale-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unexpired_token_is_accepted_and_kept_in_the_store() {
        let store: SharedTokenStore = Arc::new(MockTokenStore::new());
        store
            .save("fresh-token", "client-a", Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let mut parts = parts_with_auth(Some("Bearer fresh-token"));
        let client = AuthenticatedClient::from_request_parts(&mut parts, &store)
            .await
            .unwrap();

        assert_eq!(client.client_id, "client-a");
        assert!(store.get("fresh-token").await.unwrap().is_some());
    }
}
