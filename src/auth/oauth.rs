//! Token issuance endpoint (§4.8): `POST /token` supporting the
//! `client_credentials` and `refresh_token` grants (RFC 6749 §4.4, §6).

use super::store::SharedTokenStore;
use crate::error::ServiceError;
use axum::{extract::State, Form, Json};
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    grant_type: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: i64,
    refresh_token: String,
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `client_credentials`: the caller proves identity with a client id/secret
/// pair configured at startup (§4.8). There is exactly one registered
/// client in this gateway's deployment model.
async fn issue_client_credentials(
    store: &SharedTokenStore,
    configured_id: &str,
    configured_secret: &str,
    request: &TokenRequest,
) -> Result<TokenResponse, ServiceError> {
    let client_id = request.client_id.as_deref().unwrap_or_default();
    let client_secret = request.client_secret.as_deref().unwrap_or_default();

    if client_id != configured_id || client_secret != configured_secret {
        return Err(ServiceError::OAuth {
            slug: "invalid_client",
            description: Some("client_id or client_secret is invalid".to_string()),
        });
    }

    issue_tokens(store, client_id).await
}

/// `refresh_token`: exchanges an unexpired refresh token for a fresh access
/// token. Per §4.8 the refresh token itself is *not* rotated — the same
/// value is persisted against the new access token's client and returned
/// unchanged.
async fn issue_refresh(
    store: &SharedTokenStore,
    request: &TokenRequest,
) -> Result<TokenResponse, ServiceError> {
    let presented = request.refresh_token.as_deref().ok_or(ServiceError::OAuth {
        slug: "invalid_request",
        description: Some("refresh_token is required".to_string()),
    })?;

    let record = store
        .get_refresh(presented)
        .await
        .map_err(|err| ServiceError::Backend(err.to_string()))?
        .ok_or(ServiceError::OAuth {
            slug: "invalid_grant",
            description: Some("refresh_token is unknown or expired".to_string()),
        })?;

    if record.expires_at < Utc::now() {
        store
            .delete_refresh(presented)
            .await
            .map_err(|err| ServiceError::Backend(err.to_string()))?;
        return Err(ServiceError::OAuth {
            slug: "invalid_grant",
            description: Some("refresh_token is unknown or expired".to_string()),
        });
    }

    let access_token = random_token();
    let now = Utc::now();
    store
        .save(&access_token, &record.client_id, now + Duration::seconds(ACCESS_TOKEN_TTL_SECS))
        .await
        .map_err(|err| ServiceError::Backend(err.to_string()))?;
    // Re-persist the same refresh token so its row (and expiry) survives
    // this grant untouched, per §4.8.
    store
        .save_refresh(presented, &record.client_id, record.expires_at)
        .await
        .map_err(|err| ServiceError::Backend(err.to_string()))?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: ACCESS_TOKEN_TTL_SECS,
        refresh_token: presented.to_string(),
    })
}

async fn issue_tokens(store: &SharedTokenStore, client_id: &str) -> Result<TokenResponse, ServiceError> {
    let access_token = random_token();
    let refresh_token = random_token();
    let now = Utc::now();

    store
        .save(&access_token, client_id, now + Duration::seconds(ACCESS_TOKEN_TTL_SECS))
        .await
        .map_err(|err| ServiceError::Backend(err.to_string()))?;
    store
        .save_refresh(&refresh_token, client_id, now + Duration::days(REFRESH_TOKEN_TTL_DAYS))
        .await
        .map_err(|err| ServiceError::Backend(err.to_string()))?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: ACCESS_TOKEN_TTL_SECS,
        refresh_token,
    })
}

#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
}

pub async fn token_handler(
    State(store): State<SharedTokenStore>,
    State(config): State<OAuthConfig>,
    Form(request): Form<TokenRequest>,
) -> Result<Json<Value>, ServiceError> {
    let response = match request.grant_type.as_str() {
        "client_credentials" => {
            issue_client_credentials(&store, &config.client_id, &config.client_secret, &request).await?
        }
        "refresh_token" => issue_refresh(&store, &request).await?,
        other => {
            return Err(ServiceError::OAuth {
                slug: "unsupported_grant_type",
                description: Some(format!("grant_type '{other}' is not supported")),
            })
        }
    };

    Ok(Json(serde_json::to_value(response).expect("TokenResponse always serializes")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{MockTokenStore, TokenStore};
    use std::sync::Arc;

    fn store() -> SharedTokenStore {
        Arc::new(MockTokenStore::new())
    }

    #[tokio::test]
    async fn client_credentials_succeeds_with_matching_secret() {
        let store = store();
        let request = TokenRequest {
            grant_type: "client_credentials".to_string(),
            client_id: Some("client-a".to_string()),
            client_secret: Some("secret".to_string()),
            refresh_token: None,
        };
        let response = issue_client_credentials(&store, "client-a", "secret", &request)
            .await
            .unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, ACCESS_TOKEN_TTL_SECS);
        assert!(store.get(&response.access_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn client_credentials_rejects_wrong_secret() {
        let store = store();
        let request = TokenRequest {
            grant_type: "client_credentials".to_string(),
            client_id: Some("client-a".to_string()),
            client_secret: Some("wrong".to_string()),
            refresh_token: None,
        };
        let err = issue_client_credentials(&store, "client-a", "secret", &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::OAuth { slug: "invalid_client", .. }));
    }

    #[tokio::test]
    async fn refresh_token_issues_new_access_token_but_keeps_same_refresh_token() {
        let store = store();
        store
            .save_refresh("old-refresh", "client-a", Utc::now() + Duration::days(1))
            .await
            .unwrap();

        let request = TokenRequest {
            grant_type: "refresh_token".to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: Some("old-refresh".to_string()),
        };
        let response = issue_refresh(&store, &request).await.unwrap();
        assert_eq!(response.refresh_token, "old-refresh");
        assert!(store.get_refresh("old-refresh").await.unwrap().is_some());
        assert!(store.get(&response.access_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_token_rejects_expired_token() {
        let store = store();
        store
            .save_refresh("expired", "client-a", Utc::now() - Duration::days(1))
            .await
            .unwrap();

        let request = TokenRequest {
            grant_type: "refresh_token".to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: Some("expired".to_string()),
        };
        let err = issue_refresh(&store, &request).await.unwrap_err();
        assert!(matches!(err, ServiceError::OAuth { slug: "invalid_grant", .. }));
    }

    #[tokio::test]
    async fn unsupported_grant_type_is_rejected() {
        let store = store();
        let request = TokenRequest {
            grant_type: "password".to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
        };
        let result = match request.grant_type.as_str() {
            "client_credentials" => unreachable!(),
            "refresh_token" => unreachable!(),
            other => Err::<TokenResponse, ServiceError>(ServiceError::OAuth {
                slug: "unsupported_grant_type",
                description: Some(format!("grant_type '{other}' is not supported")),
            }),
        };
        let _ = &store;
        assert!(matches!(
            result.unwrap_err(),
            ServiceError::OAuth { slug: "unsupported_grant_type", .. }
        ));
    }
}
