//! Shared application state: the DB gateway, the token store, the key
//! registry, and the per-resource configuration every route handler needs.
//! Cloned per request (all fields are `Arc`s or cheap owned data), matching
//! the teacher's state-sharing convention.

use crate::auth::oauth::OAuthConfig;
use crate::auth::store::SharedTokenStore;
use crate::config::AppConfig;
use crate::db::SharedGateway;
use crate::odata::key_registry::KeyRegistry;
use crate::redirect::RedirectState;
use crate::resources::{MemberDriver, OfficeDriver, PropertyDriver};
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gateway: SharedGateway,
    pub token_store: SharedTokenStore,
    pub key_registry: Arc<KeyRegistry>,
}

impl AppState {
    pub fn new(config: AppConfig, gateway: SharedGateway, token_store: SharedTokenStore) -> Self {
        Self {
            config: Arc::new(config),
            gateway,
            token_store,
            key_registry: Arc::new(KeyRegistry::new()),
        }
    }

    pub fn property_driver(&self) -> PropertyDriver {
        PropertyDriver::new(self.gateway.clone(), self.key_registry.clone(), self.config.base_url.clone())
    }

    pub fn member_driver(&self) -> MemberDriver {
        MemberDriver::new(self.gateway.clone(), self.config.base_url.clone())
    }

    pub fn office_driver(&self) -> OfficeDriver {
        OfficeDriver::new(self.gateway.clone(), self.config.base_url.clone())
    }
}

impl FromRef<AppState> for SharedTokenStore {
    fn from_ref(state: &AppState) -> Self {
        state.token_store.clone()
    }
}

impl FromRef<AppState> for OAuthConfig {
    fn from_ref(state: &AppState) -> Self {
        OAuthConfig {
            client_id: state.config.oauth_client_id.clone(),
            client_secret: state.config.oauth_client_secret.clone(),
        }
    }
}

impl FromRef<AppState> for RedirectState {
    fn from_ref(state: &AppState) -> Self {
        RedirectState { gateway: state.gateway.clone() }
    }
}
