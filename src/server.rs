//! HTTP surface (C6): routing, `OData-Version` header, auth middleware,
//! service document, metadata, token issuance, and the three resource
//! routes. Routes are rooted at `/odata` per §4.6; the MLS redirect shares
//! the same router but its own state slice.

use crate::auth::middleware::AuthenticatedClient;
use crate::auth::oauth::token_handler;
use crate::config::AppConfig;
use crate::db::SharedGateway;
use crate::error::Result;
use crate::odata::metadata::{csdl_xml, service_document};
use crate::odata::query_builder::RawQueryOptions;
use crate::redirect::redirect_to_listing;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

const RESOURCE_NAMES: &[&str] = &["Property", "Member", "Office"];

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

impl Server {
    pub fn new(config: AppConfig, gateway: SharedGateway, token_store: crate::auth::store::SharedTokenStore) -> Self {
        let config = Arc::new(config);
        let state = AppState::new((*config).clone(), gateway, token_store);
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/odata/", get(service_document_handler))
            .route("/odata/$metadata", get(metadata_handler))
            .route("/odata/token", post(token_handler))
            .route("/odata/Property", get(list_property))
            .route("/odata/Property/:key", get(get_property))
            .route("/odata/Member", get(list_member))
            .route("/odata/Member/:key", get(get_member))
            .route("/odata/Office", get(list_office))
            .route("/odata/Office/:key", get(get_office))
            .route("/r/:mls_number", get(redirect_to_listing))
            .with_state(self.state.clone())
            .layer(axum::middleware::map_response(with_odata_version))
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::map_request(rewrite_entity_key_paths))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "mls-odata-gateway listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// OData canonical entity URLs are `<Set>('<key>')` — a single path segment
/// with the key embedded in parentheses, which axum's router can't match as
/// a named param (params must occupy a whole segment). Rewritten here, once,
/// before routing: `/odata/Property('MLS-1')` becomes `/odata/Property/'MLS-1'`
/// so the ordinary `:key` route captures it; quotes are preserved and
/// stripped by the resource driver itself.
async fn rewrite_entity_key_paths(mut request: Request) -> Request {
    if let Some(rewritten) = rewritten_path_and_query(request.uri()) {
        let mut parts = request.uri().clone().into_parts();
        parts.path_and_query = Some(rewritten);
        if let Ok(new_uri) = Uri::from_parts(parts) {
            *request.uri_mut() = new_uri;
        }
    }
    request
}

fn rewritten_path_and_query(uri: &Uri) -> Option<axum::http::uri::PathAndQuery> {
    let path = uri.path();
    for name in RESOURCE_NAMES {
        let prefix = format!("/odata/{name}(");
        let Some(rest) = path.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let Some(inner) = rest.strip_suffix(')') else {
            continue;
        };
        let new_path = format!("/odata/{name}/{inner}");
        let full = match uri.query() {
            Some(q) => format!("{new_path}?{q}"),
            None => new_path,
        };
        return full.parse().ok();
    }
    None
}

async fn with_odata_version(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert("OData-Version", HeaderValue::from_static("4.0"));
    response
}

async fn service_document_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(service_document(&state.config.base_url))
}

async fn metadata_handler() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        csdl_xml(),
    )
        .into_response()
}

/// Raw `$`-prefixed query options as they arrive on the wire. Kept as a
/// flat string map since serde field names can't start with `$`; translated
/// into `RawQueryOptions` per request.
fn query_options(raw: &HashMap<String, String>) -> RawQueryOptions<'_> {
    RawQueryOptions {
        select: raw.get("$select").map(String::as_str),
        filter: raw.get("$filter").map(String::as_str),
        orderby: raw.get("$orderby").map(String::as_str),
        top: raw.get("$top").map(String::as_str),
        skip: raw.get("$skip").map(String::as_str),
        count: raw.get("$count").map(|v| v == "true").unwrap_or(false),
        expand: raw.get("$expand").map(String::as_str),
    }
}

async fn list_property(
    State(state): State<AppState>,
    _client: AuthenticatedClient,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let envelope = state.property_driver().list(query_options(&raw)).await?;
    Ok(Json(envelope))
}

async fn get_property(
    State(state): State<AppState>,
    _client: AuthenticatedClient,
    Path(key): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let envelope = state.property_driver().get(&key, query_options(&raw)).await?;
    Ok(Json(envelope))
}

async fn list_member(
    State(state): State<AppState>,
    _client: AuthenticatedClient,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let envelope = state.member_driver().list(query_options(&raw)).await?;
    Ok(Json(envelope))
}

async fn get_member(
    State(state): State<AppState>,
    _client: AuthenticatedClient,
    Path(key): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let envelope = state.member_driver().get(&key, query_options(&raw)).await?;
    Ok(Json(envelope))
}

async fn list_office(
    State(state): State<AppState>,
    _client: AuthenticatedClient,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let envelope = state.office_driver().list(query_options(&raw)).await?;
    Ok(Json(envelope))
}

async fn get_office(
    State(state): State<AppState>,
    _client: AuthenticatedClient,
    Path(key): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let envelope = state.office_driver().get(&key, query_options(&raw)).await?;
    Ok(Json(envelope))
}
