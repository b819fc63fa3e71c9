use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub base_url: String,

    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    pub pg_connection_string: String,
    pub token_store_pool_max_size: u32,

    pub mssql_host: String,
    pub mssql_port: u16,
    pub mssql_database: String,
    pub mssql_user: String,
    pub mssql_password: String,
    pub mssql_encrypt: bool,
    pub db_pool_max_size: u32,
    pub db_request_timeout: Duration,

    pub default_top: i64,
    pub max_top: i64,
    pub cleanup_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    listen_addr: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default = "default_base_url")]
    base_url: String,

    oauth_client_id: String,
    oauth_client_secret: String,
    pg_connection_string: String,
    #[serde(default = "default_token_pool_size")]
    token_store_pool_max_size: u32,

    #[serde(default = "default_mssql_host")]
    mssql_host: String,
    #[serde(default = "default_mssql_port")]
    mssql_port: u16,
    #[serde(default)]
    mssql_database: String,
    #[serde(default)]
    mssql_user: String,
    #[serde(default)]
    mssql_password: String,
    #[serde(default = "default_true")]
    mssql_encrypt: bool,
    #[serde(default = "default_pool_size")]
    db_pool_max_size: u32,
    #[serde(default = "default_timeout_secs")]
    db_request_timeout_secs: u64,

    #[serde(default = "default_top")]
    default_top: i64,
    #[serde(default = "default_max_top")]
    max_top: i64,
    #[serde(default = "default_cleanup_interval_secs")]
    cleanup_interval_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_token_pool_size() -> u32 {
    10
}

fn default_mssql_host() -> String {
    "localhost".to_string()
}

const fn default_mssql_port() -> u16 {
    1433
}

const fn default_true() -> bool {
    true
}

const fn default_pool_size() -> u32 {
    10
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_top() -> i64 {
    100
}

const fn default_max_top() -> i64 {
    1000
}

const fn default_cleanup_interval_secs() -> u64 {
    300
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig = envy::from_env().context("failed to parse environment variables")?;

        let listen_addr = resolve_addr(raw.listen_addr, raw.port)?;

        Ok(Self {
            listen_addr,
            base_url: raw.base_url,
            oauth_client_id: raw.oauth_client_id,
            oauth_client_secret: raw.oauth_client_secret,
            pg_connection_string: raw.pg_connection_string,
            token_store_pool_max_size: raw.token_store_pool_max_size,
            mssql_host: raw.mssql_host,
            mssql_port: raw.mssql_port,
            mssql_database: raw.mssql_database,
            mssql_user: raw.mssql_user,
            mssql_password: raw.mssql_password,
            mssql_encrypt: raw.mssql_encrypt,
            db_pool_max_size: raw.db_pool_max_size,
            db_request_timeout: Duration::from_secs(raw.db_request_timeout_secs.max(1)),
            default_top: raw.default_top.max(1),
            max_top: raw.max_top.max(raw.default_top),
            cleanup_interval: Duration::from_secs(raw.cleanup_interval_secs.max(1)),
        })
    }

    /// Builds a config for tests/embedding that never touches the network
    /// until a gateway/token-store implementation is wired in explicitly.
    pub fn embedded() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".parse().expect("valid socket addr"),
            base_url: default_base_url(),
            oauth_client_id: "test-client".to_string(),
            oauth_client_secret: "test-secret".to_string(),
            pg_connection_string: String::new(),
            token_store_pool_max_size: default_token_pool_size(),
            mssql_host: default_mssql_host(),
            mssql_port: default_mssql_port(),
            mssql_database: String::new(),
            mssql_user: String::new(),
            mssql_password: String::new(),
            mssql_encrypt: false,
            db_pool_max_size: default_pool_size(),
            db_request_timeout: Duration::from_secs(default_timeout_secs()),
            default_top: default_top(),
            max_top: default_max_top(),
            cleanup_interval: Duration::from_secs(default_cleanup_interval_secs()),
        }
    }
}

fn resolve_addr(addr: Option<String>, port: Option<u16>) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid LISTEN_ADDR value")?
            .next()
            .context("LISTEN_ADDR resolved to no addresses");
    }

    let port = port.unwrap_or(8080);
    let combined = format!("0.0.0.0:{port}");
    combined
        .to_socket_addrs()
        .context("invalid listen port")?
        .next()
        .context("listen address resolved to no targets")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_has_sane_defaults() {
        let config = AppConfig::embedded();
        assert_eq!(config.default_top, 100);
        assert_eq!(config.max_top, 1000);
        assert!(config.db_pool_max_size > 0);
    }

    #[test]
    fn resolve_addr_falls_back_to_default_port() {
        let addr = resolve_addr(None, None).unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn resolve_addr_honors_explicit_port() {
        let addr = resolve_addr(None, Some(9091)).unwrap();
        assert_eq!(addr.port(), 9091);
    }
}
