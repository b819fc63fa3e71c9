//! DB gateway collaborator (§1, §5): an opaque `query(sql, params) -> rows`
//! interface. Out of core scope except for the contract it presents — the
//! core only observes success, failure, and transient-disconnect errors.
//! `TiberiusGateway` is one concrete implementation reaching SQL Server
//! directly (the spec's SSH tunnel is a deployment detail this port doesn't
//! reproduce; see DESIGN.md). `MockGateway` backs the hermetic test suite.

use crate::config::AppConfig;
use crate::value::{Param, Row, Value};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config as TiberiusConfig};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Database not connected")]
    NotConnected,
    #[error("database error: {0}")]
    Query(String),
}

/// The contract the core observes: success, failure, or a transient
/// disconnect. Anything more specific is the gateway's business.
#[async_trait]
pub trait DbGateway: Send + Sync {
    async fn query(&self, sql: &str, params: &[(String, Param)]) -> Result<Vec<Row>, GatewayError>;
}

pub struct TiberiusGateway {
    config: TiberiusConfig,
    client: Mutex<Option<Client<Compat<TcpStream>>>>,
    /// Bounds both the reconnect wait and each query round-trip (§5's
    /// "DB-layer request timeout is 30s (configurable)").
    request_timeout: Duration,
}

impl TiberiusGateway {
    pub fn new(config: &AppConfig) -> Self {
        let mut tiberius_config = TiberiusConfig::new();
        tiberius_config.host(&config.mssql_host);
        tiberius_config.port(config.mssql_port);
        tiberius_config.database(&config.mssql_database);
        tiberius_config.authentication(AuthMethod::sql_server(
            &config.mssql_user,
            &config.mssql_password,
        ));
        if config.mssql_encrypt {
            tiberius_config.encryption(tiberius::EncryptionLevel::Required);
        } else {
            tiberius_config.encryption(tiberius::EncryptionLevel::NotSupported);
        }
        tiberius_config.trust_cert();

        Self {
            config: tiberius_config,
            client: Mutex::new(None),
            request_timeout: config.db_request_timeout,
        }
    }

    async fn connect(&self) -> Result<Client<Compat<TcpStream>>, GatewayError> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(|err| GatewayError::Query(err.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|err| GatewayError::Query(err.to_string()))?;
        Client::connect(self.config.clone(), tcp.compat_write())
            .await
            .map_err(|err| GatewayError::Query(err.to_string()))
    }

    async fn ensure_connected(&self) -> Result<(), GatewayError> {
        let mut guard = self.client.lock().await;
        if guard.is_none() {
            let client = tokio::time::timeout(self.request_timeout, self.connect())
                .await
                .map_err(|_| GatewayError::NotConnected)??;
            *guard = Some(client);
        }
        Ok(())
    }

    async fn run_query(
        &self,
        sql: &str,
        bound: &[Param],
    ) -> Result<Vec<Row>, tiberius::error::Error> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().expect("ensure_connected populated this");

        let mut query = tiberius::Query::new(sql);
        for param in bound {
            bind_param(&mut query, param);
        }
        let stream = query.query(client).await?;
        let rows = stream.into_first_result().await?;
        Ok(rows.into_iter().map(decode_row).collect())
    }
}

fn is_transient(err: &tiberius::error::Error) -> bool {
    matches!(err, tiberius::error::Error::Io { .. })
}

#[async_trait]
impl DbGateway for TiberiusGateway {
    async fn query(&self, sql: &str, params: &[(String, Param)]) -> Result<Vec<Row>, GatewayError> {
        self.ensure_connected().await?;

        let bound: Vec<Param> = params.iter().map(|(_, v)| v.clone()).collect();
        let outcome = tokio::time::timeout(self.request_timeout, self.run_query(sql, &bound))
            .await
            .map_err(|_| GatewayError::NotConnected)?;
        match outcome {
            Ok(rows) => Ok(rows),
            Err(err) => {
                if is_transient(&err) {
                    warn!(error = %err, "gateway lost connection, will reconnect on next call");
                    *self.client.lock().await = None;
                } else {
                    error!(error = %err, "gateway query failed");
                }
                Err(GatewayError::Query(err.to_string()))
            }
        }
    }
}

fn bind_param(query: &mut tiberius::Query<'_>, param: &Param) {
    match param {
        Param::Str(s) => query.bind(s.clone()),
        Param::Int(i) => query.bind(*i),
        Param::Float(f) => query.bind(*f),
        Param::Bool(b) => query.bind(*b),
        Param::Null => query.bind(Option::<i64>::None),
    }
}

fn decode_row(row: tiberius::Row) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let name = col.name().to_string();
            let value = decode_cell(&row, idx);
            (name, value)
        })
        .collect()
}

fn decode_cell(row: &tiberius::Row, idx: usize) -> Value {
    if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return Value::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return Value::Int(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return Value::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
        return Value::Bool(v);
    }
    Value::Null
}

/// Records every `(sql, params)` call for assertions and returns scripted
/// rows in FIFO order — the test harness's stand-in for a live SQL Server.
#[derive(Default)]
pub struct MockGateway {
    calls: SyncMutex<Vec<(String, Vec<(String, Param)>)>>,
    responses: SyncMutex<std::collections::VecDeque<Vec<Row>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, rows: Vec<Row>) {
        self.responses.lock().push_back(rows);
    }

    pub fn calls(&self) -> Vec<(String, Vec<(String, Param)>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DbGateway for MockGateway {
    async fn query(&self, sql: &str, params: &[(String, Param)]) -> Result<Vec<Row>, GatewayError> {
        self.calls.lock().push((sql.to_string(), params.to_vec()));
        Ok(self.responses.lock().pop_front().unwrap_or_default())
    }
}

pub type SharedGateway = Arc<dyn DbGateway>;

pub fn log_gateway_ready() {
    info!("database gateway ready");
}
