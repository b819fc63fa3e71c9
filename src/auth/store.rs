//! Persisted token store (§4.8, §6): `oauth_tokens` / `oauth_refresh_tokens`
//! tables, each indexed on `expires_at`. Built on `tokio-postgres` + `bb8`,
//! mirroring the connection-pool discipline the teacher's `db.rs` uses for
//! its own Postgres-backed store (max 10 connections, one statement per
//! acquire-release cycle).

use crate::config::AppConfig;
use async_trait::async_trait;
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::Mutex;
use tokio_postgres::NoTls;

#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
}

/// External store contract (§4.8): save/get/delete for both access and
/// refresh tokens, plus a `cleanup` the sweeper drives on a cadence and
/// `init`/`close` lifecycle hooks.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn init(&self) -> anyhow::Result<()>;
    async fn save(&self, token: &str, client_id: &str, expires_at: DateTime<Utc>) -> anyhow::Result<()>;
    async fn get(&self, token: &str) -> anyhow::Result<Option<TokenRecord>>;
    async fn delete(&self, token: &str) -> anyhow::Result<()>;
    async fn save_refresh(&self, token: &str, client_id: &str, expires_at: DateTime<Utc>) -> anyhow::Result<()>;
    async fn get_refresh(&self, token: &str) -> anyhow::Result<Option<TokenRecord>>;
    async fn delete_refresh(&self, token: &str) -> anyhow::Result<()>;
    /// Purges expired rows from both tables; returns the number removed.
    async fn cleanup(&self) -> anyhow::Result<u64>;
    async fn close(&self) -> anyhow::Result<()>;
}

pub struct PgTokenStore {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

impl PgTokenStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let manager = PostgresConnectionManager::new_from_stringlike(
            config.pg_connection_string.clone(),
            NoTls,
        )?;
        let pool = Pool::builder()
            .max_size(config.token_store_pool_max_size)
            .build(manager)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn init(&self) -> anyhow::Result<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(
            "CREATE TABLE IF NOT EXISTS oauth_tokens (
                access_token TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS oauth_tokens_expires_at_idx ON oauth_tokens (expires_at);
            CREATE TABLE IF NOT EXISTS oauth_refresh_tokens (
                refresh_token TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS oauth_refresh_tokens_expires_at_idx ON oauth_refresh_tokens (expires_at);",
        )
        .await?;
        Ok(())
    }

    async fn save(&self, token: &str, client_id: &str, expires_at: DateTime<Utc>) -> anyhow::Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "INSERT INTO oauth_tokens (access_token, client_id, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (access_token) DO UPDATE SET client_id = EXCLUDED.client_id, expires_at = EXCLUDED.expires_at",
            &[&token, &client_id, &expires_at],
        )
        .await?;
        Ok(())
    }

    async fn get(&self, token: &str) -> anyhow::Result<Option<TokenRecord>> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT client_id, expires_at FROM oauth_tokens WHERE access_token = $1",
                &[&token],
            )
            .await?;
        Ok(row.map(|r| TokenRecord {
            client_id: r.get(0),
            expires_at: r.get(1),
        }))
    }

    async fn delete(&self, token: &str) -> anyhow::Result<()> {
        let conn = self.pool.get().await?;
        conn.execute("DELETE FROM oauth_tokens WHERE access_token = $1", &[&token])
            .await?;
        Ok(())
    }

    async fn save_refresh(&self, token: &str, client_id: &str, expires_at: DateTime<Utc>) -> anyhow::Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "INSERT INTO oauth_refresh_tokens (refresh_token, client_id, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (refresh_token) DO UPDATE SET client_id = EXCLUDED.client_id, expires_at = EXCLUDED.expires_at",
            &[&token, &client_id, &expires_at],
        )
        .await?;
        Ok(())
    }

    async fn get_refresh(&self, token: &str) -> anyhow::Result<Option<TokenRecord>> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT client_id, expires_at FROM oauth_refresh_tokens WHERE refresh_token = $1",
                &[&token],
            )
            .await?;
        Ok(row.map(|r| TokenRecord {
            client_id: r.get(0),
            expires_at: r.get(1),
        }))
    }

    async fn delete_refresh(&self, token: &str) -> anyhow::Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "DELETE FROM oauth_refresh_tokens WHERE refresh_token = $1",
            &[&token],
        )
        .await?;
        Ok(())
    }

    async fn cleanup(&self) -> anyhow::Result<u64> {
        let conn = self.pool.get().await?;
        let a = conn
            .execute("DELETE FROM oauth_tokens WHERE expires_at < now()", &[])
            .await?;
        let b = conn
            .execute(
                "DELETE FROM oauth_refresh_tokens WHERE expires_at < now()",
                &[],
            )
            .await?;
        Ok(a + b)
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-memory store for the hermetic test harness; same contract, no
/// network.
#[derive(Default)]
pub struct MockTokenStore {
    tokens: Mutex<HashMap<String, TokenRecord>>,
    refresh_tokens: Mutex<HashMap<String, TokenRecord>>,
}

impl MockTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn save(&self, token: &str, client_id: &str, expires_at: DateTime<Utc>) -> anyhow::Result<()> {
        self.tokens.lock().insert(
            token.to_string(),
            TokenRecord {
                client_id: client_id.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, token: &str) -> anyhow::Result<Option<TokenRecord>> {
        Ok(self.tokens.lock().get(token).cloned())
    }

    async fn delete(&self, token: &str) -> anyhow::Result<()> {
        self.tokens.lock().remove(token);
        Ok(())
    }

    async fn save_refresh(&self, token: &str, client_id: &str, expires_at: DateTime<Utc>) -> anyhow::Result<()> {
        self.refresh_tokens.lock().insert(
            token.to_string(),
            TokenRecord {
                client_id: client_id.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_refresh(&self, token: &str) -> anyhow::Result<Option<TokenRecord>> {
        Ok(self.refresh_tokens.lock().get(token).cloned())
    }

    async fn delete_refresh(&self, token: &str) -> anyhow::Result<()> {
        self.refresh_tokens.lock().remove(token);
        Ok(())
    }

    async fn cleanup(&self) -> anyhow::Result<u64> {
        let now = Utc::now();
        let mut removed = 0u64;
        self.tokens.lock().retain(|_, record| {
            let keep = record.expires_at >= now;
            if !keep {
                removed += 1;
            }
            keep
        });
        self.refresh_tokens.lock().retain(|_, record| {
            let keep = record.expires_at >= now;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub type SharedTokenStore = Arc<dyn TokenStore>;
