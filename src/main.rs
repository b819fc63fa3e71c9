use mls_odata_gateway::auth::store::{PgTokenStore, SharedTokenStore, TokenStore};
use mls_odata_gateway::auth::sweeper;
use mls_odata_gateway::config::AppConfig;
use mls_odata_gateway::db::{log_gateway_ready, SharedGateway, TiberiusGateway};
use mls_odata_gateway::server::Server;
use mls_odata_gateway::telemetry;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = AppConfig::from_env()?;

    let gateway: SharedGateway = Arc::new(TiberiusGateway::new(&config));
    log_gateway_ready();

    let token_store: SharedTokenStore = Arc::new(PgTokenStore::connect(&config).await?);
    token_store.init().await?;

    let _sweeper = sweeper::spawn(token_store.clone(), config.cleanup_interval);

    let server = Server::new(config, gateway, token_store);
    server.run().await
}
