//! Secret store entry point.

use std::sync::Arc;

use passrelay::{config::StoreConfig, server, vault};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::init_tracing();

    let config = StoreConfig::from_env()?;
    info!(
        "Loaded configuration: identity={}, crypto={}, timeout={:?}",
        config.identity_url, config.crypto_url, config.upstream_timeout
    );

    let state = vault::VaultState::from_config(&config).await?;
    let app = vault::router(Arc::new(state));

    server::serve(app, &config.addr(), "secret store").await
}
