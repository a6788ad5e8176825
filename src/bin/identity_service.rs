//! Identity service entry point.

use std::sync::Arc;

use passrelay::{config::IdentityConfig, identity, server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::init_tracing();

    let config = IdentityConfig::from_env()?;
    info!(
        "Loaded configuration: database={}, token_ttl={}h",
        config.database_path.display(),
        config.token_ttl_hours
    );

    let state = identity::IdentityState::from_config(&config).await?;
    let app = identity::router(Arc::new(state));

    server::serve(app, &config.addr(), "identity service").await
}
