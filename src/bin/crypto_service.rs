//! Crypto service entry point.

use std::sync::Arc;

use passrelay::{
    config::CryptoConfig,
    crypto::{self, Cipher, KeySource},
    server,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::init_tracing();

    let config = CryptoConfig::from_env()?;

    let (cipher, source) = Cipher::load_or_create(&config.key_path).await?;
    match source {
        KeySource::Loaded => info!("Loaded key from {}", config.key_path.display()),
        KeySource::Generated => warn!(
            "Generated new key at {}; ciphertext from any previous key is unreadable",
            config.key_path.display()
        ),
    }

    let app = crypto::router(Arc::new(cipher));

    server::serve(app, &config.addr(), "crypto service").await
}
