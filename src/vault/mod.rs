//! Secret store: per-owner password records, encrypted at rest.
//!
//! Endpoints (all `/passwords` routes require `Authorization: Bearer <token>`):
//!
//! - `GET    /passwords`     list the owner's records, ciphertext only
//! - `POST   /passwords`     create a record
//! - `GET    /passwords/:id` one record with its decrypted password
//! - `PUT    /passwords/:id` replace site, username and password
//! - `DELETE /passwords/:id` remove a record
//! - `GET    /health`
//!
//! This service holds no key and no users. Tokens are checked with the identity
//! service and passwords are encrypted by the crypto service.

mod api;
pub mod auth;
pub mod store;
pub mod upstream;

use std::sync::Arc;

use anyhow::Context;

pub use api::{router, CreatedResponse, ListResponse, MessageResponse, RevealedSecret};
pub use store::{SecretRecord, SecretStore};
pub use upstream::{
    http_client, Encryptor, HttpCryptoClient, HttpIdentityClient, Owner, TokenVerifier,
    UpstreamError,
};

use crate::config::StoreConfig;

pub struct VaultState {
    pub secrets: SecretStore,
    pub verifier: Arc<dyn TokenVerifier>,
    pub encryptor: Arc<dyn Encryptor>,
}

impl VaultState {
    pub fn new(
        secrets: SecretStore,
        verifier: Arc<dyn TokenVerifier>,
        encryptor: Arc<dyn Encryptor>,
    ) -> Self {
        Self {
            secrets,
            verifier,
            encryptor,
        }
    }

    /// Open the database and build HTTP clients for both upstream services.
    pub async fn from_config(config: &StoreConfig) -> anyhow::Result<Self> {
        let secrets = SecretStore::open(&config.database_path)
            .await
            .with_context(|| format!("opening {}", config.database_path.display()))?;

        let client = http_client(config.upstream_timeout).context("building HTTP client")?;

        Ok(Self::new(
            secrets,
            Arc::new(HttpIdentityClient::new(&config.identity_url, client.clone())),
            Arc::new(HttpCryptoClient::new(&config.crypto_url, client)),
        ))
    }
}
