//! Identity service.
//!
//! Owns identity records and is the only issuer and verifier of bearer tokens.
//!
//! ## Endpoints
//!
//! - `POST /register` - Create an identity and mint a token
//! - `POST /login` - Check credentials and mint a fresh token
//! - `POST /verify` - Resolve a token to its owner (no side effects)
//! - `GET /health` - Health check

mod api;
pub mod password;
pub mod store;
pub mod token;

use chrono::Duration;

pub use api::{router, LoginResponse, RegisterResponse, VerifyResponse};
pub use store::{PublicUser, User, UserStore};
pub use token::{Claims, IssuedToken, TokenIssuer};

use crate::config::IdentityConfig;
use crate::db::StoreError;

/// Shared state for identity handlers.
pub struct IdentityState {
    pub users: UserStore,
    pub tokens: TokenIssuer,
    pub password_iterations: u32,
}

impl IdentityState {
    pub async fn from_config(config: &IdentityConfig) -> Result<Self, StoreError> {
        let users = UserStore::open(&config.database_path).await?;
        Ok(Self {
            users,
            tokens: TokenIssuer::new(&config.jwt_secret, Duration::hours(config.token_ttl_hours)),
            password_iterations: config.password_iterations,
        })
    }
}
