//! # passrelay
//!
//! A password vault split across three cooperating HTTP services.
//!
//! ```text
//!                      ┌────────────────────┐
//!   client ──Bearer──▶ │    secret store    │ ──▶ passwords table
//!                      └─────┬────────┬─────┘
//!                   /verify  │        │  /encrypt, /decrypt
//!                            ▼        ▼
//!               ┌──────────────┐  ┌──────────────┐
//!               │   identity   │  │    crypto    │
//!               │ users + JWT  │  │  AES-256-GCM │
//!               └──────────────┘  └──────────────┘
//! ```
//!
//! No single service holds both the ciphertext and the key. The secret store keeps
//! ciphertext keyed by owner, the crypto service keeps the key, and the identity service
//! decides who the owner is.
//!
//! ## Modules
//! - `identity`: registration, login and token verification
//! - `crypto`: the symmetric key and encrypt/decrypt endpoints
//! - `vault`: per-owner secret CRUD, calling the other two over HTTP
//! - `config`, `error`, `db`, `server`, `util`: shared plumbing

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod identity;
pub mod server;
pub mod util;
pub mod vault;

pub use config::{ConfigError, CryptoConfig, IdentityConfig, StoreConfig};
pub use error::ApiError;
