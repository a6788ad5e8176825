//! Clients for the two services the secret store depends on.
//!
//! Both sit behind traits so handlers only see typed results. The HTTP clients share one
//! `reqwest::Client` configured with the upstream timeout. Calls are never retried.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::error::ApiError;

/// Identity resolved from a bearer token. Scopes every secret-store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure, timeout.
    #[error("{service} unreachable: {message}")]
    Unreachable {
        service: &'static str,
        message: String,
    },

    #[error("{service} answered {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },

    #[error("{service} sent an unexpected response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

/// Resolves bearer tokens to owners.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Ok(None)` means the token is invalid or expired. `Err` means the verifier itself
    /// could not answer; callers must fail closed.
    async fn verify(&self, token: &str) -> Result<Option<Owner>, UpstreamError>;
}

/// Turns plaintext into ciphertext and back. Never sees an owner.
#[async_trait]
pub trait Encryptor: Send + Sync {
    async fn encrypt(&self, plaintext: &str) -> Result<String, UpstreamError>;

    async fn decrypt(&self, ciphertext: &str) -> Result<String, UpstreamError>;
}

const IDENTITY: &str = "identity service";
const CRYPTO: &str = "crypto service";

fn transport_error(service: &'static str, e: reqwest::Error) -> UpstreamError {
    let message = if e.is_timeout() {
        "timed out".to_string()
    } else {
        e.to_string()
    };
    UpstreamError::Unreachable { service, message }
}

/// Build the shared HTTP client with the per-call timeout.
///
/// Service-to-service calls go direct; proxy environment variables are ignored.
pub fn http_client(timeout: std::time::Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .no_proxy()
        .build()
}

#[derive(Clone)]
pub struct HttpIdentityClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpIdentityClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    valid: bool,
    user_id: i64,
    username: String,
    email: String,
}

#[async_trait]
impl TokenVerifier for HttpIdentityClient {
    async fn verify(&self, token: &str) -> Result<Option<Owner>, UpstreamError> {
        let resp = self
            .client
            .post(format!("{}/verify", self.base_url))
            .json(&json!({ "token": token }))
            .send()
            .await
            .map_err(|e| transport_error(IDENTITY, e))?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
                return Ok(None)
            }
            status => {
                return Err(UpstreamError::Status {
                    service: IDENTITY,
                    status,
                })
            }
        }

        let body: VerifyBody = resp.json().await.map_err(|e| UpstreamError::Malformed {
            service: IDENTITY,
            message: e.to_string(),
        })?;

        if !body.valid {
            return Ok(None);
        }
        Ok(Some(Owner {
            user_id: body.user_id,
            username: body.username,
            email: body.email,
        }))
    }
}

#[derive(Clone)]
pub struct HttpCryptoClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCryptoClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, UpstreamError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(CRYPTO, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                service: CRYPTO,
                status,
            });
        }

        resp.json().await.map_err(|e| UpstreamError::Malformed {
            service: CRYPTO,
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct EncryptBody {
    encrypted_password: String,
}

#[derive(Debug, Deserialize)]
struct DecryptBody {
    password: String,
}

#[async_trait]
impl Encryptor for HttpCryptoClient {
    async fn encrypt(&self, plaintext: &str) -> Result<String, UpstreamError> {
        let body: EncryptBody = self
            .call("/encrypt", json!({ "password": plaintext }))
            .await?;
        // An empty or unchanged value would mean plaintext ends up persisted.
        if body.encrypted_password.is_empty() || body.encrypted_password == plaintext {
            return Err(UpstreamError::Malformed {
                service: CRYPTO,
                message: "ciphertext missing or equal to input".to_string(),
            });
        }
        Ok(body.encrypted_password)
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, UpstreamError> {
        let body: DecryptBody = self
            .call("/decrypt", json!({ "encrypted_password": ciphertext }))
            .await?;
        Ok(body.password)
    }
}
