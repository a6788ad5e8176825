//! HTTP handlers for the crypto service.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::Cipher;
use crate::error::ApiError;
use crate::util::required_raw;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EncryptRequest {
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub encrypted_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DecryptRequest {
    pub encrypted_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub password: String,
}

pub fn router(cipher: Arc<Cipher>) -> Router {
    Router::new()
        .route("/encrypt", post(encrypt))
        .route("/decrypt", post(decrypt))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(cipher)
}

/// POST /encrypt
async fn encrypt(
    State(cipher): State<Arc<Cipher>>,
    payload: Result<Json<EncryptRequest>, JsonRejection>,
) -> Result<Json<EncryptResponse>, ApiError> {
    let Json(req) = payload?;
    let password = required_raw(req.password, "password")?;

    let encrypted_password = cipher.encrypt(&password)?;
    Ok(Json(EncryptResponse { encrypted_password }))
}

/// POST /decrypt
async fn decrypt(
    State(cipher): State<Arc<Cipher>>,
    payload: Result<Json<DecryptRequest>, JsonRejection>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let Json(req) = payload?;
    let encrypted = required_raw(req.encrypted_password, "encrypted_password")?;

    let password = cipher.decrypt(&encrypted).map_err(|e| {
        tracing::debug!("Decrypt rejected: {}", e);
        e
    })?;
    Ok(Json(DecryptResponse { password }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "service": "crypto_service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
