//! HTTP handlers for the identity service.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::password::{hash_password, validate_password, verify_password};
use super::IdentityState;
use crate::db::StoreError;
use crate::error::ApiError;
use crate::util::{required_raw, required_trimmed};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub token: String,
    pub user_id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

pub fn router(state: Arc<IdentityState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify", post(verify))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /register
async fn register(
    State(state): State<Arc<IdentityState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(req) = payload?;

    let username = required_trimmed(req.username, "username")?;
    let email = required_trimmed(req.email, "email")?;
    let password = required_raw(req.password, "password")?;

    validate_password(&password).map_err(ApiError::Validation)?;
    if !email.contains('@') {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }

    let iterations = state.password_iterations;
    let password_hash =
        tokio::task::spawn_blocking(move || hash_password(&password, iterations))
            .await
            .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))?;

    let user_id = match state.users.create(&username, &email, &password_hash).await {
        Ok(id) => id,
        Err(StoreError::Conflict) => {
            tracing::debug!("Registration conflict for an existing username or email");
            return Err(ApiError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let issued = state
        .tokens
        .issue(user_id)
        .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))?;

    tracing::info!(user_id, "Identity registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            token: issued.token,
            user_id,
        }),
    ))
}

/// POST /login
async fn login(
    State(state): State<Arc<IdentityState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;

    let username = required_trimmed(req.username, "username")?;
    let password = required_raw(req.password, "password")?;

    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let stored = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))?;
    if !matches {
        tracing::debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized("Incorrect password".to_string()));
    }

    let issued = state
        .tokens
        .issue(user.id)
        .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))?;

    tracing::info!(user_id = user.id, "Login succeeded");

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token: issued.token,
        user_id: user.id,
        username: user.username,
        email: user.email,
    }))
}

/// POST /verify
///
/// Pure check of the token; no state is written.
async fn verify(
    State(state): State<Arc<IdentityState>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(req) = payload?;
    let token = required_trimmed(req.token, "token")?;

    let claims = state
        .tokens
        .verify(&token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    let user = state
        .users
        .find_by_id(claims.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let public = user.public();
    Ok(Json(VerifyResponse {
        valid: true,
        user_id: public.user_id,
        username: public.username,
        email: public.email,
    }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        service: "identity_service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
