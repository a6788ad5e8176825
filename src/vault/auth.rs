//! Per-request authorization for the secret store.
//!
//! - Every `/passwords` request must carry `Authorization: Bearer <token>`
//! - The token is re-verified against the identity service on every request; results
//!   are never cached
//! - The resolved [`Owner`] is attached to the request for the handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use super::upstream::Owner;
use super::VaultState;
use crate::error::ApiError;

/// Extract the token from an `Authorization` header of the exact form `Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Authorization token not provided".to_string()))?;

    let malformed =
        || ApiError::Unauthorized("Invalid token format. Use: Bearer <token>".to_string());

    let value = header.to_str().map_err(|_| malformed())?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(malformed()),
    }
}

pub async fn require_owner(
    State(state): State<Arc<VaultState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.to_string();

    let owner: Owner = match state.verifier.verify(&token).await {
        Ok(Some(owner)) => owner,
        Ok(None) => {
            return Err(ApiError::Unauthorized(
                "Invalid or expired token".to_string(),
            ))
        }
        Err(e) => {
            tracing::warn!("Token verification unavailable: {}", e);
            return Err(e.into());
        }
    };

    req.extensions_mut().insert(owner);
    Ok(next.run(req).await)
}
