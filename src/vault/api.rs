//! HTTP handlers for the secret store.
//!
//! Each handler runs one fixed pipeline: the owner has already been resolved by
//! [`require_owner`](super::auth::require_owner), then validate → encrypt/decrypt via the
//! crypto service → persist/return. A failed stage ends the request.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::auth::require_owner;
use super::store::SecretRecord;
use super::upstream::Owner;
use super::VaultState;
use crate::db::StoreError;
use crate::error::ApiError;
use crate::util::{required_raw, required_trimmed};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SecretRequest {
    pub site: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Validated write input. `password` is plaintext and lives only until encrypted.
struct SecretInput {
    site: String,
    username: String,
    password: String,
}

impl SecretRequest {
    fn validate(self) -> Result<SecretInput, ApiError> {
        Ok(SecretInput {
            site: required_trimmed(self.site, "site")?,
            username: required_trimmed(self.username, "username")?,
            password: required_raw(self.password, "password")?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub passwords: Vec<SecretRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// A record together with its decrypted password.
#[derive(Debug, Serialize, Deserialize)]
pub struct RevealedSecret {
    #[serde(flatten)]
    pub record: SecretRecord,
    pub password: String,
}

pub fn router(state: Arc<VaultState>) -> Router {
    let protected = Router::new()
        .route("/passwords", get(list_secrets).post(create_secret))
        .route(
            "/passwords/:id",
            get(get_secret).put(update_secret).delete(delete_secret),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_owner,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn not_found() -> ApiError {
    ApiError::NotFound("Password not found".to_string())
}

fn conflict() -> ApiError {
    ApiError::Conflict("A password for this site and username already exists".to_string())
}

/// A malformed id cannot name any record.
fn record_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id).map_err(|_| not_found())
}

/// GET /passwords
///
/// Ciphertext is returned opaque; the crypto service is not called.
async fn list_secrets(
    State(state): State<Arc<VaultState>>,
    Extension(owner): Extension<Owner>,
) -> Result<Json<ListResponse>, ApiError> {
    let passwords = state.secrets.list(owner.user_id).await?;
    Ok(Json(ListResponse {
        count: passwords.len(),
        passwords,
    }))
}

/// POST /passwords
async fn create_secret(
    State(state): State<Arc<VaultState>>,
    Extension(owner): Extension<Owner>,
    payload: Result<Json<SecretRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let Json(req) = payload?;
    let input = req.validate()?;

    let ciphertext = state.encryptor.encrypt(&input.password).await.map_err(|e| {
        tracing::warn!(user_id = owner.user_id, "Encryption failed: {}", e);
        ApiError::from(e)
    })?;

    let id = match state
        .secrets
        .create(owner.user_id, &input.site, &input.username, &ciphertext)
        .await
    {
        Ok(id) => id,
        Err(StoreError::Conflict) => {
            tracing::debug!(user_id = owner.user_id, "Duplicate secret rejected");
            return Err(conflict());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = owner.user_id, id, "Secret created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Password created successfully".to_string(),
            id,
        }),
    ))
}

/// GET /passwords/:id
///
/// The only response that carries a plaintext password.
async fn get_secret(
    State(state): State<Arc<VaultState>>,
    Extension(owner): Extension<Owner>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<RevealedSecret>, ApiError> {
    let id = record_id(path)?;

    let record = state
        .secrets
        .get(id, owner.user_id)
        .await?
        .ok_or_else(not_found)?;

    let password = state
        .encryptor
        .decrypt(&record.encrypted_password)
        .await
        .map_err(|e| {
            tracing::warn!(user_id = owner.user_id, id, "Decryption failed: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(RevealedSecret { record, password }))
}

/// PUT /passwords/:id
async fn update_secret(
    State(state): State<Arc<VaultState>>,
    Extension(owner): Extension<Owner>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SecretRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = record_id(path)?;

    if state.secrets.get(id, owner.user_id).await?.is_none() {
        return Err(not_found());
    }

    let Json(req) = payload?;
    let input = req.validate()?;

    let ciphertext = state.encryptor.encrypt(&input.password).await.map_err(|e| {
        tracing::warn!(user_id = owner.user_id, id, "Encryption failed: {}", e);
        ApiError::from(e)
    })?;

    match state
        .secrets
        .update(id, owner.user_id, &input.site, &input.username, &ciphertext)
        .await
    {
        Ok(true) => {}
        // Deleted between the existence check and the write.
        Ok(false) => return Err(not_found()),
        Err(StoreError::Conflict) => return Err(conflict()),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = owner.user_id, id, "Secret updated");

    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}

/// DELETE /passwords/:id
async fn delete_secret(
    State(state): State<Arc<VaultState>>,
    Extension(owner): Extension<Owner>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = record_id(path)?;

    if !state.secrets.delete(id, owner.user_id).await? {
        return Err(not_found());
    }

    tracing::info!(user_id = owner.user_id, id, "Secret deleted");

    Ok(Json(MessageResponse {
        message: "Password deleted successfully".to_string(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "service": "secret_store",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::vault::store::SecretStore;
    use crate::vault::upstream::{Encryptor, TokenVerifier, UpstreamError};

    /// Tokens are `token-<user_id>`; `down` simulates an unreachable identity service.
    struct FakeVerifier {
        owners: HashMap<String, Owner>,
        down: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenVerifier for FakeVerifier {
        async fn verify(&self, token: &str) -> Result<Option<Owner>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(UpstreamError::Unreachable {
                    service: "identity service",
                    message: "connection refused".to_string(),
                });
            }
            Ok(self.owners.get(token).cloned())
        }
    }

    /// Reversible stand-in for the crypto service.
    struct FakeEncryptor {
        down: AtomicBool,
    }

    #[async_trait]
    impl Encryptor for FakeEncryptor {
        async fn encrypt(&self, plaintext: &str) -> Result<String, UpstreamError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(UpstreamError::Unreachable {
                    service: "crypto service",
                    message: "connection refused".to_string(),
                });
            }
            Ok(format!("enc:{}", plaintext.chars().rev().collect::<String>()))
        }

        async fn decrypt(&self, ciphertext: &str) -> Result<String, UpstreamError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(UpstreamError::Unreachable {
                    service: "crypto service",
                    message: "connection refused".to_string(),
                });
            }
            ciphertext
                .strip_prefix("enc:")
                .map(|rest| rest.chars().rev().collect())
                .ok_or(UpstreamError::Status {
                    service: "crypto service",
                    status: StatusCode::BAD_REQUEST,
                })
        }
    }

    struct Harness {
        app: Router,
        state: Arc<VaultState>,
        verifier: Arc<FakeVerifier>,
        encryptor: Arc<FakeEncryptor>,
        _temp: tempfile::TempDir,
    }

    fn owner(id: i64, name: &str) -> Owner {
        Owner {
            user_id: id,
            username: name.to_string(),
            email: format!("{}@x.com", name),
        }
    }

    async fn harness() -> Harness {
        let temp = tempfile::tempdir().expect("tempdir");
        let secrets = SecretStore::open(&temp.path().join("secrets.db"))
            .await
            .expect("open store");

        let mut owners = HashMap::new();
        owners.insert("token-1".to_string(), owner(1, "alice"));
        owners.insert("token-2".to_string(), owner(2, "bob"));
        let verifier = Arc::new(FakeVerifier {
            owners,
            down: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        });
        let encryptor = Arc::new(FakeEncryptor {
            down: AtomicBool::new(false),
        });

        let state = Arc::new(VaultState {
            secrets,
            verifier: verifier.clone(),
            encryptor: encryptor.clone(),
        });
        Harness {
            app: router(Arc::clone(&state)),
            state,
            verifier,
            encryptor,
            _temp: temp,
        }
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn create(
        app: &Router,
        token: &str,
        site: &str,
        user: &str,
        pw: &str,
    ) -> (StatusCode, Value) {
        call(
            app,
            "POST",
            "/passwords",
            Some(token),
            Some(json!({"site": site, "username": user, "password": pw})),
        )
        .await
    }

    #[tokio::test]
    async fn missing_or_invalid_token_is_unauthorized() {
        let h = harness().await;
        let (status, _) = call(&h.app, "GET", "/passwords", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&h.app, "GET", "/passwords", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let response = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/passwords")
                    .header("authorization", "Token token-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verification_runs_on_every_request() {
        let h = harness().await;
        for _ in 0..3 {
            let (status, _) = call(&h.app, "GET", "/passwords", Some("token-1"), None).await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn identity_outage_fails_closed() {
        let h = harness().await;
        h.verifier.down.store(true, Ordering::SeqCst);
        let (status, body) = call(&h.app, "GET", "/passwords", Some("token-1"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn create_get_list_roundtrip() {
        let h = harness().await;
        let (status, body) = create(
            &h.app,
            "token-1",
            "example.com",
            "alice@example.com",
            "mypw1",
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_i64().unwrap();

        // Persisted value is ciphertext, never the plaintext.
        let stored = h.state.secrets.get(id, 1).await.unwrap().unwrap();
        assert_ne!(stored.encrypted_password, "mypw1");

        let uri = format!("/passwords/{}", id);
        let (status, body) = call(&h.app, "GET", &uri, Some("token-1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["password"], "mypw1");
        assert_eq!(body["site"], "example.com");
        assert_eq!(body["username"], "alice@example.com");
        assert_eq!(body["user_id"], 1);

        let (status, body) = call(&h.app, "GET", "/passwords", Some("token-1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["passwords"][0]["id"], id);
        assert!(body["passwords"][0].get("password").is_none());
    }

    #[tokio::test]
    async fn create_trims_and_validates() {
        let h = harness().await;
        for payload in [
            json!({"username": "u", "password": "p"}),
            json!({"site": " ", "username": "u", "password": "p"}),
            json!({"site": "s", "password": "p"}),
            json!({"site": "s", "username": "u"}),
            json!({"site": "s", "username": "u", "password": ""}),
        ] {
            let (status, _) =
                call(&h.app, "POST", "/passwords", Some("token-1"), Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert_eq!(h.state.secrets.count(1).await.unwrap(), 0);

        let (status, body) = create(&h.app, "token-1", "  example.com ", " alice ", " pw ").await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/passwords/{}", body["id"].as_i64().unwrap());
        let (_, body) = call(&h.app, "GET", &uri, Some("token-1"), None).await;
        assert_eq!(body["site"], "example.com");
        assert_eq!(body["username"], "alice");
        assert_eq!(body["password"], " pw ");
    }

    #[tokio::test]
    async fn duplicate_is_conflict_but_other_owner_succeeds() {
        let h = harness().await;
        let (status, _) = create(&h.app, "token-1", "example.com", "shared", "pw1").await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = create(&h.app, "token-1", "example.com", "shared", "pw2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("already exists"));

        let (status, _) = create(&h.app, "token-2", "example.com", "shared", "pw3").await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn other_owners_records_look_absent() {
        let h = harness().await;
        let (_, body) = create(&h.app, "token-1", "example.com", "alice", "mypw1").await;
        let uri = format!("/passwords/{}", body["id"].as_i64().unwrap());

        let (status, _) = call(&h.app, "GET", &uri, Some("token-2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &h.app,
            "PUT",
            &uri,
            Some("token-2"),
            Some(json!({"site": "x", "username": "y", "password": "z"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&h.app, "DELETE", &uri, Some("token-2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&h.app, "GET", "/passwords", Some("token-2"), None).await;
        assert_eq!(body["count"], 0);

        // Still intact for its owner.
        let (status, body) = call(&h.app, "GET", &uri, Some("token-1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["password"], "mypw1");
    }

    #[tokio::test]
    async fn update_and_delete() {
        let h = harness().await;
        let (_, body) = create(&h.app, "token-1", "example.com", "alice", "old").await;
        let id = body["id"].as_i64().unwrap();
        let uri = format!("/passwords/{}", id);

        let (status, _) = call(
            &h.app,
            "PUT",
            &uri,
            Some("token-1"),
            Some(json!({"site": "example.org", "username": "alice", "password": "new"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&h.app, "GET", &uri, Some("token-1"), None).await;
        assert_eq!(body["site"], "example.org");
        assert_eq!(body["password"], "new");

        let (status, _) = call(
            &h.app,
            "PUT",
            &uri,
            Some("token-1"),
            Some(json!({"site": "example.org", "username": "alice"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&h.app, "DELETE", &uri, Some("token-1"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&h.app, "DELETE", &uri, Some("token-1"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&h.app, "GET", &uri, Some("token-1"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found_before_validation() {
        let h = harness().await;
        let (status, _) = call(
            &h.app,
            "PUT",
            "/passwords/999",
            Some("token-1"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call(&h.app, "GET", "/passwords/not-a-number", Some("token-1"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_into_existing_pair_is_conflict() {
        let h = harness().await;
        create(&h.app, "token-1", "a.com", "u", "p1").await;
        let (_, body) = create(&h.app, "token-1", "b.com", "u", "p2").await;
        let uri = format!("/passwords/{}", body["id"].as_i64().unwrap());

        let (status, _) = call(
            &h.app,
            "PUT",
            &uri,
            Some("token-1"),
            Some(json!({"site": "a.com", "username": "u", "password": "p3"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn crypto_outage_persists_nothing() {
        let h = harness().await;
        h.encryptor.down.store(true, Ordering::SeqCst);

        let (status, body) = create(&h.app, "token-1", "example.com", "alice", "mypw1").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("mypw1"));
        assert_eq!(h.state.secrets.count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_during_crypto_outage_keeps_record() {
        let h = harness().await;
        let (_, body) = create(&h.app, "token-1", "example.com", "alice", "old").await;
        let id = body["id"].as_i64().unwrap();
        let uri = format!("/passwords/{}", id);
        let before = h.state.secrets.get(id, 1).await.unwrap().unwrap();

        h.encryptor.down.store(true, Ordering::SeqCst);
        let (status, body) = call(
            &h.app,
            "PUT",
            &uri,
            Some("token-1"),
            Some(json!({"site": "example.org", "username": "bob", "password": "new"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("new"));

        let after = h.state.secrets.get(id, 1).await.unwrap().unwrap();
        assert_eq!(after, before);

        h.encryptor.down.store(false, Ordering::SeqCst);
        let (status, body) = call(&h.app, "GET", &uri, Some("token-1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["site"], "example.com");
        assert_eq!(body["password"], "old");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_creates_have_one_winner() {
        let h = harness().await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let app = h.app.clone();
            handles.push(tokio::spawn(async move {
                let pw = format!("pw{}", i);
                create(&app, "token-1", "example.com", "alice", &pw).await.0
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                StatusCode::CREATED => created += 1,
                status => assert_eq!(status, StatusCode::BAD_REQUEST),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(h.state.secrets.count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn undecryptable_record_is_upstream_failure() {
        let h = harness().await;
        let id = h
            .state
            .secrets
            .create(1, "example.com", "alice", "corrupted")
            .await
            .unwrap();

        let uri = format!("/passwords/{}", id);
        let (status, _) = call(&h.app, "GET", &uri, Some("token-1"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let h = harness().await;
        let (status, body) = call(&h.app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
    }
}
