//! Crypto service.
//!
//! Holds the only key able to reverse stored ciphertext and exposes two stateless
//! operations over it. It never learns which identity owns a plaintext.
//!
//! ## Endpoints
//!
//! - `POST /encrypt` - `{password}` → `{encrypted_password}`
//! - `POST /decrypt` - `{encrypted_password}` → `{password}`
//! - `GET /health` - Health check

mod api;
pub mod cipher;

pub use api::{router, DecryptResponse, EncryptResponse};
pub use cipher::{Cipher, CipherError, KeySource};

use crate::error::ApiError;

impl From<CipherError> for ApiError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::Empty(_) => ApiError::Validation(e.to_string()),
            CipherError::InvalidCiphertext(_) => ApiError::InvalidCiphertext(e.to_string()),
            CipherError::Encryption(_) | CipherError::KeyFile(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}
