//! AES-256-GCM encryption under a single persisted key.
//!
//! Ciphertext format: `v1:` followed by standard base64 of `nonce || ciphertext || tag`.
//! Every call draws a fresh 96-bit nonce, so encrypting the same plaintext twice gives
//! different outputs.

use std::path::Path;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Key length in bytes (256 bits for AES-256)
pub const KEY_LENGTH: usize = 32;

/// Nonce length in bytes (96 bits for AES-GCM)
const NONCE_LENGTH: usize = 12;

/// GCM authentication tag length in bytes
const TAG_LENGTH: usize = 16;

/// Current ciphertext format version
const ENCRYPTION_VERSION: &str = "v1";

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Key file error: {0}")]
    KeyFile(String),
}

/// Where the key came from at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Loaded,
    Generated,
}

/// Process-wide cipher. Built once by the service binary and shared by handle.
#[derive(Clone)]
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    pub fn new(key: &[u8; KEY_LENGTH]) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Load the key at `path`, or generate and persist one if the file does not exist.
    ///
    /// A file that exists but does not hold a valid key is an error: replacing it would
    /// make every stored ciphertext unrecoverable.
    pub async fn load_or_create(path: &Path) -> Result<(Self, KeySource), CipherError> {
        match fs::read_to_string(path).await {
            Ok(contents) => {
                let key = parse_key(&contents)?;
                Ok((Self::new(&key), KeySource::Loaded))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let key = generate_key();
                write_key_file(path, &key).await?;
                Ok((Self::new(&key), KeySource::Generated))
            }
            Err(e) => Err(CipherError::KeyFile(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() {
            return Err(CipherError::Empty("Plaintext"));
        }

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{}:{}", ENCRYPTION_VERSION, BASE64.encode(&combined)))
    }

    pub fn decrypt(&self, value: &str) -> Result<String, CipherError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CipherError::Empty("Ciphertext"));
        }

        let payload = value
            .strip_prefix(ENCRYPTION_VERSION)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| {
                CipherError::InvalidCiphertext("unsupported format version".to_string())
            })?;

        let combined = BASE64
            .decode(payload)
            .map_err(|_| CipherError::InvalidCiphertext("bad encoding".to_string()))?;

        if combined.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(CipherError::InvalidCiphertext("too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);
        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::InvalidCiphertext("integrity check failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CipherError::InvalidCiphertext("plaintext is not UTF-8".to_string()))
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cipher(..)")
    }
}

/// Generate a new random key.
pub fn generate_key() -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Parse a key from hex or base64 format.
fn parse_key(key_str: &str) -> Result<[u8; KEY_LENGTH], CipherError> {
    let trimmed = key_str.trim();

    // Try hex first (64 characters = 32 bytes)
    let bytes = if trimmed.len() == KEY_LENGTH * 2 && trimmed.chars().all(|c| c.is_ascii_hexdigit())
    {
        hex::decode(trimmed).map_err(|e| CipherError::KeyFile(format!("Invalid hex key: {}", e)))?
    } else {
        BASE64
            .decode(trimmed)
            .map_err(|_| CipherError::KeyFile("Key is neither valid hex nor base64".to_string()))?
    };

    <[u8; KEY_LENGTH]>::try_from(bytes.as_slice()).map_err(|_| {
        CipherError::KeyFile(format!(
            "Key must be {} bytes, got {} bytes",
            KEY_LENGTH,
            bytes.len()
        ))
    })
}

async fn write_key_file(path: &Path, key: &[u8; KEY_LENGTH]) -> Result<(), CipherError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|e| {
                CipherError::KeyFile(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(|e| {
        CipherError::KeyFile(format!("Failed to create {}: {}", path.display(), e))
    })?;
    file.write_all(hex::encode(key).as_bytes())
        .await
        .map_err(|e| CipherError::KeyFile(format!("Failed to write key: {}", e)))?;
    file.sync_all()
        .await
        .map_err(|e| CipherError::KeyFile(format!("Failed to sync key: {}", e)))?;
    Ok(())
}
