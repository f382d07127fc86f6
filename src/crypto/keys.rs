//! X25519 key pairs for tunnel peers
//!
//! Keys travel as standard base64 strings, the same encoding `wg(8)` uses.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::ConfigError;

/// Key length for X25519 (both private and public keys are 32 bytes)
pub const KEY_LEN: usize = 32;

/// A client key pair
#[derive(Clone)]
pub struct KeyPair {
    private_key: [u8; KEY_LEN],
    public_key: [u8; KEY_LEN],
}

impl KeyPair {
    /// Build a key pair from a private scalar
    pub fn from_private(private_key: [u8; KEY_LEN]) -> Self {
        Self {
            public_key: public_key(&private_key),
            private_key,
        }
    }

    pub fn private_key(&self) -> &[u8; KEY_LEN] {
        &self.private_key
    }

    pub fn public_key(&self) -> &[u8; KEY_LEN] {
        &self.public_key
    }

    /// Private key in `wg` base64 form
    pub fn private_base64(&self) -> String {
        encode_key(&self.private_key)
    }

    /// Public key in `wg` base64 form
    pub fn public_base64(&self) -> String {
        encode_key(&self.public_key)
    }
}

// Keep private keys out of logs.
impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_base64())
            .finish_non_exhaustive()
    }
}

/// Source of fresh client key pairs
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> KeyPair;
}

/// Generates key pairs from the operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsKeyGenerator;

impl KeyGenerator for OsKeyGenerator {
    fn generate(&self) -> KeyPair {
        let (private_key, public_key) = generate_keypair();
        KeyPair {
            private_key,
            public_key,
        }
    }
}

/// Generate a new X25519 keypair
///
/// Returns (private_key, public_key)
pub fn generate_keypair() -> ([u8; KEY_LEN], [u8; KEY_LEN]) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    (secret.to_bytes(), public.to_bytes())
}

/// Derive public key from private key
pub fn public_key(private_key: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let secret = StaticSecret::from(*private_key);
    PublicKey::from(&secret).to_bytes()
}

pub fn encode_key(key: &[u8; KEY_LEN]) -> String {
    BASE64.encode(key)
}

/// Parse a base64-encoded 32-byte key
pub fn decode_key(value: &str, field_name: &str) -> Result<[u8; KEY_LEN], ConfigError> {
    let bytes = BASE64
        .decode(value.trim())
        .map_err(|_| ConfigError::InvalidKey {
            field: field_name.to_string(),
        })?;

    <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| ConfigError::InvalidKey {
        field: field_name.to_string(),
    })
}

/// Derive the base64 public key for a base64 private key
pub fn derive_public_base64(private_b64: &str, field_name: &str) -> Result<String, ConfigError> {
    let private_key = decode_key(private_b64, field_name)?;
    Ok(encode_key(&public_key(&private_key)))
}
