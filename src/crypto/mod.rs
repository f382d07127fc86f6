//! Key material for WireGuard peers
//!
//! - Curve25519 key pair generation and public key derivation (keys)
//! - Base64 encoding in the format `wg` expects

pub mod keys;
