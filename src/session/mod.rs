//! VPN session lifecycle
//!
//! - [`Session`]: one client's tunnel lifetime
//! - [`SessionStore`]: in-memory record keeping, never deletes
//! - [`SessionManager`]: connect/disconnect orchestration under the
//!   single-active-session policy

mod manager;
mod store;

use std::fmt;
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

pub use manager::{SessionManager, SpeedSample, VpnStatus};
pub use store::SessionStore;

/// Opaque session identifier (128 random bits, hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier from the thread-local CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One client's tunnel lifetime
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub server_code: String,
    pub address: Ipv4Addr,
    /// Unix seconds
    pub started_at: u64,
    /// Unix seconds, set on disconnect
    pub ended_at: Option<u64>,
    pub connected: bool,
    /// Rendered client config, includes the client private key
    pub peer_config: String,
    pub public_key: String,
}

impl Session {
    /// New active session starting now
    pub fn new(
        server_code: impl Into<String>,
        address: Ipv4Addr,
        peer_config: String,
        public_key: String,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            server_code: server_code.into(),
            address,
            started_at: unix_now(),
            ended_at: None,
            connected: true,
            peer_config,
            public_key,
        }
    }

    /// Seconds since the session started, as of `now`
    pub fn elapsed_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.started_at)
    }

    pub(crate) fn close(&mut self, at: u64) {
        self.connected = false;
        self.ended_at = Some(at);
    }
}

/// Current time in Unix seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
