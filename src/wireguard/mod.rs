//! Tunnel control plane
//!
//! The session core never talks to WireGuard directly. It goes through
//! [`TunnelControl`], which the production build backs with the `wg(8)`
//! command line ([`WgCli`]).

mod cli;
#[cfg(test)]
pub(crate) mod fake;

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::PeerError;

pub use cli::WgCli;

/// Peer table operations on the tunnel interface
#[async_trait]
pub trait TunnelControl: Send + Sync {
    /// Register `public_key` with traffic restricted to `allowed/32`
    async fn add_peer(&self, public_key: &str, allowed: Ipv4Addr) -> Result<(), PeerError>;

    /// Remove `public_key` from the peer table. Removing an absent peer succeeds.
    async fn remove_peer(&self, public_key: &str) -> Result<(), PeerError>;
}
