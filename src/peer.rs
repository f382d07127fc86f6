//! Peer provisioning
//!
//! Creates a key pair for each new client, registers it on the tunnel
//! interface and renders the `wg-quick` style configuration handed back to
//! the client.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use crate::crypto::keys::KeyGenerator;
use crate::error::PeerError;
use crate::wireguard::TunnelControl;

/// Keepalive interval written into client configs, in seconds
pub const PERSISTENT_KEEPALIVE: u16 = 25;

/// Full-tunnel routing for clients
pub const CLIENT_ALLOWED_IPS: &str = "0.0.0.0/0, ::/0";

/// Server-side values every client config needs
#[derive(Debug, Clone)]
pub struct ClientTemplate {
    pub server_public_key: String,
    /// Host or IP clients dial
    pub endpoint: String,
    pub port: u16,
    pub dns: Vec<IpAddr>,
}

impl ClientTemplate {
    /// Render the client configuration for `address`
    pub fn render(&self, private_key: &str, address: Ipv4Addr) -> String {
        let dns = self
            .dns
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "[Interface]\n\
             PrivateKey = {private_key}\n\
             Address = {address}/32\n\
             DNS = {dns}\n\
             \n\
             [Peer]\n\
             PublicKey = {server_key}\n\
             Endpoint = {endpoint}:{port}\n\
             AllowedIPs = {allowed}\n\
             PersistentKeepalive = {keepalive}",
            server_key = self.server_public_key,
            endpoint = self.endpoint,
            port = self.port,
            allowed = CLIENT_ALLOWED_IPS,
            keepalive = PERSISTENT_KEEPALIVE,
        )
    }
}

/// Result of a successful [`PeerController::provision`]
#[derive(Debug, Clone)]
pub struct ProvisionedPeer {
    /// Rendered client configuration (contains the client private key)
    pub config: String,
    pub public_key: String,
}

/// Adds and removes client peers on the tunnel interface
pub struct PeerController {
    tunnel: Arc<dyn TunnelControl>,
    keys: Arc<dyn KeyGenerator>,
    template: ClientTemplate,
}

impl PeerController {
    pub fn new(
        tunnel: Arc<dyn TunnelControl>,
        keys: Arc<dyn KeyGenerator>,
        template: ClientTemplate,
    ) -> Self {
        Self {
            tunnel,
            keys,
            template,
        }
    }

    /// Create a peer bound to `address` and render its client config.
    ///
    /// A failed add may still have reached the interface (for example when
    /// `wg` is killed on timeout), so the key is removed before returning.
    pub async fn provision(&self, address: Ipv4Addr) -> Result<ProvisionedPeer, PeerError> {
        let pair = self.keys.generate();
        let public_key = pair.public_base64();

        if let Err(e) = self.tunnel.add_peer(&public_key, address).await {
            if let Err(cleanup) = self.tunnel.remove_peer(&public_key).await {
                tracing::warn!("Failed to remove half-added peer {}: {}", public_key, cleanup);
            }
            return Err(e);
        }

        Ok(ProvisionedPeer {
            config: self.template.render(&pair.private_base64(), address),
            public_key,
        })
    }

    /// Remove a peer. An absent peer counts as removed.
    pub async fn revoke(&self, public_key: &str) -> Result<(), PeerError> {
        self.tunnel.remove_peer(public_key).await
    }
}

impl std::fmt::Debug for PeerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerController")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}
