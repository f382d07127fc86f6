//! Session manager
//!
//! Owns the decision of when addresses and peers are allocated and released.
//! Connect and Disconnect are serialized by `lifecycle`; status and speed
//! queries only touch the store's read lock.
//!
//! Step ordering:
//! - connect: tear down active session -> allocate -> provision -> record
//! - disconnect: revoke peer -> release address -> mark closed
//!
//! A failed provision releases the address it was given. A failed revoke
//! leaves the session active so the caller can retry.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;

use super::{unix_now, Session, SessionId, SessionStore};
use crate::catalog::ServerCatalog;
use crate::error::{Result, VpnError};
use crate::peer::PeerController;
use crate::pool::AddressPool;

/// Snapshot returned by [`SessionManager::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VpnStatus {
    Disconnected,
    Connected {
        server: String,
        duration: Duration,
        address: Ipv4Addr,
    },
}

impl VpnStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Synthetic throughput figures
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpeedSample {
    /// Mbps
    pub download: f64,
    /// Mbps
    pub upload: f64,
    /// Milliseconds
    pub latency: u32,
}

/// Connect/disconnect orchestration
#[derive(Debug)]
pub struct SessionManager {
    store: SessionStore,
    pool: AddressPool,
    peers: PeerController,
    catalog: Arc<ServerCatalog>,
    lifecycle: Mutex<()>,
}

impl SessionManager {
    pub fn new(pool: AddressPool, peers: PeerController, catalog: Arc<ServerCatalog>) -> Self {
        Self {
            store: SessionStore::new(),
            pool,
            peers,
            catalog,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    /// Start a session on `server_code`, replacing any active one
    pub async fn connect(&self, server_code: &str) -> Result<Session> {
        let code = server_code.trim();
        if code.is_empty() {
            return Err(VpnError::invalid("serverCode is required"));
        }
        let server = self
            .catalog
            .get(code)
            .ok_or_else(|| VpnError::ServerNotFound {
                code: code.to_string(),
            })?;

        let _lifecycle = self.lifecycle.lock().await;

        if let Some(active) = self.store.active().await {
            tracing::info!(
                "Replacing active session {} ({}) before connecting",
                active.id,
                active.address
            );
            self.teardown(active).await.map_err(|e| {
                tracing::error!("Failed to disconnect existing session: {}", e);
                e
            })?;
        }

        let address = self.pool.allocate().await.map_err(|e| {
            tracing::warn!("Address allocation failed: {}", e);
            VpnError::from(e)
        })?;

        let peer = match self.peers.provision(address).await {
            Ok(peer) => peer,
            Err(e) => {
                tracing::warn!(
                    "Provisioning peer for {} failed, releasing address: {}",
                    address,
                    e
                );
                self.pool.release(address).await;
                return Err(e.into());
            }
        };

        let session = Session::new(server.code.clone(), address, peer.config, peer.public_key);
        self.store.insert(session.clone()).await;

        tracing::info!(
            "Session {} connected to {} with {}",
            session.id,
            session.server_code,
            session.address
        );
        Ok(session)
    }

    /// End a session. Closing an already closed session is a no-op.
    pub async fn disconnect(&self, session_id: &str) -> Result<Session> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(VpnError::invalid("sessionId is required"));
        }

        let _lifecycle = self.lifecycle.lock().await;

        let session = self
            .store
            .get(&SessionId::from(session_id))
            .await
            .ok_or_else(|| VpnError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        self.teardown(session).await
    }

    /// Revoke, release, close. Caller holds `lifecycle`.
    async fn teardown(&self, mut session: Session) -> Result<Session> {
        if !session.connected {
            tracing::debug!("Session {} already closed", session.id);
            return Ok(session);
        }

        self.peers.revoke(&session.public_key).await?;
        self.pool.release(session.address).await;

        session.close(unix_now());
        self.store.update(session.clone()).await;

        tracing::info!("Session {} disconnected, released {}", session.id, session.address);
        Ok(session)
    }

    pub async fn status(&self) -> VpnStatus {
        match self.store.active().await {
            Some(session) => VpnStatus::Connected {
                duration: Duration::from_secs(session.elapsed_secs(unix_now())),
                server: session.server_code,
                address: session.address,
            },
            None => VpnStatus::Disconnected,
        }
    }

    /// Placeholder figures until a real measurement exists
    pub fn speed(&self) -> SpeedSample {
        let mut rng = rand::thread_rng();
        SpeedSample {
            download: rng.gen_range(20.0..50.0),
            upload: rng.gen_range(5.0..20.0),
            latency: rng.gen_range(20..70),
        }
    }

    /// Historical lookup, active or closed
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.store.get(&SessionId::from(session_id)).await
    }

    /// Disconnect whatever is active so no peer outlives the process
    pub async fn shutdown(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if let Some(active) = self.store.active().await {
            tracing::info!("Closing session {} on shutdown", active.id);
            self.teardown(active).await?;
        }
        Ok(())
    }
}
