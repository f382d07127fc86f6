//! In-memory tunnel for tests

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::TunnelControl;
use crate::error::PeerError;

/// Records peers in a map; add/remove can be made to fail on demand
#[derive(Debug, Default)]
pub struct FakeTunnel {
    peers: Mutex<HashMap<String, Ipv4Addr>>,
    fail_add: AtomicBool,
    fail_remove: AtomicBool,
    add_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl FakeTunnel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn allowed_ip(&self, public_key: &str) -> Option<Ipv4Addr> {
        self.peers.lock().unwrap().get(public_key).copied()
    }

    pub fn has_peer(&self, public_key: &str) -> bool {
        self.peers.lock().unwrap().contains_key(public_key)
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelControl for FakeTunnel {
    async fn add_peer(&self, public_key: &str, allowed: Ipv4Addr) -> Result<(), PeerError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(PeerError::AddFailed {
                public_key: public_key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.peers
            .lock()
            .unwrap()
            .insert(public_key.to_string(), allowed);
        Ok(())
    }

    async fn remove_peer(&self, public_key: &str) -> Result<(), PeerError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(PeerError::RemoveFailed {
                public_key: public_key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.peers.lock().unwrap().remove(public_key);
        Ok(())
    }
}
