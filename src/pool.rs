//! Client address pool
//!
//! Hands out host addresses from the VPN subnet. The network address, the
//! gateway (first host, held by the server interface) and the broadcast
//! address are never handed out.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tokio::sync::Mutex;

use crate::error::{ConfigError, PoolError};

/// Allocation table behind [`AddressPool`]
#[derive(Debug)]
pub struct AllocationTable {
    subnet: Ipv4Net,
    /// First client address (gateway + 1)
    first: u32,
    /// Last client address (broadcast - 1)
    last: u32,
    /// Last issued address; probing starts right after it
    cursor: u32,
    allocated: HashSet<Ipv4Addr>,
}

impl AllocationTable {
    pub fn new(subnet: Ipv4Net) -> Result<Self, ConfigError> {
        let subnet = subnet.trunc();
        let network: u32 = subnet.network().into();
        let broadcast: u32 = subnet.broadcast().into();

        // Needs network, gateway, at least one client and broadcast.
        if broadcast.saturating_sub(network) < 3 {
            return Err(ConfigError::SubnetTooSmall {
                subnet: subnet.to_string(),
            });
        }

        let first = network + 2;
        Ok(Self {
            subnet,
            first,
            last: broadcast - 1,
            // Probing starts at cursor + 1, so the first allocation is `first`.
            cursor: first - 1,
            allocated: HashSet::new(),
        })
    }

    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// Address held by the server side of the tunnel
    pub fn gateway(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.first - 1)
    }

    /// Number of addresses clients can ever hold at once
    pub fn capacity(&self) -> u32 {
        self.last - self.first + 1
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    pub fn is_allocated(&self, addr: Ipv4Addr) -> bool {
        self.allocated.contains(&addr)
    }

    /// Allocate the next free address after the cursor
    pub fn allocate(&mut self) -> Result<Ipv4Addr, PoolError> {
        let capacity = self.capacity();
        let mut candidate = self.cursor;

        for _ in 0..capacity {
            candidate = if candidate >= self.last {
                self.first
            } else {
                candidate + 1
            };

            let addr = Ipv4Addr::from(candidate);
            if self.allocated.insert(addr) {
                self.cursor = candidate;
                return Ok(addr);
            }
        }

        Err(PoolError::Exhausted {
            subnet: self.subnet.to_string(),
        })
    }

    /// Mark an address free. Unknown or already-free addresses are ignored.
    pub fn release(&mut self, addr: Ipv4Addr) -> bool {
        self.allocated.remove(&addr)
    }
}

/// Concurrency-safe address pool shared by request handlers
#[derive(Debug)]
pub struct AddressPool {
    table: Mutex<AllocationTable>,
    subnet: Ipv4Net,
    gateway: Ipv4Addr,
    capacity: u32,
}

impl AddressPool {
    pub fn new(subnet: Ipv4Net) -> Result<Self, ConfigError> {
        let table = AllocationTable::new(subnet)?;
        Ok(Self {
            subnet: table.subnet(),
            gateway: table.gateway(),
            capacity: table.capacity(),
            table: Mutex::new(table),
        })
    }

    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// Server-side tunnel address, never handed to clients
    pub fn gateway(&self) -> Ipv4Addr {
        self.gateway
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub async fn allocate(&self) -> Result<Ipv4Addr, PoolError> {
        let addr = self.table.lock().await.allocate()?;
        tracing::debug!("Allocated {} from {}", addr, self.subnet);
        Ok(addr)
    }

    pub async fn release(&self, addr: Ipv4Addr) {
        if self.table.lock().await.release(addr) {
            tracing::debug!("Released {} to {}", addr, self.subnet);
        }
    }

    pub async fn allocated_count(&self) -> usize {
        self.table.lock().await.allocated_count()
    }

    pub async fn is_allocated(&self, addr: Ipv4Addr) -> bool {
        self.table.lock().await.is_allocated(addr)
    }
}
