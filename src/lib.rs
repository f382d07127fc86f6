//! NovaVPN API - WireGuard session service
//!
//! Hands out client tunnels on a single WireGuard server behind a small
//! REST API. The kernel interface is driven through the `wg` command.
//!
//! # Features
//!
//! - Address allocation from a configured IPv4 subnet
//! - Per-session client key generation and ready-to-import configs
//! - Single active session, reconnect replaces the previous one
//! - Peer add/remove rollback so addresses never leak
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use novavpn::crypto::keys::OsKeyGenerator;
//! use novavpn::{AddressPool, AppState, PeerController, ServiceConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServiceConfig::from_env()?;
//!     let wg = config.wg_cli();
//!     let server_key = config.resolve_server_public_key(&wg).await?;
//!
//!     let peers = PeerController::new(
//!         Arc::new(wg),
//!         Arc::new(OsKeyGenerator),
//!         config.client_template(server_key),
//!     );
//!     let catalog = Arc::new(config.catalog());
//!     let pool = AddressPool::new(config.subnet)?;
//!     let manager = Arc::new(SessionManager::new(pool, peers, Arc::clone(&catalog)));
//!
//!     novavpn::api::serve(AppState { manager, catalog }, config.port, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod crypto;
pub mod error;
pub mod peer;
pub mod pool;
pub mod session;
pub mod wireguard;

pub use api::AppState;
pub use catalog::{ServerCatalog, ServerDescriptor};
pub use config::ServiceConfig;
pub use error::VpnError;
pub use peer::PeerController;
pub use pool::AddressPool;
pub use session::{Session, SessionManager, VpnStatus};
