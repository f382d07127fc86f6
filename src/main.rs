//! NovaVPN API server
//!
//! Serves the session REST API and drives the local WireGuard interface
//! through `wg`. Configuration comes from the environment; a few flags
//! override it for local runs.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use novavpn::config::parse_subnet;
use novavpn::crypto::keys::OsKeyGenerator;
use novavpn::{AddressPool, AppState, PeerController, ServiceConfig, SessionManager, VpnError};

/// NovaVPN - WireGuard session API
#[derive(Parser, Debug)]
#[command(name = "novavpn")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// WireGuard interface (overrides WG_INTERFACE)
    #[arg(short, long)]
    interface: Option<String>,

    /// Client address subnet in CIDR form (overrides VPN_SUBNET)
    #[arg(short, long)]
    subnet: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt().with_env_filter(filter).with_target(false).init();

    match run(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(args: Args) -> Result<(), VpnError> {
    let mut config = ServiceConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(interface) = args.interface {
        config.wg_interface = interface;
    }
    if let Some(subnet) = args.subnet.as_deref() {
        config.subnet = parse_subnet(subnet)?;
    }

    tracing::info!(
        "NovaVPN starting: interface {}, subnet {}, server {}",
        config.wg_interface,
        config.subnet,
        config.server_code
    );

    let wg = config.wg_cli();
    let server_key = config.resolve_server_public_key(&wg).await?;
    tracing::info!("Server public key: {}", server_key);

    let peers = PeerController::new(
        Arc::new(wg),
        Arc::new(OsKeyGenerator),
        config.client_template(server_key),
    );
    let catalog = Arc::new(config.catalog());
    let pool = AddressPool::new(config.subnet)?;
    tracing::info!(
        "Address pool holds {} client addresses (server side {})",
        pool.capacity(),
        pool.gateway()
    );

    let manager = Arc::new(SessionManager::new(pool, peers, Arc::clone(&catalog)));
    let state = AppState {
        manager: Arc::clone(&manager),
        catalog,
    };

    novavpn::api::serve(state, config.port, shutdown_signal()).await?;

    tracing::info!("Shutting down, removing active peer...");
    manager.shutdown().await
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

fn exit_code(error: &VpnError) -> u8 {
    u8::try_from(error.exit_code()).unwrap_or(u8::MAX)
}
