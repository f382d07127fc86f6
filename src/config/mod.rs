//! Service configuration
//!
//! Everything is read from environment variables. [`ServiceConfig::from_lookup`]
//! takes the lookup as a closure so tests do not touch the process environment.

mod wg_conf;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ipnet::Ipv4Net;

use crate::catalog::{ServerCatalog, ServerDescriptor};
use crate::crypto::keys::{decode_key, derive_public_base64, encode_key, public_key};
use crate::error::ConfigError;
use crate::peer::ClientTemplate;
use crate::wireguard::WgCli;

pub use wg_conf::{WgConf, WgInterface, WgPeer};

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_INTERFACE: &str = "wg0";
pub const DEFAULT_WG_PORT: u16 = 51820;
pub const DEFAULT_SUBNET: &str = "10.8.0.0/24";
pub const DEFAULT_DNS: &str = "1.1.1.1, 8.8.8.8";
pub const DEFAULT_SERVER_CODE: &str = "XX";
pub const DEFAULT_WG_CONFIG_DIR: &str = "/etc/wireguard";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for the service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub port: u16,
    pub server_private_key: Option<String>,
    pub server_public_key: Option<String>,
    /// Public host or IP clients dial
    pub server_endpoint: String,
    pub wg_interface: String,
    pub wg_port: u16,
    pub subnet: Ipv4Net,
    pub dns: Vec<IpAddr>,
    pub server_code: String,
    pub server_name: String,
    pub server_ip: String,
    pub command_timeout: Duration,
    pub wg_config_dir: PathBuf,
}

impl ServiceConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for each variable. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server_endpoint = get("SERVER_ENDPOINT").ok_or(ConfigError::MissingField {
            field: "SERVER_ENDPOINT".to_string(),
        })?;

        let server_private_key = get("SERVER_PRIVATE_KEY");
        if let Some(key) = &server_private_key {
            decode_key(key, "SERVER_PRIVATE_KEY")?;
        }
        let server_public_key = get("SERVER_PUBLIC_KEY");
        if let Some(key) = &server_public_key {
            decode_key(key, "SERVER_PUBLIC_KEY")?;
        }

        let subnet =
            parse_subnet(&get("VPN_SUBNET").unwrap_or_else(|| DEFAULT_SUBNET.to_string()))?;
        let dns = parse_dns(&get("DNS_SERVERS").unwrap_or_else(|| DEFAULT_DNS.to_string()))?;

        let server_code = get("SERVER_CODE").unwrap_or_else(|| DEFAULT_SERVER_CODE.to_string());
        let server_name = get("SERVER_NAME").unwrap_or_else(|| format!("{} VPN", server_code));
        let server_ip = get("SERVER_IP").unwrap_or_else(|| server_endpoint.clone());

        let timeout_secs = match get("WG_COMMAND_TIMEOUT_SECS") {
            Some(value) => value.parse::<u64>().ok().filter(|s| *s > 0).ok_or(
                ConfigError::InvalidValue {
                    field: "WG_COMMAND_TIMEOUT_SECS".to_string(),
                    value,
                },
            )?,
            None => DEFAULT_COMMAND_TIMEOUT_SECS,
        };

        Ok(Self {
            port: parse_port("PORT", get("PORT"), DEFAULT_HTTP_PORT)?,
            server_private_key,
            server_public_key,
            server_endpoint,
            wg_interface: get("WG_INTERFACE").unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            wg_port: parse_port("WG_PORT", get("WG_PORT"), DEFAULT_WG_PORT)?,
            subnet,
            dns,
            server_code,
            server_name,
            server_ip,
            command_timeout: Duration::from_secs(timeout_secs),
            wg_config_dir: get("WG_CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WG_CONFIG_DIR)),
        })
    }

    /// Command backend for the configured interface
    pub fn wg_cli(&self) -> WgCli {
        WgCli::new(self.wg_interface.clone()).with_timeout(self.command_timeout)
    }

    pub fn catalog(&self) -> ServerCatalog {
        ServerCatalog::new([ServerDescriptor::new(
            self.server_code.clone(),
            self.server_name.clone(),
            self.server_ip.clone(),
        )])
    }

    pub fn client_template(&self, server_public_key: String) -> ClientTemplate {
        ClientTemplate {
            server_public_key,
            endpoint: self.server_endpoint.clone(),
            port: self.wg_port,
            dns: self.dns.clone(),
        }
    }

    /// Find the server public key.
    ///
    /// Tries, in order: `SERVER_PUBLIC_KEY`, derivation from
    /// `SERVER_PRIVATE_KEY`, the running interface, `<dir>/<iface>.key` and
    /// the `PrivateKey` of `<dir>/<iface>.conf`.
    pub async fn resolve_server_public_key(&self, wg: &WgCli) -> Result<String, ConfigError> {
        if let Some(key) = &self.server_public_key {
            return Ok(key.clone());
        }

        if let Some(private) = &self.server_private_key {
            let key = derive_public_base64(private, "SERVER_PRIVATE_KEY")?;
            tracing::info!("Derived server public key from SERVER_PRIVATE_KEY");
            return Ok(key);
        }

        match wg.interface_public_key().await {
            Ok(key) => {
                decode_key(&key, "interface public key")?;
                tracing::info!("Auto-detected server public key from {}", wg.interface());
                return Ok(key);
            }
            Err(e) => tracing::debug!("Interface key lookup failed: {}", e),
        }

        if let Some(key) = public_key_from_files(&self.wg_config_dir, &self.wg_interface)? {
            return Ok(key);
        }

        Err(ConfigError::MissingField {
            field: "SERVER_PUBLIC_KEY".to_string(),
        })
    }
}

/// Derive the interface public key from `<iface>.key` or `<iface>.conf` in `dir`
pub fn public_key_from_files(dir: &Path, interface: &str) -> Result<Option<String>, ConfigError> {
    let key_path = dir.join(format!("{}.key", interface));
    if key_path.is_file() {
        let private = std::fs::read_to_string(&key_path)?;
        let key = derive_public_base64(&private, &key_path.display().to_string())?;
        tracing::info!("Derived server public key from {:?}", key_path);
        return Ok(Some(key));
    }

    let conf_path = dir.join(format!("{}.conf", interface));
    if conf_path.is_file() {
        let conf = WgConf::from_file(&conf_path)?;
        if let Some(private) = conf.interface.private_key {
            tracing::info!("Derived server public key from {:?}", conf_path);
            return Ok(Some(encode_key(&public_key(&private))));
        }
        tracing::debug!("{:?} has no PrivateKey", conf_path);
    }

    Ok(None)
}

fn parse_port(field: &str, value: Option<String>, default: u16) -> Result<u16, ConfigError> {
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort {
            field: field.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

pub fn parse_subnet(value: &str) -> Result<Ipv4Net, ConfigError> {
    let subnet: Ipv4Net = value.parse().map_err(|_| ConfigError::InvalidCidr {
        value: value.to_string(),
    })?;
    let subnet = subnet.trunc();

    // network + gateway + broadcast leaves nothing below /30
    if subnet.prefix_len() > 30 {
        return Err(ConfigError::SubnetTooSmall {
            subnet: subnet.to_string(),
        });
    }
    Ok(subnet)
}

fn parse_dns(value: &str) -> Result<Vec<IpAddr>, ConfigError> {
    let dns = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::InvalidAddress {
                value: s.to_string(),
            })
        })
        .collect::<Result<Vec<IpAddr>, _>>()?;

    if dns.is_empty() {
        return Err(ConfigError::MissingField {
            field: "DNS_SERVERS".to_string(),
        });
    }
    Ok(dns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const PRIVATE: &str = "UOvtcWdILFwjb1UnsnK+a9lcqYvNTmtPv+fvqIVOz3w=";

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("SERVER_ENDPOINT", "203.0.113.10")]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.wg_interface, "wg0");
        assert_eq!(config.wg_port, 51820);
        assert_eq!(config.subnet.to_string(), "10.8.0.0/24");
        assert_eq!(config.dns.len(), 2);
        assert_eq!(config.server_code, "XX");
        assert_eq!(config.server_name, "XX VPN");
        assert_eq!(config.server_ip, "203.0.113.10");
        assert_eq!(config.command_timeout, Duration::from_secs(10));
        assert_eq!(config.wg_config_dir, PathBuf::from("/etc/wireguard"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SERVER_ENDPOINT", "vpn.example.com"),
            ("PORT", "9000"),
            ("WG_INTERFACE", "wg1"),
            ("WG_PORT", "51000"),
            ("VPN_SUBNET", "10.9.0.0/28"),
            ("DNS_SERVERS", "9.9.9.9"),
            ("SERVER_CODE", "KE"),
            ("SERVER_NAME", "Nairobi VPN"),
            ("SERVER_IP", "198.51.100.4"),
            ("WG_COMMAND_TIMEOUT_SECS", "3"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.wg_interface, "wg1");
        assert_eq!(config.wg_port, 51000);
        assert_eq!(config.subnet.to_string(), "10.9.0.0/28");
        assert_eq!(config.dns, vec!["9.9.9.9".parse::<IpAddr>().unwrap()]);
        assert_eq!(config.command_timeout, Duration::from_secs(3));

        let catalog = config.catalog();
        let server = catalog.get("KE").unwrap();
        assert_eq!(server.name, "Nairobi VPN");
        assert_eq!(server.ip, "198.51.100.4");

        let template = config.client_template("KEY".to_string());
        assert_eq!(template.endpoint, "vpn.example.com");
        assert_eq!(template.port, 51000);
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let config = load(&[("SERVER_ENDPOINT", "203.0.113.10"), ("PORT", "  ")]).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_endpoint_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "SERVER_ENDPOINT"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = ("SERVER_ENDPOINT", "203.0.113.10");

        assert!(matches!(
            load(&[base, ("VPN_SUBNET", "10.8.0.0")]),
            Err(ConfigError::InvalidCidr { .. })
        ));
        assert!(matches!(
            load(&[base, ("VPN_SUBNET", "10.8.0.0/31")]),
            Err(ConfigError::SubnetTooSmall { .. })
        ));
        assert!(matches!(
            load(&[base, ("DNS_SERVERS", "1.1.1.1, dns.google")]),
            Err(ConfigError::InvalidAddress { .. })
        ));
        assert!(matches!(
            load(&[base, ("PORT", "http")]),
            Err(ConfigError::InvalidPort { .. })
        ));
        assert!(matches!(
            load(&[base, ("SERVER_PUBLIC_KEY", "short")]),
            Err(ConfigError::InvalidKey { .. })
        ));
        assert!(matches!(
            load(&[base, ("WG_COMMAND_TIMEOUT_SECS", "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_explicit_public_key_wins() {
        let config = load(&[
            ("SERVER_ENDPOINT", "203.0.113.10"),
            ("SERVER_PUBLIC_KEY", "YgkBjKXER5YarD8STsvMFURw/5nhCLIFOJ5uKWrrMW4="),
            ("SERVER_PRIVATE_KEY", PRIVATE),
        ])
        .unwrap();
        let wg = WgCli::new("wg0").with_program("/nonexistent/wg");

        let key = config.resolve_server_public_key(&wg).await.unwrap();
        assert_eq!(key, "YgkBjKXER5YarD8STsvMFURw/5nhCLIFOJ5uKWrrMW4=");
    }

    #[tokio::test]
    async fn test_public_key_derived_from_private() {
        let config = load(&[
            ("SERVER_ENDPOINT", "203.0.113.10"),
            ("SERVER_PRIVATE_KEY", PRIVATE),
        ])
        .unwrap();
        let wg = WgCli::new("wg0").with_program("/nonexistent/wg");

        let key = config.resolve_server_public_key(&wg).await.unwrap();
        assert_eq!(key, derive_public_base64(PRIVATE, "test").unwrap());
    }

    #[tokio::test]
    async fn test_public_key_from_key_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wg0.key"), format!("{}\n", PRIVATE)).unwrap();

        let mut config = load(&[("SERVER_ENDPOINT", "203.0.113.10")]).unwrap();
        config.wg_config_dir = dir.path().to_path_buf();
        let wg = WgCli::new("wg0").with_program("/nonexistent/wg");

        let key = config.resolve_server_public_key(&wg).await.unwrap();
        assert_eq!(key, derive_public_base64(PRIVATE, "test").unwrap());
    }

    #[tokio::test]
    async fn test_public_key_from_conf_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("wg0.conf"),
            format!("[Interface]\nPrivateKey = {}\nListenPort = 51820\n", PRIVATE),
        )
        .unwrap();

        let mut config = load(&[("SERVER_ENDPOINT", "203.0.113.10")]).unwrap();
        config.wg_config_dir = dir.path().to_path_buf();
        let wg = WgCli::new("wg0").with_program("/nonexistent/wg");

        let key = config.resolve_server_public_key(&wg).await.unwrap();
        assert_eq!(key, derive_public_base64(PRIVATE, "test").unwrap());
    }

    #[tokio::test]
    async fn test_public_key_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = load(&[("SERVER_ENDPOINT", "203.0.113.10")]).unwrap();
        config.wg_config_dir = dir.path().to_path_buf();
        let wg = WgCli::new("wg0").with_program("/nonexistent/wg");

        let err = config.resolve_server_public_key(&wg).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "SERVER_PUBLIC_KEY"));
    }
}
