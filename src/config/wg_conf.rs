//! WireGuard `.conf` reader
//!
//! Reads `[Interface]` and `[Peer]` sections of the files `wg-quick` uses.
//! Only the keys this service cares about are kept; the rest are skipped.

use std::net::IpAddr;
use std::path::Path;

use ipnet::{IpNet, Ipv4Net};

use crate::crypto::keys::{decode_key, KEY_LEN};
use crate::error::ConfigError;

/// Parsed configuration file
#[derive(Debug, Clone, Default)]
pub struct WgConf {
    pub interface: WgInterface,
    pub peers: Vec<WgPeer>,
}

#[derive(Debug, Clone, Default)]
pub struct WgInterface {
    /// Absent when the key is set by a PostUp hook instead
    pub private_key: Option<[u8; KEY_LEN]>,
    pub address: Vec<Ipv4Net>,
    pub dns: Vec<IpAddr>,
    pub listen_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct WgPeer {
    pub public_key: [u8; KEY_LEN],
    /// `host:port`, kept as text since the host may be a name
    pub endpoint: Option<String>,
    pub allowed_ips: Vec<IpNet>,
    pub persistent_keepalive: Option<u16>,
}

#[derive(Clone, Copy)]
enum Section {
    Interface,
    Peer,
}

#[derive(Default)]
struct PeerBuilder {
    public_key: Option<[u8; KEY_LEN]>,
    endpoint: Option<String>,
    allowed_ips: Vec<IpNet>,
    persistent_keepalive: Option<u16>,
}

impl PeerBuilder {
    fn build(self, line: usize) -> Result<WgPeer, ConfigError> {
        let public_key = self.public_key.ok_or(ConfigError::ParseError {
            line,
            message: "[Peer] section without PublicKey".to_string(),
        })?;
        Ok(WgPeer {
            public_key,
            endpoint: self.endpoint,
            allowed_ips: self.allowed_ips,
            persistent_keepalive: self.persistent_keepalive,
        })
    }
}

impl WgConf {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut conf = WgConf::default();
        let mut section: Option<Section> = None;
        let mut peer: Option<(usize, PeerBuilder)> = None;

        for (index, raw) in content.lines().enumerate() {
            let line_num = index + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') {
                if let Some((start, builder)) = peer.take() {
                    conf.peers.push(builder.build(start)?);
                }
                section = if line.eq_ignore_ascii_case("[interface]") {
                    Some(Section::Interface)
                } else if line.eq_ignore_ascii_case("[peer]") {
                    peer = Some((line_num, PeerBuilder::default()));
                    Some(Section::Peer)
                } else {
                    return Err(ConfigError::ParseError {
                        line: line_num,
                        message: format!("Unknown section: {}", line),
                    });
                };
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::ParseError {
                    line: line_num,
                    message: format!("Expected 'key = value', got: {}", line),
                });
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match (section, peer.as_mut()) {
                (Some(Section::Interface), _) => {
                    parse_interface_key(&mut conf.interface, &key, value, line_num)?
                }
                (Some(Section::Peer), Some((_, builder))) => {
                    parse_peer_key(builder, &key, value, line_num)?
                }
                _ => {
                    return Err(ConfigError::ParseError {
                        line: line_num,
                        message: "Configuration value outside of any section".to_string(),
                    });
                }
            }
        }

        if let Some((start, builder)) = peer.take() {
            conf.peers.push(builder.build(start)?);
        }

        Ok(conf)
    }
}

fn parse_interface_key(
    iface: &mut WgInterface,
    key: &str,
    value: &str,
    line: usize,
) -> Result<(), ConfigError> {
    match key {
        "privatekey" => iface.private_key = Some(decode_key(value, "PrivateKey")?),
        "address" => {
            for item in split_list(value) {
                // IPv6 addresses are accepted but not tracked
                let net: IpNet = item.parse().map_err(|_| ConfigError::InvalidCidr {
                    value: item.to_string(),
                })?;
                if let IpNet::V4(v4) = net {
                    iface.address.push(v4);
                }
            }
        }
        "dns" => {
            for item in split_list(value) {
                let dns: IpAddr = item.parse().map_err(|_| ConfigError::InvalidAddress {
                    value: item.to_string(),
                })?;
                iface.dns.push(dns);
            }
        }
        "listenport" => {
            iface.listen_port = Some(value.parse().map_err(|_| ConfigError::ParseError {
                line,
                message: format!("Invalid ListenPort: {}", value),
            })?);
        }
        _ => tracing::trace!("Skipping interface key: {}", key),
    }
    Ok(())
}

fn parse_peer_key(
    peer: &mut PeerBuilder,
    key: &str,
    value: &str,
    line: usize,
) -> Result<(), ConfigError> {
    match key {
        "publickey" => peer.public_key = Some(decode_key(value, "PublicKey")?),
        "endpoint" => {
            if !value.contains(':') {
                return Err(ConfigError::InvalidAddress {
                    value: value.to_string(),
                });
            }
            peer.endpoint = Some(value.to_string());
        }
        "allowedips" => {
            for item in split_list(value) {
                let net: IpNet = item.parse().map_err(|_| ConfigError::InvalidCidr {
                    value: item.to_string(),
                })?;
                peer.allowed_ips.push(net);
            }
        }
        "persistentkeepalive" => {
            peer.persistent_keepalive =
                Some(value.parse().map_err(|_| ConfigError::ParseError {
                    line,
                    message: format!("Invalid PersistentKeepalive: {}", value),
                })?);
        }
        _ => tracing::trace!("Skipping peer key: {}", key),
    }
    Ok(())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
