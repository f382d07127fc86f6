//! Static catalog of VPN servers clients can pick from

use serde::Serialize;

/// A server clients can select
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDescriptor {
    pub code: String,
    pub name: String,
    pub ip: String,
    pub flag: String,
}

impl ServerDescriptor {
    pub fn new(code: impl Into<String>, name: impl Into<String>, ip: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            flag: country_flag(&code).to_string(),
            code,
            name: name.into(),
            ip: ip.into(),
        }
    }
}

/// Read-only after startup, so no locking
#[derive(Debug, Clone, Default)]
pub struct ServerCatalog {
    servers: Vec<ServerDescriptor>,
}

impl ServerCatalog {
    /// Later entries with a duplicate code replace earlier ones
    pub fn new(servers: impl IntoIterator<Item = ServerDescriptor>) -> Self {
        let mut catalog = Self::default();
        for server in servers {
            match catalog.servers.iter_mut().find(|s| s.code == server.code) {
                Some(existing) => *existing = server,
                None => catalog.servers.push(server),
            }
        }
        catalog
    }

    pub fn list(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    /// Case-insensitive lookup by code
    pub fn get(&self, code: &str) -> Option<&ServerDescriptor> {
        self.servers
            .iter()
            .find(|s| s.code.eq_ignore_ascii_case(code.trim()))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Flag emoji for an ISO country code
pub fn country_flag(code: &str) -> &'static str {
    match code.to_ascii_uppercase().as_str() {
        "KE" => "🇰🇪",
        "US" => "🇺🇸",
        "GB" | "UK" => "🇬🇧",
        "DE" => "🇩🇪",
        "FR" => "🇫🇷",
        "SG" => "🇸🇬",
        "JP" => "🇯🇵",
        "CA" => "🇨🇦",
        "AU" => "🇦🇺",
        "NL" => "🇳🇱",
        _ => "🌍",
    }
}
