use serde::{Deserialize, Serialize};

/// Top level configuration, serialized to/from `glass.proxy.json`.
///
/// Field names and nesting (particularly the `LogConfiguration` object)
/// mirror the on-disk shape exactly so that a saved file can be loaded
/// back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub protocol: Protocol,

    pub addr: String,

    #[serde(default)]
    pub interfaces: Vec<String>,

    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    #[serde(rename = "LogConfiguration", default)]
    pub log_config: LogConfig,

    #[serde(rename = "healthCheckSeconds", default = "default_health_check_seconds")]
    pub health_check_seconds: u64,

    #[serde(rename = "saveConfigOnClose", default)]
    pub save_config_on_close: bool,

    #[serde(rename = "udpIdleMs", default = "default_udp_idle_ms")]
    pub udp_idle_ms: u64,
}

/// The transport/address-family combination the listener binds as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
}

impl Protocol {
    pub fn is_udp(self) -> bool {
        matches!(self, Protocol::Udp | Protocol::Udp4 | Protocol::Udp6)
    }

    pub fn is_tcp(self) -> bool {
        !self.is_udp()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Tcp4 => "tcp4",
            Protocol::Tcp6 => "tcp6",
            Protocol::Udp => "udp",
            Protocol::Udp4 => "udp4",
            Protocol::Udp6 => "udp6",
        }
    }

    /// Whether a resolved address is admissible for this protocol. The
    /// bare `tcp`/`udp` variants accept either family; the `4`/`6`
    /// suffixed variants restrict resolution, bind and dial to exactly
    /// that family, matching `net.Listen`/`net.Dial`'s own family
    /// restriction for those network names in the original proxy.
    pub fn matches(self, addr: &std::net::SocketAddr) -> bool {
        match self {
            Protocol::Tcp4 | Protocol::Udp4 => addr.is_ipv4(),
            Protocol::Tcp6 | Protocol::Udp6 => addr.is_ipv6(),
            Protocol::Tcp | Protocol::Udp => true,
        }
    }
}

/// A single configured backend: name + `host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub name: String,
    pub addr: String,
}

/// What to log on the per-connection hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(rename = "logConnections", default = "default_true")]
    pub log_connections: bool,

    #[serde(rename = "logDisconnect", default)]
    pub log_disconnect: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_connections: default_true(),
            log_disconnect: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_health_check_seconds() -> u64 {
    5
}

fn default_udp_idle_ms() -> u64 {
    3000
}

impl Config {
    /// The configuration shipped the first time the proxy runs without a
    /// `glass.proxy.json` on disk.
    pub fn default_config() -> Self {
        Self {
            protocol: Protocol::Tcp,
            addr: "0.0.0.0:25565".to_string(),
            interfaces: Vec::new(),
            hosts: vec![HostConfig {
                name: "Server-1".to_string(),
                addr: "localhost:25580".to_string(),
            }],
            log_config: LogConfig::default(),
            health_check_seconds: default_health_check_seconds(),
            save_config_on_close: false,
            udp_idle_ms: default_udp_idle_ms(),
        }
    }
}
