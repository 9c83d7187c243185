use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced by the core proxy subsystems.
///
/// Per-request variants (`NoHealthyHost`, `Dial`, `Interface`, `Relay`,
/// `HealthProbe`) are always handled locally by the caller: logged and
/// the offending connection/datagram dropped. Only `Config` and `Bind`
/// are fatal at process startup.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("no healthy host available")]
    NoHealthyHost,

    #[error("failed to dial host '{name}' ({addr}): {source}")]
    Dial {
        name: String,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("outbound interface '{name}' unusable: {reason}")]
    Interface { name: String, reason: String },

    #[error("relay error: {0}")]
    Relay(#[source] std::io::Error),

    #[error("health probe failed for '{name}': {source}")]
    HealthProbe {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration load/parse/write failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
