//! UDP relay engine (4.F): a single shared listening socket, a
//! service-level session cache pinning each client to a host for a
//! bounded idle window, and per-host upstream sockets doing the actual
//! relay (owned by [`crate::registry::Host`]).
//!
//! Grounded on the original `udp.Service.Run`/`Handle`
//! (`udp/udp_proxy.go`), with the selector swapped for the
//! specification's least-connections policy in place of the source's
//! random pick, and the client→host pin implemented with
//! [`crate::cache::TtlCache`] in place of the source's own
//! `udp.Cache`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::ProxyError;
use crate::registry::{Host, Registry, MAX_UDP_DATAGRAM};
use crate::selector::{Selector, UdpSelector};

/// Read loop plus the client→host session cache (service level, 4.A).
pub struct UdpEngine {
    registry: Arc<Registry>,
    selector: UdpSelector,
    sessions: Arc<TtlCache<Arc<Host>>>,
}

impl UdpEngine {
    pub fn new(registry: Arc<Registry>, udp_idle_ms: u64) -> Self {
        Self {
            registry,
            selector: UdpSelector,
            sessions: Arc::new(TtlCache::new(Duration::from_millis(udp_idle_ms))),
        }
    }

    /// Bind the shared listening socket and read datagrams until
    /// cancelled, routing each to its pinned or newly-selected host.
    pub async fn run(self: Arc<Self>, config: Arc<Config>) -> Result<(), ProxyError> {
        let addr: SocketAddr = resolve(&config.addr, config.protocol).await?;
        let listener = Arc::new(
            UdpSocket::bind(addr)
                .await
                .map_err(|source| ProxyError::Bind { addr, source })?,
        );
        info!(%addr, "udp engine listening");

        let _sweeper = Arc::clone(&self.sessions).spawn_sweeper();

        let mut buf = vec![0u8; MAX_UDP_DATAGRAM];
        loop {
            let (n, client_addr) = match listener.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "failed to read datagram");
                    continue;
                }
            };

            let host = match self.route(client_addr) {
                Some(host) => host,
                None => {
                    warn!(%client_addr, "no healthy host available, dropping datagram");
                    continue;
                }
            };

            let datagram = buf[..n].to_vec();
            let listener = Arc::clone(&listener);
            tokio::spawn(async move {
                host.bind_udp(datagram, client_addr, listener).await;
            });
        }
    }

    /// Return the host pinned to `client_addr`, selecting and caching
    /// one on first contact.
    fn route(&self, client_addr: SocketAddr) -> Option<Arc<Host>> {
        let key = client_addr.to_string();
        if let Some(host) = self.sessions.get(&key) {
            return Some(host);
        }

        let hosts = self.registry.list();
        let host = self.selector.select(&hosts)?;
        self.sessions.put(key, host.clone());
        Some(host)
    }
}

/// Resolve `addr`, restricting candidates to the address family `protocol`
/// names (`udp4`/`udp6`; `udp` accepts either) so a dual-stack resolution
/// can't silently bind the wrong family.
async fn resolve(addr: &str, protocol: crate::config::Protocol) -> Result<SocketAddr, ProxyError> {
    tokio::net::lookup_host(addr)
        .await
        .ok()
        .and_then(|it| it.filter(|a| protocol.matches(a)).next())
        .ok_or_else(|| ProxyError::Dial {
            name: "listener".to_string(),
            addr: addr.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "unresolvable address"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Protocol};

    #[tokio::test]
    async fn resolve_restricts_to_the_requested_family() {
        let v4 = resolve("127.0.0.1:0", Protocol::Udp4).await.unwrap();
        assert!(v4.is_ipv4());

        let v6 = resolve("[::1]:0", Protocol::Udp6).await.unwrap();
        assert!(v6.is_ipv6());

        assert!(resolve("127.0.0.1:0", Protocol::Udp6).await.is_err());
    }

    #[test]
    fn route_is_sticky_within_ttl() {
        let registry = Registry::new(Config::default_config());
        let engine = UdpEngine::new(registry, 50);
        let client: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        let first = engine.route(client).unwrap();
        let second = engine.route(client).unwrap();
        assert_eq!(first.name(), second.name());
    }

    #[test]
    fn empty_registry_routes_nowhere() {
        let mut config = Config::default_config();
        config.hosts.clear();
        let registry = Registry::new(config);
        let engine = UdpEngine::new(registry, 50);
        let client: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        assert!(engine.route(client).is_none());
    }
}
