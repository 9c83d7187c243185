//! TCP splice engine (4.E): accept loop, backend dial (optionally via a
//! listed outbound interface), and handoff to [`crate::registry::Host::attach_stream`]
//! for the bidirectional copy.
//!
//! Grounded on the original `tcp.Service.Run`/`Handle`/`DialToHost`
//! (`tcp/tcp_proxy.go`) and `tcpproxy.ProxyService.Dial` (interface
//! iteration, `tcpproxy/proxy.go`), adapted to tokio's accept-loop +
//! per-connection task shape the teacher uses in `server/listener.rs`.

mod dial;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ProxyError;
use crate::registry::Registry;
use crate::selector::{Selector, TcpSelector};

/// Accept loop plus per-connection dial/splice handling.
pub struct TcpEngine {
    registry: Arc<Registry>,
    selector: TcpSelector,
}

impl TcpEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            selector: TcpSelector,
        }
    }

    /// Bind the listener on `config.addr` and accept connections until
    /// cancelled, spawning one handler task per client.
    pub async fn run(self: Arc<Self>, config: Arc<Config>) -> Result<(), ProxyError> {
        let addr: SocketAddr = resolve(&config.addr, config.protocol).await?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ProxyError::Bind { addr, source })?;
        info!(%addr, "tcp engine listening");

        loop {
            let (client, client_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let engine = Arc::clone(&self);
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                engine.handle(client, client_addr, config).await;
            });
        }
    }

    async fn handle(&self, client: TcpStream, client_addr: SocketAddr, config: Arc<Config>) {
        let hosts = self.registry.list();
        let host = match self.selector.select(&hosts) {
            Some(host) => host,
            None => {
                warn!(%client_addr, "no healthy host available");
                return;
            }
        };

        let backend = match dial::dial(&host, &config.interfaces, config.protocol).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(host = host.name(), addr = host.addr(), error = %e, "dial failed");
                return;
            }
        };

        if config.log_config.log_connections {
            info!(%client_addr, host = host.name(), addr = host.addr(), "connected");
        }

        host.attach_stream(client, backend, config.log_config.log_disconnect)
            .await;

        if config.log_config.log_disconnect {
            debug!(%client_addr, "disconnected");
        }
    }
}

/// Resolve `addr`, restricting candidates to the address family `protocol`
/// names (`tcp4`/`tcp6`; `tcp` accepts either) so a dual-stack resolution
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
