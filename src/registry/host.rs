//! A single backend: durable identity plus the runtime liveness/load
//! state the selector and transport engines read and mutate.
//!
//! Grounded on the original proxy's `tcp.host`/`udp.host` (identity +
//! `HostStatus`), generalized so one type serves both transports: the
//! `active` counter plays the role of `tcp.HostStatus.Connections` for
//! spliced TCP pipes and of the per-host UDP session count (§4.F) for
//! datagram sessions.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Protocol;
use crate::error::ProxyError;

/// 2-second connect timeout for the TCP liveness probe, matching the
/// original `tcp.host.HealthCheck`.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Copy buffer size for the TCP splice.
const SPLICE_BUFFER_SIZE: usize = 16 * 1024;

/// Maximum UDP datagram forwarded through a session (MUDS, §6).
pub const MAX_UDP_DATAGRAM: usize = 1200;

/// A configured backend with its live health/load state.
///
/// `name`/`addr`/`protocol` are fixed at construction (HostSpec);
/// `online`/`active`/the UDP session map are HostState and mutate for
/// the life of the host.
pub struct Host {
    name: String,
    addr: String,
    protocol: Protocol,
    online: AtomicBool,
    active: AtomicUsize,
    udp_idle: Duration,
    udp_sessions: RwLock<HashMap<SocketAddr, Arc<UdpSocket>>>,
}

impl Host {
    pub fn new(name: String, addr: String, protocol: Protocol, udp_idle: Duration) -> Self {
        Self {
            name,
            addr,
            protocol,
            online: AtomicBool::new(true),
            active: AtomicUsize::new(0),
            udp_idle,
            udp_sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Attempt a transport-appropriate liveness probe and update
    /// `online` accordingly. TCP dials with a 2s timeout; UDP has no
    /// standard liveness signal and is always reported online (§9 open
    /// question, inherited unchanged).
    pub async fn health_check(&self) -> bool {
        if self.protocol.is_udp() {
            self.online.store(true, Ordering::Release);
            return true;
        }

        let online = match timeout(HEALTH_CHECK_TIMEOUT, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(host = %self.name, addr = %self.addr, error = %e, "health probe failed");
                false
            }
            Err(_) => {
                debug!(host = %self.name, addr = %self.addr, "health probe timed out");
                false
            }
        };

        self.online.store(online, Ordering::Release);
        online
    }

    /// Register a TCP pipe between `client` and `backend`, increment
    /// `active`, run the bidirectional copy to completion, decrement
    /// `active`, and close both endpoints.
    ///
    /// Grounded on `tcp.host.AddReverseProxy` / `ReverseProxy.pipeBothAndClose`:
    /// two unidirectional copies raced against each other, the first to
    /// finish closes out the pipe.
    pub async fn attach_stream(&self, client: TcpStream, backend: TcpStream, log_disconnect: bool) {
        self.active.fetch_add(1, Ordering::AcqRel);

        let (mut client_read, mut client_write) = client.into_split();
        let (mut backend_read, mut backend_write) = backend.into_split();

        let client_to_backend = async {
            let result = copy(&mut client_read, &mut backend_write).await;
            let _ = backend_write.shutdown().await;
            result
        };
        let backend_to_client = async {
            let result = copy(&mut backend_read, &mut client_write).await;
            let _ = client_write.shutdown().await;
            result
        };

        tokio::pin!(client_to_backend);
        tokio::pin!(backend_to_client);

        let result = tokio::select! {
            r = &mut client_to_backend => r,
            r = &mut backend_to_client => r,
        };

        if let Err(e) = result {
            if log_disconnect {
                debug!(host = %self.name, error = %e, "pipe closed");
            }
        }

        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    /// Forward a client datagram to this host, creating the per-client
    /// upstream socket and its relay task on first contact.
    ///
    /// Grounded on `udp.host.Connect`: a per-(host, client) cache of
    /// upstream sockets, populated lazily and fed by a spawned `Relay`.
    pub async fn bind_udp(
        self: &Arc<Self>,
        datagram: Vec<u8>,
        client_addr: SocketAddr,
        listener: Arc<UdpSocket>,
    ) {
        let upstream = match self.udp_sessions.read().get(&client_addr).cloned() {
            Some(socket) => socket,
            None => match self.clone().spawn_udp_session(client_addr, listener).await {
                Ok(socket) => socket,
                Err(e) => {
                    warn!(host = %self.name, error = %e, "failed to open upstream socket");
                    return;
                }
            },
        };

        let target = &self.addr;
        if let Err(e) = upstream.send_to(&datagram, target).await {
            warn!(host = %self.name, error = %e, "failed to forward datagram to backend");
            self.udp_sessions.write().remove(&client_addr);
        }
    }

    async fn spawn_udp_session(
        self: Arc<Self>,
        client_addr: SocketAddr,
        listener: Arc<UdpSocket>,
    ) -> io::Result<Arc<UdpSocket>> {
        let bind_addr = if client_addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        self.udp_sessions.write().insert(client_addr, socket.clone());
        self.active.fetch_add(1, Ordering::AcqRel);

        let host = self;
        let upstream = socket.clone();
        tokio::spawn(async move {
            host.relay_udp(upstream, listener, client_addr).await;
        });

        Ok(socket)
    }

    /// Upstream-reader task: read datagrams from the backend with an
    /// idle deadline, writing each back to the client through the
    /// shared listening socket. Expires the session on deadline or read
    /// error, grounded on `udp.host.Relay`.
    async fn relay_udp(&self, upstream: Arc<UdpSocket>, listener: Arc<UdpSocket>, client_addr: SocketAddr) {
        let mut buf = vec![0u8; MAX_UDP_DATAGRAM];
        loop {
            match timeout(self.udp_idle, upstream.recv(&mut buf)).await {
                Ok(Ok(n)) => {
                    if let Err(e) = listener.send_to(&buf[..n], client_addr).await {
                        debug!(host = %self.name, error = %e, "failed to return datagram to client");
                        break;
                    }
                }
                Ok(Err(e)) => {
                    debug!(host = %self.name, %client_addr, error = %e, "upstream read error");
                    break;
                }
                Err(_) => {
                    debug!(host = %self.name, %client_addr, "udp session idle timeout");
                    break;
                }
            }
        }

        self.udp_sessions.write().remove(&client_addr);
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn copy<R, W>(reader: &mut R, writer: &mut W) -> Result<u64, ProxyError>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; SPLICE_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await.map_err(ProxyError::Relay)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await.map_err(ProxyError::Relay)?;
        total += n as u64;
    }
    Ok(total)
}
