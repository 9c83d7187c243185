//! Backend dial strategy: plain dial, or iteration over configured
//! outbound interfaces (§4.E step 2).
//!
//! Grounded on `tcpproxy.ProxyService.Dial`/`createDialer`
//! (`tcpproxy/proxy.go`): walk `config.interfaces` in order, enumerate
//! each interface's addresses, and attempt a dial bound to each
//! non-unspecified local IP (port 0) in turn. First success wins.

use std::net::{IpAddr, SocketAddr};

use tokio::net::{TcpSocket, TcpStream};

use crate::config::Protocol;
use crate::error::ProxyError;
use crate::registry::Host;

pub async fn dial(host: &Host, interfaces: &[String], protocol: Protocol) -> Result<TcpStream, ProxyError> {
    let target = resolve(host, protocol).await?;

    if interfaces.is_empty() {
        return TcpStream::connect(target).await.map_err(|source| ProxyError::Dial {
            name: host.name().to_string(),
            addr: host.addr().to_string(),
            source,
        });
    }

    for interface in interfaces {
        let addrs = match interface_addrs(interface) {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::debug!(interface, error = %e, "outbound interface unusable, skipping");
                continue;
            }
        };

        for ip in addrs {
            if ip.is_unspecified() || !protocol.matches(&SocketAddr::new(ip, 0)) {
                continue;
            }
            match dial_from(ip, target).await {
                Ok(stream) => return Ok(stream),
                Err(_) => continue,
            }
        }
    }

    Err(ProxyError::Dial {
        name: host.name().to_string(),
        addr: host.addr().to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "couldn't dial a connection over any of the given interfaces",
        ),
    })
}

async fn dial_from(local: IpAddr, target: SocketAddr) -> std::io::Result<TcpStream> {
    let socket = if local.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.bind(SocketAddr::new(local, 0))?;
    socket.connect(target).await
}

async fn resolve(host: &Host, protocol: Protocol) -> Result<SocketAddr, ProxyError> {
    tokio::net::lookup_host(host.addr())
        .await
        .ok()
        .and_then(|it| it.filter(|a| protocol.matches(a)).next())
        .ok_or_else(|| ProxyError::Dial {
            name: host.name().to_string(),
            addr: host.addr().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "unresolvable address"),
        })
}

#[cfg(unix)]
fn interface_addrs(name: &str) -> std::io::Result<Vec<IpAddr>> {
    use nix::ifaddrs::getifaddrs;
    use nix::sys::socket::SockaddrLike;

    let addrs = getifaddrs().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let mut found = Vec::new();
    for ifaddr in addrs {
        if ifaddr.interface_name != name {
            continue;
        }
        let Some(address) = ifaddr.address else {
            continue;
        };
        if let Some(v4) = address.as_sockaddr_in() {
            found.push(IpAddr::V4(std::net::Ipv4Addr::from(v4.ip())));
        } else if let Some(v6) = address.as_sockaddr_in6() {
            found.push(IpAddr::V6(v6.ip()));
        }
    }
    Ok(found)
}

#[cfg(not(unix))]
fn interface_addrs(_name: &str) -> std::io::Result<Vec<IpAddr>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "outbound interface binding is not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use std::time::Duration;

    #[tokio::test]
    async fn no_interfaces_dials_directly() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let host = Host::new("h".to_string(), addr.to_string(), Protocol::Tcp, Duration::from_secs(1));

        let accept = tokio::spawn(async move { listener.accept().await });
        let stream = dial(&host, &[], Protocol::Tcp).await;
        assert!(stream.is_ok());
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unusable_interface_surfaces_as_dial_error() {
        let host = Host::new(
            "h".to_string(),
            "127.0.0.1:1".to_string(),
            Protocol::Tcp,
            Duration::from_secs(1),
        );
        let result = dial(&host, &["definitely-not-a-real-interface".to_string()], Protocol::Tcp).await;
        assert!(matches!(result, Err(ProxyError::Dial { .. })));
    }

    #[test]
    fn protocol_matches_restricts_by_family() {
        let v4: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let v6: SocketAddr = "[::1]:1".parse().unwrap();

        assert!(Protocol::Tcp.matches(&v4) && Protocol::Tcp.matches(&v6));
        assert!(Protocol::Tcp4.matches(&v4) && !Protocol::Tcp4.matches(&v6));
        assert!(Protocol::Tcp6.matches(&v6) && !Protocol::Tcp6.matches(&v4));
    }
}
