//! End-to-end TCP splice test: an echo backend behind the proxy, driven
//! through a real socket round trip. Grounded on §8 scenario 1 (TCP
//! echo fan-out), scaled down from 500 concurrent clients to a handful
//! so the suite stays fast.

use std::sync::Arc;
use std::time::Duration;

use glass_proxy::config::{Config, HostConfig, LogConfig, Protocol};
use glass_proxy::registry::Registry;
use glass_proxy::tcp::TcpEngine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn spawn_echo_backend() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                loop {
                    let n = match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    if stream.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

fn test_config(proxy_addr: &str, backend_addr: std::net::SocketAddr) -> Config {
    Config {
        protocol: Protocol::Tcp,
        addr: proxy_addr.to_string(),
        interfaces: Vec::new(),
        hosts: vec![HostConfig {
            name: "echo".to_string(),
            addr: backend_addr.to_string(),
        }],
        log_config: LogConfig {
            log_connections: true,
            log_disconnect: true,
        },
        health_check_seconds: 5,
        save_config_on_close: false,
        udp_idle_ms: 3000,
    }
}

#[tokio::test]
async fn echoes_bytes_back_through_the_proxy() {
    let backend_addr = spawn_echo_backend().await;
    let config = Arc::new(test_config("127.0.0.1:28551", backend_addr));

    let registry = Registry::new((*config).clone());
    let engine = Arc::new(TcpEngine::new(registry));
    let engine_handle = tokio::spawn({
        let config = Arc::clone(&config);
        async move {
            let _ = engine.run(config).await;
        }
    });

    // Give the accept loop a moment to bind.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TcpStream::connect(&config.addr).await.unwrap();
    let payload = b"the quick brown fox";
    client.write_all(payload).await.unwrap();

    let mut received = vec![0u8; payload.len()];
    client.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, payload);

    drop(client);
    engine_handle.abort();
}

#[tokio::test]
async fn active_count_returns_to_zero_after_disconnect() {
    let backend_addr = spawn_echo_backend().await;
    let config = Arc::new(test_config("127.0.0.1:28552", backend_addr));

    let registry = Registry::new((*config).clone());
    let engine = Arc::new(TcpEngine::new(Arc::clone(&registry)));
    let engine_handle = tokio::spawn({
        let config = Arc::clone(&config);
        async move {
            let _ = engine.run(config).await;
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    {
        let mut client = TcpStream::connect(&config.addr).await.unwrap();
        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(registry.list()[0].connection_count(), 0);

    engine_handle.abort();
}

#[tokio::test]
async fn no_healthy_host_closes_client_without_hanging() {
    let config = Arc::new(test_config("127.0.0.1:28553", "127.0.0.1:1".parse().unwrap()));
    // Mark the only host offline by pointing it at an address that will
    // fail health checks; since the engine itself doesn't probe, we
    // simulate "no healthy host" by clearing the host list outright.
    let mut bare = (*config).clone();
    bare.hosts.clear();
    let config = Arc::new(bare);

    let registry = Registry::new((*config).clone());
    let engine = Arc::new(TcpEngine::new(registry));
    let engine_handle = tokio::spawn({
        let config = Arc::clone(&config);
        async move {
            let _ = engine.run(config).await;
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TcpStream::connect(&config.addr).await.unwrap();
    let mut buf = [0u8; 1];
    // The proxy accepts then immediately closes: a read should observe EOF.
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);

    engine_handle.abort();
}
