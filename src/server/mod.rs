//! Process bootstrap (Component M, ambient): wires the registry to a
//! transport engine, the health checker, and the stdin console, then
//! waits for a shutdown signal — the process-level orchestration the
//! specification calls out as an external collaborator of the core.
//!
//! Grounded on the teacher's `Server`/`shutdown_signal` shape
//! (`server/mod.rs`) and the original `tcp.Service.Run`/`udp.Service.Run`
//! (spawn health checker, then serve), simplified to the spec's single
//! listener/single transport topology.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::Config;
use crate::console::Console;
use crate::error::ProxyError;
use crate::health::HealthChecker;
use crate::registry::Registry;
use crate::tcp::TcpEngine;
use crate::udp::UdpEngine;

pub struct Server {
    config_path: PathBuf,
    config: Arc<Config>,
    registry: Arc<Registry>,
}

impl Server {
    pub fn with_path(config: Config, config_path: PathBuf) -> Self {
        let config = Arc::new(config);
        let registry = Registry::new((*config).clone());

        Self {
            config_path,
            config,
            registry,
        }
    }

    /// Start the transport engine, health checker and console, then
    /// block until a shutdown signal (Ctrl+C, SIGTERM, the console's
    /// `stop` command), or the transport engine exiting (a `Bind`
    /// failure is fatal per spec.md §7 — only listener bind and initial
    /// configuration errors terminate the process). Cancels every
    /// spawned task on the way out and propagates a fatal engine error
    /// so the process exits non-zero.
    pub async fn run(&self) -> anyhow::Result<()> {
        let (shutdown_tx, _) = broadcast::channel(1);

        let mut engine_handle = self.spawn_engine();

        let health_checker = HealthChecker::new(
            Arc::clone(&self.registry),
            Duration::from_secs(self.config.health_check_seconds),
        );
        let health_handle = tokio::spawn(health_checker.run());

        let console = Console::new(Arc::clone(&self.registry), self.config_path.clone());
        let console_shutdown = shutdown_tx.clone();
        let console_handle = tokio::spawn(console.run(console_shutdown));

        info!(addr = %self.config.addr, protocol = self.config.protocol.as_str(), "glass-proxy started");

        let mut shutdown_rx = shutdown_tx.subscribe();
        let fatal = tokio::select! {
            _ = shutdown_signal() => {
                info!("shutdown signal received");
                None
            }
            _ = shutdown_rx.recv() => {
                info!("stop command received");
                None
            }
            joined = &mut engine_handle => Some(joined),
        };

        if fatal.is_none() {
            engine_handle.abort();
        }
        health_handle.abort();
        console_handle.abort();

        if self.config.save_config_on_close {
            if let Err(e) = self.registry.get_config().save(&self.config_path) {
                error!(error = %e, "failed to save configuration on shutdown");
            }
        }

        info!("glass-proxy stopped");

        match fatal {
            None => Ok(()),
            Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(e))) => {
                error!(error = %e, "transport engine failed to start");
                Err(e.into())
            }
            Some(Err(join_err)) => {
                error!(error = %join_err, "transport engine task panicked");
                Err(join_err.into())
            }
        }
    }

    fn spawn_engine(&self) -> tokio::task::JoinHandle<Result<(), ProxyError>> {
        let config = Arc::clone(&self.config);
        let registry = Arc::clone(&self.registry);

        if config.protocol.is_udp() {
            let engine = Arc::new(UdpEngine::new(registry, config.udp_idle_ms));
            tokio::spawn(async move { engine.run(config).await })
        } else {
            let engine = Arc::new(TcpEngine::new(registry));
            tokio::spawn(async move { engine.run(config).await })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, HostConfig, Protocol};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn bind_failure_is_fatal_and_propagates() {
        // Occupy a port so the listener bind inside the spawned engine fails.
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let mut config = Config::default_config();
        config.protocol = Protocol::Tcp;
        config.addr = addr.to_string();
        config.hosts = vec![HostConfig {
            name: "h".to_string(),
            addr: "127.0.0.1:1".to_string(),
        }];

        let server = Server::with_path(config, PathBuf::from("unused.json"));
        let result = server.run().await;
        assert!(result.is_err());

        drop(occupied);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
