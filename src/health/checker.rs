use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::debug;

use crate::registry::Registry;

/// Periodically probes every host in the registry, refreshing its
/// `online` flag. Grounded on `tcp.Service.HealthCheck`'s interval loop
/// (`tcp/tcp_proxy.go`), generalized to the shared `Host` used by both
/// transports.
pub struct HealthChecker {
    registry: Arc<Registry>,
    period: Duration,
}

impl HealthChecker {
    pub fn new(registry: Arc<Registry>, period: Duration) -> Self {
        Self { registry, period }
    }

    /// Run the probe loop forever. Intended to be spawned as its own
    /// task; cancel by aborting the `JoinHandle`.
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        // The first tick fires immediately; skip it so hosts get their
        // optimistic `online = true` for one full period before the
        // first probe.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let hosts = self.registry.list();
            for host in &hosts {
                let online = host.health_check().await;
                debug!(host = host.name(), online, "health probe");
            }
        }
    }
}
