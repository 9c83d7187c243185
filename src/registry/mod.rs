//! Concurrently mutable collection of [`Host`]s, safe to read on the
//! hot selection path while the control plane (4.H) mutates it.
//!
//! Grounded on the teacher's `SharedState` + `ArcSwap` hot-reload shape
//! (`server/mod.rs`) and on the original `tcpproxy.ProxyService`'s
//! `LoadHosts`/`AddHost`/`RemHost`/`GetHost` family, merged into one
//! type shared by both transports.

mod host;

pub use host::{Host, MAX_UDP_DATAGRAM};

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::RwLock;

use crate::config::{Config, HostConfig};

/// A snapshot of one host's identity and live state, as returned by
/// [`Registry::list_hosts`] for the `list` console command (4.H).
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub name: String,
    pub addr: String,
    pub online: bool,
    pub active: usize,
}

/// Owns the configuration snapshot and the live host sequence built
/// from it. Configuration mutation and host-sequence rebuild are
/// serialized through [`Registry::reload`]; reads of either never
/// observe a torn state.
pub struct Registry {
    config: ArcSwap<Config>,
    hosts: RwLock<Vec<Arc<Host>>>,
}

impl Registry {
    /// Build a registry from a configuration snapshot and populate its
    /// initial host sequence.
    pub fn new(config: Config) -> Arc<Self> {
        let registry = Arc::new(Self {
            config: ArcSwap::from_pointee(config),
            hosts: RwLock::new(Vec::new()),
        });
        registry.reload();
        registry
    }

    /// Snapshot of the current hosts in insertion order (4.C `list`).
    pub fn list(&self) -> Vec<Arc<Host>> {
        self.hosts.read().clone()
    }

    /// Rebuild the host sequence from the current configuration's
    /// `hosts` list. Identity is by position: old host objects are
    /// discarded, but in-flight pipes/sessions referencing them via
    /// their own `Arc` keep working until they complete (§9).
    pub fn reload(&self) {
        let config = self.config.load();
        let udp_idle = Duration::from_millis(config.udp_idle_ms);
        let new_hosts: Vec<Arc<Host>> = config
            .hosts
            .iter()
            .map(|spec| {
                Arc::new(Host::new(
                    spec.name.clone(),
                    spec.addr.clone(),
                    config.protocol,
                    udp_idle,
                ))
            })
            .collect();
        *self.hosts.write() = new_hosts;
    }

    /// Append `spec` to the configuration and rebuild; a host sharing
    /// its name is replaced (its in-flight connections are unaffected —
    /// they hold their own `Arc<Host>`, just no longer reachable from
    /// the registry for new work) (4.H `add_host`).
    pub fn add_host(&self, spec: HostConfig) {
        self.config.rcu(|current| {
            let mut next = (**current).clone();
            match next.hosts.iter_mut().find(|h| h.name == spec.name) {
                Some(existing) => *existing = spec.clone(),
                None => next.hosts.push(spec.clone()),
            }
            next
        });
        self.reload();
    }

    /// Drop the host named `name` from the configuration and rebuild;
    /// a no-op if absent (4.H `remove_host`).
    pub fn remove_host(&self, name: &str) {
        self.config.rcu(|current| {
            let mut next = (**current).clone();
            next.hosts.retain(|h| h.name != name);
            next
        });
        self.reload();
    }

    /// Snapshot of (name, addr, online, active) for every host (4.H
    /// `list_hosts`), consumed by the `list` console command.
    pub fn list_hosts(&self) -> Vec<HostInfo> {
        self.list()
            .iter()
            .map(|host| HostInfo {
                name: host.name().to_string(),
                addr: host.addr().to_string(),
                online: host.is_online(),
                active: host.connection_count(),
            })
            .collect()
    }

    /// The live configuration snapshot, for persistence (4.H
    /// `get_config`).
    pub fn get_config(&self) -> Arc<Config> {
        self.config.load_full()
    }
}
