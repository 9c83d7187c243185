//! Load-balancing policy: given a snapshot of hosts, pick the one a new
//! client or datagram should go to. Never mutates state — callers
//! increment/decrement `active` through [`crate::registry::Host`]
//! operations.
//!
//! Grounded on the teacher's `Balancer` trait (`balancer/mod.rs`) and
//! `LeastConnBalancer` (`balancer/least_conn.rs`), simplified to the
//! two fixed policies the specification requires: TCP considers
//! liveness, UDP does not (§4.D, §9 "least-connections vs random").

use std::sync::Arc;

use crate::registry::Host;

/// Chooses one host from a snapshot, or `None` if none qualifies.
pub trait Selector: Send + Sync {
    fn select(&self, hosts: &[Arc<Host>]) -> Option<Arc<Host>>;
}

/// Least-connections among online hosts; ties broken by lowest index.
pub struct TcpSelector;

impl Selector for TcpSelector {
    fn select(&self, hosts: &[Arc<Host>]) -> Option<Arc<Host>> {
        least_connections(hosts, true)
    }
}

/// Least-connections across all hosts, liveness not considered (§9
/// open question: UDP has no standard liveness probe).
pub struct UdpSelector;

impl Selector for UdpSelector {
    fn select(&self, hosts: &[Arc<Host>]) -> Option<Arc<Host>> {
        least_connections(hosts, false)
    }
}

fn least_connections(hosts: &[Arc<Host>], require_online: bool) -> Option<Arc<Host>> {
    let mut best: Option<&Arc<Host>> = None;
    let mut best_count = usize::MAX;

    for host in hosts {
        if require_online && !host.is_online() {
            continue;
        }
        let count = host.connection_count();
        if count < best_count {
            best_count = count;
            best = Some(host);
        }
    }

    best.cloned()
}
