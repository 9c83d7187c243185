//! Health checker (4.G): a periodic task that snapshots the registry
//! and invokes each host's liveness probe, updating `online` for
//! subsequent selection decisions. Never removes hosts — only flips
//! liveness.
//!
//! Grounded on the teacher's interval-ticker shape
//! (`health/checker.rs`'s `start()` loop), with the HTTP probe it used
//! replaced by the TCP-dial probe from the original
//! `tcp.Service.HealthCheck` (`tcp/tcp_proxy.go`): per spec, the probe
//! itself lives on [`crate::registry::Host::health_check`], not here.

mod checker;

pub use checker::HealthChecker;
