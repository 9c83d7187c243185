use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// Runtime flag overlay: each flag, when passed, overrides the
/// corresponding field of the loaded configuration.
#[derive(Parser, Debug)]
#[command(name = "glassproxy")]
#[command(about = "Transparent layer-4 reverse proxy and load balancer")]
#[command(version)]
pub struct Flags {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "glass.proxy.json")]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Validate configuration and exit.
    #[arg(long)]
    pub validate: bool,

    /// Log connections which were successfully bridged.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub logc: Option<bool>,

    /// Log connections which were closed.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub logd: Option<bool>,

    /// Save the config when the server is stopped.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub save: Option<bool>,

    /// The address to start the server on.
    #[arg(long)]
    pub addr: Option<String>,

    /// The time (in seconds) between health checks.
    #[arg(long)]
    pub health: Option<u64>,

    /// The idle timeout (in milliseconds) for UDP sessions.
    #[arg(long = "udp-idle")]
    pub udp_idle: Option<u64>,
}

impl Flags {
    /// Overlay the flags onto a loaded configuration, in place.
    pub fn apply(&self, config: &mut Config) {
        if let Some(v) = self.logc {
            config.log_config.log_connections = v;
        }
        if let Some(v) = self.logd {
            config.log_config.log_disconnect = v;
        }
        if let Some(v) = self.save {
            config.save_config_on_close = v;
        }
        if let Some(ref v) = self.addr {
            config.addr = v.clone();
        }
        if let Some(v) = self.health {
            config.health_check_seconds = v;
        }
        if let Some(v) = self.udp_idle {
            config.udp_idle_ms = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_overrides_only_set_fields() {
        let flags = Flags {
            config: PathBuf::from(super::super::config::CONFIG_FILE_NAME),
            debug: false,
            validate: false,
            logc: Some(false),
            logd: None,
            save: None,
            addr: Some("0.0.0.0:9999".to_string()),
            health: None,
            udp_idle: None,
        };

        let mut config = Config::default_config();
        let original_health = config.health_check_seconds;
        flags.apply(&mut config);

        assert!(!config.log_config.log_connections);
        assert_eq!(config.addr, "0.0.0.0:9999");
        assert_eq!(config.health_check_seconds, original_health);
    }
}
