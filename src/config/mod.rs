mod types;

pub use types::*;

use std::path::Path;

use crate::error::ConfigError;

/// Fixed config file name, matching the original proxy's convention.
pub const CONFIG_FILE_NAME: &str = "glass.proxy.json";

impl Config {
    /// Load a configuration from `path`. Does not apply the flag overlay —
    /// callers combine this with [`crate::cli::Flags::apply`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or write and return [`Config::default_config`] if it
    /// does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default_config();
            config.save(path)?;
            return Ok(config);
        }
        Config::load(path)
    }

    /// Persist this configuration to `path`, 4-space indented, matching
    /// the layout the original proxy writes.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut buf,
            serde_json::ser::PrettyFormatter::with_indent(b"    "),
        );
        serde::Serialize::serialize(self, &mut serializer).map_err(ConfigError::Serialize)?;

        std::fs::write(path, buf).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.trim().is_empty() {
            return Err(ConfigError::Invalid("addr must not be empty".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return Err(ConfigError::Invalid("host name must not be empty".to_string()));
            }
            if !seen.insert(host.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate host name '{}'",
                    host.name
                )));
            }
        }

        if self.health_check_seconds == 0 {
            return Err(ConfigError::Invalid(
                "healthCheckSeconds must be positive".to_string(),
            ));
        }

        if self.protocol.is_udp() && self.udp_idle_ms == 0 {
            return Err(ConfigError::Invalid("udpIdleMs must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    struct NamedTempFile {
        path: PathBuf,
    }

    impl NamedTempFile {
        fn new(tag: &str) -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!("glass-proxy-test-{}-{}.json", std::process::id(), tag));
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for NamedTempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(Config::default_config().validate().is_ok());
    }

    #[test]
    fn save_then_load_round_trips() {
        let file = NamedTempFile::new("round-trip");
        let config = Config::default_config();
        config.save(file.path()).unwrap();
        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn rejects_duplicate_host_names() {
        let mut config = Config::default_config();
        let first = config.hosts[0].clone();
        config.hosts.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_addr() {
        let mut config = Config::default_config();
        config.addr = "".to_string();
        assert!(config.validate().is_err());
    }
}
