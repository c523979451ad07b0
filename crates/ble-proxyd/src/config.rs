//! TOML configuration for the proxy daemon
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below, which match running the proxy with no config at all.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use ble_proxy_core::{SimulatedVehicle, VehicleTransport};
use serde::Deserialize;

/// Default log filter targets
const LOG_TARGETS: [&str; 3] = ["ble_proxyd", "ble_proxy_api", "ble_proxy_core"];

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub command: CommandConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port`, or `:port` for all interfaces
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:80".to_string(),
        }
    }
}

/// Vehicle command settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Upper bound for one command, lock wait excluded
    pub timeout_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Vehicle link selection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// In-process simulated vehicle
    Simulated {
        /// Artificial delay applied to every link step
        #[serde(default)]
        latency_ms: u64,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Simulated { latency_ms: 0 }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level applied to the proxy crates unless RUST_LOG is set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.command.timeout_secs == 0 {
            bail!("command.timeout_secs must be greater than zero");
        }
        listen_address(&self.server.listen)?;
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command.timeout_secs)
    }

    /// Listener address with the `:port` shorthand expanded
    pub fn listen_address(&self) -> anyhow::Result<String> {
        listen_address(&self.server.listen)
    }

    /// Log filter used when RUST_LOG is not set
    pub fn default_log_filter(&self, debug: bool) -> String {
        let level = if debug { "debug" } else { self.logging.level.as_str() };
        let mut directives: Vec<String> = LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect();
        if debug {
            directives.push("tower_http=debug".to_string());
        }
        directives.join(",")
    }

    /// Build the vehicle link collaborators
    pub fn build_transport(&self) -> VehicleTransport {
        match &self.transport {
            TransportConfig::Simulated { latency_ms } => {
                let vehicle = SimulatedVehicle::new();
                if *latency_ms > 0 {
                    vehicle.set_uniform_latency(Duration::from_millis(*latency_ms));
                }
                vehicle.transport()
            }
        }
    }
}

/// Expand `:port` to all interfaces and check the port is numeric
pub fn listen_address(listen: &str) -> anyhow::Result<String> {
    let (host, port) = listen
        .rsplit_once(':')
        .with_context(|| format!("listen address '{}' has no port", listen))?;
    port.parse::<u16>()
        .with_context(|| format!("invalid port in listen address '{}'", listen))?;

    let host = if host.is_empty() { "0.0.0.0" } else { host };
    Ok(format!("{}:{}", host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = ProxyConfig::from_toml("").unwrap();
        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.listen_address().unwrap(), "0.0.0.0:80");
        assert_eq!(config.command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_full_config() {
        let config = ProxyConfig::from_toml(
            r#"
            [server]
            listen = "127.0.0.1:8080"

            [command]
            timeout_secs = 10

            [transport]
            type = "simulated"
            latency_ms = 250

            [logging]
            level = "warn"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_address().unwrap(), "127.0.0.1:8080");
        assert_eq!(config.command_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.transport,
            TransportConfig::Simulated { latency_ms: 250 }
        );
        assert!(config.logging.json);
        assert_eq!(
            config.default_log_filter(false),
            "ble_proxyd=warn,ble_proxy_api=warn,ble_proxy_core=warn"
        );
    }

    #[test]
    fn test_port_shorthand() {
        assert_eq!(listen_address(":8080").unwrap(), "0.0.0.0:8080");
        assert_eq!(listen_address("localhost:80").unwrap(), "localhost:80");
        assert!(listen_address("8080").is_err());
        assert!(listen_address(":http").is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ProxyConfig::from_toml("[command]\ntimeout_secs = 0").is_err());
        assert!(ProxyConfig::from_toml("[transport]\ntype = \"bluetooth\"").is_err());
        assert!(ProxyConfig::from_toml("[server]\nlisten = \"nowhere\"").is_err());
        assert!(ProxyConfig::from_toml("[unknown]\nkey = 1").is_err());
    }

    #[test]
    fn test_debug_filter_enables_request_tracing() {
        let filter = ProxyConfig::default().default_log_filter(true);
        assert!(filter.contains("ble_proxy_core=debug"));
        assert!(filter.contains("tower_http=debug"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nlisten = \":9000\"").unwrap();

        let config = ProxyConfig::load(file.path()).unwrap();
        assert_eq!(config.listen_address().unwrap(), "0.0.0.0:9000");
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = ProxyConfig::load(Path::new("/nonexistent/ble-proxy.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ble-proxy.toml"));
    }
}
