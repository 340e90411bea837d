//! Configuration structs with sensible defaults and RON persistence.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level station configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Host endpoints and transport settings.
    pub network: NetworkConfig,
    /// Per-tick station behaviour.
    pub station: StationConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network configuration: named game hosts and the ports they listen on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Named host addresses (endpoint name -> IP address).
    pub endpoints: BTreeMap<String, String>,
    /// Endpoint used by [`control_addr`](Self::control_addr) and
    /// [`telemetry_addr`](Self::telemetry_addr).
    pub selected_endpoint: String,
    /// TCP port of the control channel.
    pub control_port: u16,
    /// UDP port of the telemetry channel.
    pub telemetry_port: u16,
    /// Upper bound for the control-channel handshake, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Largest accepted control packet body in bytes.
    pub max_packet_size: u32,
}

/// Station tick configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StationConfig {
    /// Ticks per second; one telemetry datagram is sent per tick.
    pub tick_rate_hz: u32,
    /// Minimum time between two action packets, in seconds.
    pub action_cooldown_secs: f32,
    /// How long the level-change pulse stays raised, in seconds.
    pub level_settle_secs: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        let endpoints = [
            ("dome", "141.54.159.119"),
            ("we", "192.168.2.100"),
            ("sm", "192.168.178.37"),
        ]
        .into_iter()
        .map(|(name, addr)| (name.to_string(), addr.to_string()))
        .collect();

        Self {
            endpoints,
            selected_endpoint: "dome".to_string(),
            control_port: 11000,
            telemetry_port: 11001,
            connect_timeout_ms: 2000,
            max_packet_size: 4096,
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            action_cooldown_secs: 5.0,
            level_settle_secs: 2.5,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Endpoint resolution ---

impl NetworkConfig {
    /// IP address of the selected endpoint.
    pub fn selected_ip(&self) -> Result<IpAddr, ConfigError> {
        let address = self
            .endpoints
            .get(&self.selected_endpoint)
            .ok_or_else(|| ConfigError::UnknownEndpoint(self.selected_endpoint.clone()))?;

        address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAddress {
                endpoint: self.selected_endpoint.clone(),
                address: address.clone(),
            })
    }

    /// Socket address of the control channel on the selected endpoint.
    pub fn control_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.selected_ip()?, self.control_port))
    }

    /// Socket address of the telemetry channel on the selected endpoint.
    pub fn telemetry_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.selected_ip()?, self.telemetry_port))
    }
}

/// Default location of the config directory (`<platform config>/crew-link`).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crew-link")
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("control_port: 11000"));
        assert!(ron_str.contains("selected_endpoint: \"dome\""));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(network: (control_port: 9000))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.network.control_port, 9000);
        assert_eq!(config.network.telemetry_port, 11001);
        assert_eq!(config.station, StationConfig::default());
    }

    #[test]
    fn test_default_endpoints_present() {
        let network = NetworkConfig::default();
        assert_eq!(network.endpoints.len(), 3);
        assert_eq!(network.endpoints["we"], "192.168.2.100");
        assert_eq!(network.endpoints["sm"], "192.168.178.37");
    }

    #[test]
    fn test_control_and_telemetry_addr_resolve() {
        let mut network = NetworkConfig::default();
        network.selected_endpoint = "we".to_string();

        let control = network.control_addr().unwrap();
        let telemetry = network.telemetry_addr().unwrap();
        assert_eq!(control, "192.168.2.100:11000".parse().unwrap());
        assert_eq!(telemetry, "192.168.2.100:11001".parse().unwrap());
    }

    #[test]
    fn test_unknown_endpoint_rejected() {
        let mut network = NetworkConfig::default();
        network.selected_endpoint = "lab".to_string();
        assert!(matches!(
            network.control_addr(),
            Err(ConfigError::UnknownEndpoint(name)) if name == "lab"
        ));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut network = NetworkConfig::default();
        network
            .endpoints
            .insert("dome".to_string(), "not-an-ip".to_string());
        assert!(matches!(
            network.telemetry_addr(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.network.selected_endpoint = "sm".to_string();
        config.station.tick_rate_hz = 60;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.network.control_port = 12000;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().network.control_port, 12000);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
