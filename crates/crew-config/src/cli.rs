//! Command-line argument parsing for Crew Link stations.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Crew Link station command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "crew-station", about = "Crew Link controller station")]
pub struct CliArgs {
    /// Named endpoint to connect to (dome, we, sm).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Host address; replaces the address of the selected endpoint.
    #[arg(long)]
    pub server: Option<String>,

    /// Control channel (TCP) port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Telemetry channel (UDP) port.
    #[arg(long)]
    pub telemetry_port: Option<u16>,

    /// Station role (OppsCommander, WeaponsOfficer, Captain).
    #[arg(long)]
    pub role: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref endpoint) = args.endpoint {
            self.network.selected_endpoint = endpoint.clone();
        }
        if let Some(ref addr) = args.server {
            self.network
                .endpoints
                .insert(self.network.selected_endpoint.clone(), addr.clone());
        }
        if let Some(port) = args.port {
            self.network.control_port = port;
        }
        if let Some(port) = args.telemetry_port {
            self.network.telemetry_port = port;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            endpoint: Some("we".to_string()),
            server: Some("10.0.0.7".to_string()),
            port: Some(9100),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.selected_endpoint, "we");
        assert_eq!(config.network.endpoints["we"], "10.0.0.7");
        assert_eq!(config.network.control_port, 9100);
        // Non-overridden fields retain defaults
        assert_eq!(config.network.endpoints["dome"], "141.54.159.119");
        assert_eq!(config.network.telemetry_port, 11001);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "crew-station",
            "--endpoint",
            "sm",
            "--role",
            "Captain",
            "--telemetry-port",
            "4000",
        ]);
        assert_eq!(args.endpoint.as_deref(), Some("sm"));
        assert_eq!(args.role.as_deref(), Some("Captain"));
        assert_eq!(args.telemetry_port, Some(4000));
        assert!(args.server.is_none());
    }
}
