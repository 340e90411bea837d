//! Crew Link controller station.
//!
//! Joins the host with one role and streams telemetry at the configured tick
//! rate until Ctrl-C or the connection drops.
//!
//! Run with: `cargo run -p crew-station -- --role Captain --endpoint we`

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use crew_config::{CliArgs, Config, default_config_dir};
use crew_net::{Notification, Role};
use crew_station::{Station, StationError, StillSensors};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    crew_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let role = match args.role.as_deref().map(str::parse::<Role>) {
        None => Role::Captain,
        Some(Ok(role)) => role,
        Some(Err(e)) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Crew Link station {role} -> endpoint '{}'",
        config.network.selected_endpoint
    );

    match run(role, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(role: Role, config: &Config) -> Result<(), StationError> {
    let mut station = Station::connect(role, config).await?;
    let sensors = StillSensors::default();

    let rate = config.station.tick_rate_hz.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / rate);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Signal handler failed: {e}");
                }
                info!("Leaving session");
                return station.leave().await;
            }
        }

        let report = station.tick(Instant::now(), &sensors).await;

        for notification in report.notifications {
            match notification {
                Notification::RoleAvailabilityChanged(availability) => {
                    let free: Vec<Role> = availability.available_roles().collect();
                    info!("Free roles: {free:?}");
                }
                Notification::LevelChanged(level) => info!("Level {level}"),
                Notification::Credits => info!("Credits rolling"),
                Notification::ServerFull(reason) => {
                    return Err(StationError::ServerFull(reason));
                }
                Notification::ConnectionLost => return Err(StationError::ConnectionLost),
            }
        }
    }
}
