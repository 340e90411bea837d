//! The station: one role, one control channel, one telemetry channel, and
//! the per-tick logic tying them to the shared session state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crew_config::{Config, ConfigError};
use crew_net::{
    ChannelState, ControlChannel, ControlError, FrameConfig, Fragment, Notification, PacketKind,
    Role, SessionError, SessionState, SocketConfig, TelemetryChannel, TelemetryError,
};
use tokio::sync::mpsc;

use crate::plan::{ActionPrompt, Sensor, sensor_for};
use crate::sensors::MotionSensors;
use crate::timing::{Cooldown, LevelTransition};

/// Errors that stop a station.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// Endpoint or address configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The role could not be assigned.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A control-channel operation failed.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// The telemetry socket could not be opened.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The host has no slot left for this station.
    #[error("host is full: {}", .0.as_deref().unwrap_or("no reason given"))]
    ServerFull(Option<String>),

    /// The control connection dropped.
    #[error("connection to host lost")]
    ConnectionLost,
}

/// What happened during one tick, for the presentation layer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    /// Notifications drained this tick, in arrival order.
    pub notifications: Vec<Notification>,
    /// A level transition is in progress; telemetry was held back.
    pub transition_active: bool,
    /// Sensor sampled into this tick's datagram, if any.
    pub sampled: Option<Sensor>,
    /// Button label while accelerometer input is live.
    pub prompt: Option<ActionPrompt>,
    /// Whether a telemetry datagram went out.
    pub telemetry_sent: bool,
    /// The control connection has been lost (this tick or earlier).
    pub connection_lost: bool,
}

/// A connected controller station.
pub struct Station {
    role: Role,
    session: Arc<SessionState>,
    control: ControlChannel,
    notifications: mpsc::UnboundedReceiver<Notification>,
    telemetry: TelemetryChannel,
    cooldown: Cooldown,
    transition: LevelTransition,
    calibrating: bool,
    connection_lost: bool,
}

impl Station {
    /// Connect to the endpoint selected in `config` and claim `role`.
    pub async fn connect(role: Role, config: &Config) -> Result<Self, StationError> {
        let control_addr = config.network.control_addr()?;
        let telemetry_addr = config.network.telemetry_addr()?;
        Self::connect_to(role, control_addr, telemetry_addr, config).await
    }

    /// Connect to explicit addresses, taking the remaining settings from
    /// `config`.
    pub async fn connect_to(
        role: Role,
        control_addr: SocketAddr,
        telemetry_addr: SocketAddr,
        config: &Config,
    ) -> Result<Self, StationError> {
        let session = Arc::new(SessionState::new());
        session.assign_role(role)?;

        let (mut control, notifications) = ControlChannel::with_config(
            Arc::clone(&session),
            FrameConfig::with_max_payload(config.network.max_packet_size),
            SocketConfig::default(),
        );
        let timeout = Duration::from_millis(config.network.connect_timeout_ms);
        control.connect(control_addr, timeout).await?;

        let telemetry = TelemetryChannel::bind(telemetry_addr).await?;
        control.send_station(PacketKind::RoleSelected, role).await?;
        tracing::info!("Station {role} joined as {}", control.sender_id());

        let station = &config.station;
        Ok(Self {
            role,
            session,
            control,
            notifications,
            telemetry,
            cooldown: Cooldown::new(seconds(station.action_cooldown_secs)),
            transition: LevelTransition::new(seconds(station.level_settle_secs)),
            calibrating: false,
            connection_lost: false,
        })
    }

    /// Role held by this station.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Shared session state.
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Current control-channel state.
    pub fn control_state(&self) -> ChannelState {
        self.control.state().current()
    }

    /// Whether calibration mode is on.
    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Run one tick at `now`.
    ///
    /// Drains notifications; outside a level transition, samples the sensor
    /// for the current role and level (orientation while calibrating),
    /// appends the role tag, and sends one telemetry datagram. Then advances
    /// the transition gate.
    pub async fn tick(&mut self, now: Instant, sensors: &impl MotionSensors) -> TickReport {
        let mut report = TickReport::default();

        while let Ok(notification) = self.notifications.try_recv() {
            if notification == Notification::ConnectionLost {
                self.connection_lost = true;
            }
            report.notifications.push(notification);
        }
        report.connection_lost = self.connection_lost;

        if !self.session.level_changed() {
            let sensor = if self.calibrating {
                Some(Sensor::Orientation)
            } else {
                sensor_for(self.role, self.session.level())
            };

            report.sampled = sensor.filter(|sensor| self.sample(*sensor, sensors));
            report.prompt = match sensor {
                Some(Sensor::Acceleration(prompt)) => Some(prompt),
                _ => None,
            };

            self.telemetry.append(Fragment::Role(self.role));
            match self.telemetry.flush().await {
                Ok(_) => report.telemetry_sent = true,
                Err(e) => tracing::warn!("{e}"),
            }
        }

        report.transition_active = self.transition.update(&self.session, now);
        report
    }

    /// Append a reading for `sensor`; `false` if the sensor has none.
    fn sample(&mut self, sensor: Sensor, sensors: &impl MotionSensors) -> bool {
        let fragment = match sensor {
            Sensor::Orientation => sensors.orientation().map(Fragment::Orientation),
            Sensor::Acceleration(_) => sensors.acceleration().map(Fragment::Acceleration),
        };
        match fragment {
            Some(fragment) => {
                self.telemetry.append(fragment);
                true
            }
            None => false,
        }
    }

    /// Fire the role action unless the cooldown is running.
    ///
    /// Returns whether an action packet was sent.
    pub async fn press_action(&mut self, now: Instant) -> Result<bool, StationError> {
        if !self.cooldown.try_start(now) {
            tracing::debug!("Action ignored during cooldown");
            return Ok(false);
        }
        self.control
            .send_station(PacketKind::Action, self.role)
            .await?;
        Ok(true)
    }

    /// Toggle calibration mode. Returns the new mode.
    pub fn start_calibration(&mut self) -> bool {
        self.calibrating = !self.calibrating;
        self.calibrating
    }

    /// Confirm the device is held straight and leave calibration mode.
    pub async fn confirm_calibration(&mut self) -> Result<(), StationError> {
        self.control
            .send_station(PacketKind::CalibrationStep1, self.role)
            .await?;
        self.calibrating = false;
        Ok(())
    }

    /// Give up the role and close the control channel.
    pub async fn leave(mut self) -> Result<(), StationError> {
        let result = if self.control_state() == ChannelState::Connected {
            self.control
                .send_station(PacketKind::Disconnected, self.role)
                .await
                .map_err(StationError::from)
        } else {
            Ok(())
        };
        self.control.close().await;
        result
    }
}

// Negative or non-finite settings disable the gate.
fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or_default()
}
