//! Which motion sensor each role streams on each level.

use std::fmt;

use crew_net::{Level, Role};

/// Label of the station's action button while accelerometer input is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPrompt {
    /// Shake to reload.
    Reload,
    /// Thrust to fire.
    Fire,
}

impl fmt::Display for ActionPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPrompt::Reload => f.write_str("Reload"),
            ActionPrompt::Fire => f.write_str("Fire"),
        }
    }
}

/// Sensor sampled into the telemetry datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    /// Gyroscope attitude, sent as `{G(..)}`.
    Orientation,
    /// Accelerometer, sent as `{A(..)}`, with the matching button prompt.
    Acceleration(ActionPrompt),
}

const G: Sensor = Sensor::Orientation;
const RELOAD: Sensor = Sensor::Acceleration(ActionPrompt::Reload);
const FIRE: Sensor = Sensor::Acceleration(ActionPrompt::Fire);

// Rows are levels 0..=5, columns follow `Role::ALL`.
const PLAN: [[Sensor; 3]; 6] = [
    [G, G, G],
    [RELOAD, FIRE, G],
    [FIRE, G, RELOAD],
    [G, RELOAD, FIRE],
    [RELOAD, FIRE, G],
    [FIRE, G, RELOAD],
];

/// Sensor `role` streams on `level`; `None` on levels without a plan.
pub fn sensor_for(role: Role, level: Level) -> Option<Sensor> {
    PLAN.get(usize::from(level.0))
        .map(|row| row[role.index()])
}
