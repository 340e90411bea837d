//! Motion sensor access for the station tick.

use glam::{Quat, Vec3};

/// Source of motion samples. `None` means the sensor is missing or
/// disabled, and nothing is sent for it.
pub trait MotionSensors {
    /// Device attitude.
    fn orientation(&self) -> Option<Quat>;

    /// Linear acceleration in g.
    fn acceleration(&self) -> Option<Vec3>;
}

/// Sensors reporting fixed readings: a device lying flat and still.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StillSensors {
    /// Reported attitude, or `None` for no gyroscope.
    pub attitude: Option<Quat>,
    /// Reported acceleration, or `None` for no accelerometer.
    pub acceleration: Option<Vec3>,
}

impl Default for StillSensors {
    fn default() -> Self {
        Self {
            attitude: Some(Quat::IDENTITY),
            acceleration: Some(Vec3::NEG_Z),
        }
    }
}

impl MotionSensors for StillSensors {
    fn orientation(&self) -> Option<Quat> {
        self.attitude
    }

    fn acceleration(&self) -> Option<Vec3> {
        self.acceleration
    }
}
