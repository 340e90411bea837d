//! Headless controller station: drives the Crew Link protocol layer from a
//! fixed-rate tick, the way a phone client does between frames.

pub mod plan;
pub mod sensors;
pub mod station;
pub mod timing;

pub use plan::{ActionPrompt, Sensor, sensor_for};
pub use sensors::{MotionSensors, StillSensors};
pub use station::{Station, StationError, TickReport};
pub use timing::{Cooldown, LevelTransition};
