//! Crew Link protocol layer: packet codec, reliable control channel,
//! best-effort telemetry channel, and the session state they share.

pub mod control;
pub mod dispatch;
pub mod framing;
pub mod packet;
pub mod platform;
pub mod role;
pub mod session;
pub mod telemetry;

pub use control::{ChannelState, ChannelStateWatch, ControlChannel, ControlError};
pub use dispatch::{Dispatcher, Notification};
pub use framing::{Frame, FrameConfig, FrameError, read_frame, write_frame};
pub use packet::{Packet, PacketBody, PacketError, PacketKind, Value, decode_packet, encode_packet};
pub use platform::{SocketConfig, configure_stream};
pub use role::{Level, Role, RoleAvailability, SessionId, UnknownRole};
pub use session::{SessionError, SessionState};
pub use telemetry::{Fragment, TelemetryChannel, TelemetryError};
