//! Control packets and their byte encoding.
//!
//! A packet on the wire is the [`postcard`] encoding of
//! `(kind tag: u8, sender id: String, payload: Vec<Value>)`. Payload values
//! carry their own type tag, but the kind alone decides which shapes are
//! legal: [`decode_packet`] reads the generic form and then branches on the
//! kind to validate the payload into a typed [`PacketBody`].
//!
//! There is no version byte. Adding a kind means redeploying the host and
//! every station together.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::role::{Level, Role, RoleAvailability, SessionId};

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Discriminator selecting a packet's semantics and payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// A role was taken (host) or is requested (station).
    RoleSelected = 0,
    /// A station joined; carries the new availability.
    Connected = 1,
    /// A station left; carries the new availability (host) or the role (station).
    Disconnected = 2,
    /// The host has no free slot for this station.
    ServerFull = 3,
    /// The game moved to another level.
    LevelChanged = 4,
    /// The end credits should roll.
    CreditsTrigger = 5,
    /// The station fired its role action.
    Action = 6,
    /// The station confirmed it is held straight.
    CalibrationStep1 = 7,
}

impl PacketKind {
    /// Every kind, ordered by wire tag.
    pub const ALL: [PacketKind; 8] = [
        PacketKind::RoleSelected,
        PacketKind::Connected,
        PacketKind::Disconnected,
        PacketKind::ServerFull,
        PacketKind::LevelChanged,
        PacketKind::CreditsTrigger,
        PacketKind::Action,
        PacketKind::CalibrationStep1,
    ];

    /// Wire tag of this kind.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Kind for a wire tag, if the tag is known.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }
}

// ---------------------------------------------------------------------------
// Payload values
// ---------------------------------------------------------------------------

/// One self-describing payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 text (role names, reasons).
    Text(String),
    /// Boolean list (role availability triples).
    Flags(Vec<bool>),
    /// Signed integer (levels).
    Int(i32),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(_) => f.write_str("text"),
            Value::Flags(flags) => write!(f, "flags[{}]", flags.len()),
            Value::Int(_) => f.write_str("int"),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed bodies
// ---------------------------------------------------------------------------

/// Kind plus validated payload. The variant fixes the payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    /// `RoleSelected`, payload `[Text(role)]`.
    RoleSelected {
        /// The role taken or requested.
        role: Role,
    },
    /// `Connected` from the host, payload `[Flags(3)]`.
    Connected {
        /// Roles still open after the join.
        availability: RoleAvailability,
    },
    /// `Disconnected` from the host, payload `[Flags(3)]`.
    Disconnected {
        /// Roles open after the departure.
        availability: RoleAvailability,
    },
    /// `Disconnected` from a station leaving, payload `[Text(role)]`.
    StationLeft {
        /// The role being given up.
        role: Role,
    },
    /// `ServerFull`, payload `[]` or `[Text(reason)]`.
    ServerFull {
        /// Optional human-readable reason from the host.
        reason: Option<String>,
    },
    /// `LevelChanged`, payload `[Int(level)]` with level in `0..=255`.
    LevelChanged {
        /// The new level.
        level: Level,
    },
    /// `CreditsTrigger`, empty payload.
    CreditsTrigger,
    /// `Action`, payload `[Text(role)]`.
    Action {
        /// The acting role.
        role: Role,
    },
    /// `CalibrationStep1`, payload `[Text(role)]`.
    CalibrationStep1 {
        /// The calibrating role.
        role: Role,
    },
}

impl PacketBody {
    /// The kind this body is sent as.
    pub fn kind(&self) -> PacketKind {
        match self {
            PacketBody::RoleSelected { .. } => PacketKind::RoleSelected,
            PacketBody::Connected { .. } => PacketKind::Connected,
            PacketBody::Disconnected { .. } | PacketBody::StationLeft { .. } => {
                PacketKind::Disconnected
            }
            PacketBody::ServerFull { .. } => PacketKind::ServerFull,
            PacketBody::LevelChanged { .. } => PacketKind::LevelChanged,
            PacketBody::CreditsTrigger => PacketKind::CreditsTrigger,
            PacketBody::Action { .. } => PacketKind::Action,
            PacketBody::CalibrationStep1 { .. } => PacketKind::CalibrationStep1,
        }
    }

    /// Role-carrying body a station sends for `kind`.
    ///
    /// Returns `None` for kinds only the host sends.
    pub fn station(kind: PacketKind, role: Role) -> Option<Self> {
        match kind {
            PacketKind::RoleSelected => Some(PacketBody::RoleSelected { role }),
            PacketKind::Disconnected => Some(PacketBody::StationLeft { role }),
            PacketKind::Action => Some(PacketBody::Action { role }),
            PacketKind::CalibrationStep1 => Some(PacketBody::CalibrationStep1 { role }),
            PacketKind::Connected
            | PacketKind::ServerFull
            | PacketKind::LevelChanged
            | PacketKind::CreditsTrigger => None,
        }
    }

    fn to_values(&self) -> Vec<Value> {
        match self {
            PacketBody::RoleSelected { role }
            | PacketBody::StationLeft { role }
            | PacketBody::Action { role }
            | PacketBody::CalibrationStep1 { role } => vec![Value::Text(role.to_string())],
            PacketBody::Connected { availability } | PacketBody::Disconnected { availability } => {
                vec![Value::Flags(availability.flags().to_vec())]
            }
            PacketBody::ServerFull { reason } => {
                reason.iter().cloned().map(Value::Text).collect()
            }
            PacketBody::LevelChanged { level } => vec![Value::Int(i32::from(level.0))],
            PacketBody::CreditsTrigger => Vec::new(),
        }
    }

    fn from_values(kind: PacketKind, payload: Vec<Value>) -> Result<Self, PacketError> {
        let body = match (kind, payload.as_slice()) {
            (PacketKind::RoleSelected, [Value::Text(role)]) => PacketBody::RoleSelected {
                role: parse_role(role)?,
            },
            (PacketKind::Connected, [Value::Flags(flags)]) => PacketBody::Connected {
                availability: parse_availability(flags)?,
            },
            (PacketKind::Disconnected, [Value::Flags(flags)]) => PacketBody::Disconnected {
                availability: parse_availability(flags)?,
            },
            (PacketKind::Disconnected, [Value::Text(role)]) => PacketBody::StationLeft {
                role: parse_role(role)?,
            },
            (PacketKind::ServerFull, []) => PacketBody::ServerFull { reason: None },
            (PacketKind::ServerFull, [Value::Text(reason)]) => PacketBody::ServerFull {
                reason: Some(reason.clone()),
            },
            (PacketKind::LevelChanged, [Value::Int(level)]) => PacketBody::LevelChanged {
                level: u8::try_from(*level).map(Level).map_err(|_| {
                    PacketError::Malformed(format!("level {level} out of range"))
                })?,
            },
            (PacketKind::CreditsTrigger, []) => PacketBody::CreditsTrigger,
            (PacketKind::Action, [Value::Text(role)]) => PacketBody::Action {
                role: parse_role(role)?,
            },
            (PacketKind::CalibrationStep1, [Value::Text(role)]) => PacketBody::CalibrationStep1 {
                role: parse_role(role)?,
            },
            (kind, values) => {
                let shape: Vec<String> = values.iter().map(Value::to_string).collect();
                return Err(PacketError::Malformed(format!(
                    "payload [{}] does not fit {kind:?}",
                    shape.join(", ")
                )));
            }
        };
        Ok(body)
    }
}

fn parse_role(name: &str) -> Result<Role, PacketError> {
    name.parse::<Role>()
        .map_err(|e| PacketError::Malformed(e.to_string()))
}

fn parse_availability(flags: &[bool]) -> Result<RoleAvailability, PacketError> {
    RoleAvailability::from_slice(flags).ok_or_else(|| {
        PacketError::Malformed(format!("expected 3 availability flags, got {}", flags.len()))
    })
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A discrete control message: who sent it and what it says.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Session identifier of the sender.
    pub sender_id: SessionId,
    /// Kind and payload.
    pub body: PacketBody,
}

impl Packet {
    /// Build a packet.
    pub fn new(sender_id: SessionId, body: PacketBody) -> Self {
        Self { sender_id, body }
    }

    /// Kind of this packet.
    pub fn kind(&self) -> PacketKind {
        self.body.kind()
    }
}

/// Generic wire form shared by every kind.
#[derive(Serialize, Deserialize)]
struct WirePacket {
    kind: u8,
    sender_id: String,
    payload: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the packet codec.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// Truncated input, unknown tag, trailing bytes, or a payload that does
    /// not fit the kind.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// Postcard serialization failed.
    #[error("encode error: {0}")]
    Encode(#[source] postcard::Error),
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Encode a packet into its wire bytes.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, PacketError> {
    let wire = WirePacket {
        kind: packet.kind().tag(),
        sender_id: packet.sender_id.as_str().to_string(),
        payload: packet.body.to_values(),
    };
    postcard::to_allocvec(&wire).map_err(PacketError::Encode)
}

/// Decode wire bytes into a packet, validating the payload against the kind.
pub fn decode_packet(data: &[u8]) -> Result<Packet, PacketError> {
    let (wire, rest): (WirePacket, &[u8]) =
        postcard::take_from_bytes(data).map_err(|e| PacketError::Malformed(e.to_string()))?;

    if !rest.is_empty() {
        return Err(PacketError::Malformed(format!(
            "{} trailing bytes",
            rest.len()
        )));
    }

    let kind = PacketKind::from_tag(wire.kind)
        .ok_or_else(|| PacketError::Malformed(format!("unknown kind tag {}", wire.kind)))?;

    let body = PacketBody::from_values(kind, wire.payload)?;
    Ok(Packet::new(SessionId::new(wire.sender_id), body))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
