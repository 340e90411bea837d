//! Per-kind handling of packets received on the control channel.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::packet::{Packet, PacketBody};
use crate::role::{Level, RoleAvailability, SessionId};
use crate::session::SessionState;

/// Event raised to the host application. Drain with `try_recv` each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Role availability changed; carries the new mapping.
    RoleAvailabilityChanged(RoleAvailability),
    /// The host moved the game to a new level.
    LevelChanged(Level),
    /// The host refused this station for lack of a free slot.
    ServerFull(Option<String>),
    /// End credits were triggered.
    Credits,
    /// The control connection failed while receiving. Sent once; the
    /// connection is closed afterwards.
    ConnectionLost,
}

/// Applies decoded packets to the session state and notifies the host.
///
/// Runs on the receive task; it is the only writer of availability, level,
/// and the server-assigned sender id.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    session: Arc<SessionState>,
    sender_id: Arc<RwLock<SessionId>>,
    notify_tx: mpsc::UnboundedSender<Notification>,
}

impl Dispatcher {
    /// Create a dispatcher over shared state and a notification sink.
    pub fn new(
        session: Arc<SessionState>,
        sender_id: Arc<RwLock<SessionId>>,
        notify_tx: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        Self {
            session,
            sender_id,
            notify_tx,
        }
    }

    /// Handle one packet.
    pub fn dispatch(&self, packet: Packet) {
        tracing::debug!(kind = ?packet.kind(), sender = %packet.sender_id, "Incoming packet");

        match packet.body {
            PacketBody::RoleSelected { role } => {
                self.store_sender_id(packet.sender_id);
                let availability = self.session.mark_taken(role);
                tracing::info!("Role {role} taken");
                self.notify(Notification::RoleAvailabilityChanged(availability));
            }
            PacketBody::Connected { availability } | PacketBody::Disconnected { availability } => {
                self.store_sender_id(packet.sender_id);
                let availability = self.session.replace_availability(availability);
                self.notify(Notification::RoleAvailabilityChanged(availability));
            }
            PacketBody::ServerFull { reason } => {
                tracing::warn!("Host is full: {}", reason.as_deref().unwrap_or("no reason"));
                self.notify(Notification::ServerFull(reason));
            }
            PacketBody::LevelChanged { level } => {
                self.session.set_level(level);
                if level.is_lobby() {
                    tracing::info!("Entered lobby");
                } else {
                    tracing::info!("Entered level {level}");
                }
                self.notify(Notification::LevelChanged(level));
            }
            PacketBody::CreditsTrigger => {
                self.notify(Notification::Credits);
            }
            body @ (PacketBody::Action { .. }
            | PacketBody::CalibrationStep1 { .. }
            | PacketBody::StationLeft { .. }) => {
                tracing::warn!(kind = ?body.kind(), "Dropping station-only packet from host");
            }
        }
    }

    /// Report a terminal receive failure.
    pub fn connection_lost(&self) {
        self.notify(Notification::ConnectionLost);
    }

    fn store_sender_id(&self, id: SessionId) {
        *self
            .sender_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = id;
    }

    fn notify(&self, notification: Notification) {
        // A host that dropped its receiver no longer cares.
        let _ = self.notify_tx.send(notification);
    }
}
