//! Best-effort motion telemetry over UDP.
//!
//! The station appends tagged text fragments during a tick and flushes them
//! as one datagram:
//!
//! ```text
//! {A(0.01, -0.98, 0.12)}{R(WeaponsOfficer)}
//! {G(0.1, 0.2, 0.3, 0.9)}{R(Captain)}
//! ```
//!
//! Nothing is acknowledged or retransmitted; a lost datagram is simply
//! superseded by the next tick's.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use glam::{Quat, Vec3};
use tokio::net::UdpSocket;

use crate::role::Role;

/// One tagged telemetry fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fragment {
    /// `{R(<role>)}`: which station sent the datagram.
    Role(Role),
    /// `{G(x, y, z, w)}`: device attitude quaternion.
    Orientation(Quat),
    /// `{A(x, y, z)}`: linear acceleration.
    Acceleration(Vec3),
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Role(role) => write!(f, "{{R({role})}}"),
            Fragment::Orientation(q) => {
                let [x, y, z, w] = q.to_array();
                write!(f, "{{G({x}, {y}, {z}, {w})}}")
            }
            Fragment::Acceleration(a) => {
                let [x, y, z] = a.to_array();
                write!(f, "{{A({x}, {y}, {z})}}")
            }
        }
    }
}

/// Errors from the telemetry socket.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The local UDP socket could not be bound.
    #[error("failed to bind telemetry socket: {0}")]
    Bind(#[source] std::io::Error),

    /// The datagram could not be handed to the OS.
    #[error("failed to send telemetry to {target}: {source}")]
    Send {
        /// Destination address.
        target: SocketAddr,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },
}

/// Outbound telemetry channel: one datagram per flush.
pub struct TelemetryChannel {
    socket: UdpSocket,
    target: SocketAddr,
    message: String,
    datagrams_sent: u64,
}

impl TelemetryChannel {
    /// Bind an ephemeral local port of the target's address family.
    pub async fn bind(target: SocketAddr) -> Result<Self, TelemetryError> {
        let local: SocketAddr = if target.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(TelemetryError::Bind)?;
        tracing::info!("Telemetry channel targeting {target}");

        Ok(Self {
            socket,
            target,
            message: String::new(),
            datagrams_sent: 0,
        })
    }

    /// Destination of every datagram.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Text accumulated since the last flush.
    pub fn pending(&self) -> &str {
        &self.message
    }

    /// Number of datagrams handed to the OS so far.
    pub fn datagrams_sent(&self) -> u64 {
        self.datagrams_sent
    }

    /// Append a fragment to the current datagram.
    pub fn append(&mut self, fragment: Fragment) {
        use std::fmt::Write;
        // writing into a String cannot fail
        let _ = write!(self.message, "{fragment}");
    }

    /// Send the accumulated text as one datagram and start a new one.
    ///
    /// An empty buffer still sends an empty datagram, which the host treats
    /// as a keep-alive. The buffer is cleared whether or not the send
    /// succeeds.
    pub async fn flush(&mut self) -> Result<usize, TelemetryError> {
        let result = self
            .socket
            .send_to(self.message.as_bytes(), self.target)
            .await;
        self.message.clear();

        match result {
            Ok(sent) => {
                self.datagrams_sent += 1;
                tracing::trace!("Telemetry datagram of {sent} bytes");
                Ok(sent)
            }
            Err(source) => Err(TelemetryError::Send {
                target: self.target,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn recv_text(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 1024];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("datagram should arrive")
            .unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    #[test]
    fn test_role_fragment_format() {
        assert_eq!(
            Fragment::Role(Role::OppsCommander).to_string(),
            "{R(OppsCommander)}"
        );
    }

    #[test]
    fn test_orientation_fragment_format() {
        let q = Quat::from_xyzw(0.5, -0.25, 0.0, 1.0);
        assert_eq!(Fragment::Orientation(q).to_string(), "{G(0.5, -0.25, 0, 1)}");
    }

    #[test]
    fn test_acceleration_fragment_format() {
        let a = Vec3::new(0.125, -9.5, 3.0);
        assert_eq!(
            Fragment::Acceleration(a).to_string(),
            "{A(0.125, -9.5, 3)}"
        );
    }

    #[tokio::test]
    async fn test_fragments_accumulate_into_one_datagram() {
        let (rx, addr) = receiver().await;
        let mut channel = TelemetryChannel::bind(addr).await.unwrap();

        channel.append(Fragment::Acceleration(Vec3::new(1.0, 2.0, 3.0)));
        channel.append(Fragment::Role(Role::Captain));
        assert_eq!(channel.pending(), "{A(1, 2, 3)}{R(Captain)}");

        channel.flush().await.unwrap();
        assert_eq!(recv_text(&rx).await, "{A(1, 2, 3)}{R(Captain)}");
    }

    #[tokio::test]
    async fn test_flush_clears_buffer() {
        let (rx, addr) = receiver().await;
        let mut channel = TelemetryChannel::bind(addr).await.unwrap();

        channel.append(Fragment::Role(Role::WeaponsOfficer));
        channel.flush().await.unwrap();
        assert!(channel.pending().is_empty());

        channel.append(Fragment::Role(Role::Captain));
        channel.flush().await.unwrap();
        assert_eq!(recv_text(&rx).await, "{R(WeaponsOfficer)}");
        assert_eq!(recv_text(&rx).await, "{R(Captain)}");
    }

    #[tokio::test]
    async fn test_empty_flush_sends_keepalive_datagram() {
        let (rx, addr) = receiver().await;
        let mut channel = TelemetryChannel::bind(addr).await.unwrap();

        let sent = channel.flush().await.unwrap();
        assert_eq!(sent, 0);
        assert_eq!(channel.datagrams_sent(), 1);
        assert_eq!(recv_text(&rx).await, "");
    }
}
