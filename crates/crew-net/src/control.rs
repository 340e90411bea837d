//! Reliable control channel to the game host.
//!
//! Manages one TCP connection through its lifecycle: a bounded connect, one
//! background receive task that decodes and dispatches packets, synchronous
//! sends from the station tick, and cooperative shutdown. State changes are
//! broadcast via a [`watch`] channel so observers never poll.
//!
//! A connection is single-use. Once it reaches [`ChannelState::Closed`],
//! whether by a failed connect, a receive error, or a local close, the
//! host application builds a new [`ControlChannel`] to try again.

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::dispatch::{Dispatcher, Notification};
use crate::framing::{Frame, FrameConfig, FrameError, read_frame, write_frame};
use crate::packet::{Packet, PacketBody, PacketError, PacketKind, decode_packet, encode_packet};
use crate::platform::{SocketConfig, configure_stream};
use crate::role::{Role, SessionId};
use crate::session::SessionState;

/// Default bound on the TCP handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Control-channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, never connected.
    Disconnected,
    /// TCP handshake in progress.
    Connecting,
    /// Handshake done; the receive task is running.
    Connected,
    /// Terminal. The connection failed or was closed.
    Closed,
}

/// Observable channel state backed by a [`watch`] channel.
pub struct ChannelStateWatch {
    tx: watch::Sender<ChannelState>,
    rx: watch::Receiver<ChannelState>,
}

impl Default for ChannelStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelStateWatch {
    /// Create a new watch initialized to [`ChannelState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ChannelState::Disconnected);
        Self { tx, rx }
    }

    /// Set the current state, notifying all subscribers.
    pub fn set(&self, state: ChannelState) {
        let _ = self.tx.send(state);
    }

    /// Move to [`ChannelState::Closed`]. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ChannelState::Closed {
                false
            } else {
                *state = ChannelState::Closed;
                true
            }
        })
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ChannelState {
        *self.rx.borrow()
    }
}

/// Errors surfaced by control-channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The handshake timed out or was refused. The channel is closed.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        /// Target address.
        addr: SocketAddr,
        /// Underlying cause; `TimedOut` when the bound elapsed.
        #[source]
        source: std::io::Error,
    },

    /// Writing a packet failed. The connection is left open.
    #[error("failed to send packet: {0}")]
    SendFailed(#[source] FrameError),

    /// The operation is not allowed in the current state.
    #[error("operation not allowed while {0:?}")]
    InvalidState(ChannelState),

    /// The kind is sent by the host only and carries no role.
    #[error("{0:?} is not a station packet")]
    NotStationKind(PacketKind),

    /// The packet could not be encoded.
    #[error(transparent)]
    Encode(#[from] PacketError),
}

/// Live connection resources.
struct Link {
    writer: Mutex<OwnedWriteHalf>,
    shutdown_tx: watch::Sender<bool>,
    receive_task: JoinHandle<()>,
}

/// Client end of the control channel.
///
/// Created with [`ControlChannel::new`], which also returns the receiver of
/// [`Notification`]s raised by dispatch.
pub struct ControlChannel {
    session: Arc<SessionState>,
    sender_id: Arc<RwLock<SessionId>>,
    state: Arc<ChannelStateWatch>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    frame_config: FrameConfig,
    socket_config: SocketConfig,
    link: Option<Link>,
}

impl ControlChannel {
    /// Create a disconnected channel with a fresh random sender id.
    pub fn new(session: Arc<SessionState>) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        Self::with_config(session, FrameConfig::default(), SocketConfig::default())
    }

    /// Like [`new`](Self::new) with explicit framing and socket settings.
    pub fn with_config(
        session: Arc<SessionState>,
        frame_config: FrameConfig,
        socket_config: SocketConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let channel = Self {
            session,
            sender_id: Arc::new(RwLock::new(SessionId::generate())),
            state: Arc::new(ChannelStateWatch::new()),
            notify_tx,
            frame_config,
            socket_config,
            link: None,
        };
        (channel, notify_rx)
    }

    /// Return the channel state watch.
    pub fn state(&self) -> &Arc<ChannelStateWatch> {
        &self.state
    }

    /// Session state this channel writes into.
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Identifier stamped on outgoing packets.
    pub fn sender_id(&self) -> SessionId {
        self.sender_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Connect to the host at `addr`, waiting at most `timeout`.
    ///
    /// Only valid from [`ChannelState::Disconnected`]; any other state
    /// returns [`ControlError::InvalidState`] and leaves the existing
    /// receive task alone. On failure the channel becomes
    /// [`ChannelState::Closed`].
    pub async fn connect(&mut self, addr: SocketAddr, timeout: Duration) -> Result<(), ControlError> {
        let current = self.state.current();
        if current != ChannelState::Disconnected || self.link.is_some() {
            return Err(ControlError::InvalidState(current));
        }
        self.state.set(ChannelState::Connecting);

        let stream = match Self::open_stream(addr, timeout, &self.socket_config).await {
            Ok(stream) => stream,
            Err(source) => {
                tracing::error!("Failed to connect to {addr}: {source}");
                self.state.close();
                return Err(ControlError::ConnectFailed { addr, source });
            }
        };

        let (reader, writer) = stream.into_split();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.session),
            Arc::clone(&self.sender_id),
            self.notify_tx.clone(),
        );
        // Published before the task exists, so a receive failure can only
        // move Connected to Closed and never be overwritten.
        self.state.set(ChannelState::Connected);
        let receive_task = tokio::spawn(Self::receive_loop(
            reader,
            self.frame_config.clone(),
            dispatcher,
            Arc::clone(&self.state),
            shutdown_rx,
        ));

        self.link = Some(Link {
            writer: Mutex::new(writer),
            shutdown_tx,
            receive_task,
        });
        tracing::info!("Control channel connected to {addr}");
        Ok(())
    }

    async fn open_stream(
        addr: SocketAddr,
        timeout: Duration,
        socket_config: &SocketConfig,
    ) -> std::io::Result<TcpStream> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no handshake within {timeout:?}"),
                )
            })??;
        configure_stream(&stream, socket_config)?;
        Ok(stream)
    }

    /// Send one packet carrying `body`.
    ///
    /// A write error returns [`ControlError::SendFailed`]; the connection is
    /// not torn down, so the caller decides whether to [`close`](Self::close).
    pub async fn send(&self, body: PacketBody) -> Result<(), ControlError> {
        let current = self.state.current();
        let link = match (&self.link, current) {
            (Some(link), ChannelState::Connected) => link,
            _ => return Err(ControlError::InvalidState(current)),
        };

        let packet = Packet::new(self.sender_id(), body);
        let bytes = encode_packet(&packet)?;

        let mut writer = link.writer.lock().await;
        write_frame(&mut *writer, &bytes, &self.frame_config)
            .await
            .map_err(|e| {
                tracing::warn!(kind = ?packet.kind(), "Send failed: {e}");
                ControlError::SendFailed(e)
            })?;

        tracing::debug!(kind = ?packet.kind(), "Sent packet");
        Ok(())
    }

    /// Send the role-carrying packet a station emits for `kind`.
    pub async fn send_station(&self, kind: PacketKind, role: Role) -> Result<(), ControlError> {
        let body = PacketBody::station(kind, role).ok_or(ControlError::NotStationKind(kind))?;
        self.send(body).await
    }

    /// Close the connection and wait for the receive task to exit.
    ///
    /// Does not raise [`Notification::ConnectionLost`].
    pub async fn close(&mut self) {
        let Some(link) = self.link.take() else {
            self.state.close();
            return;
        };

        let _ = link.shutdown_tx.send(true);
        self.state.close();

        let mut writer = link.writer.into_inner();
        let _ = writer.shutdown().await;
        drop(writer);

        if let Err(e) = link.receive_task.await {
            tracing::error!("Receive task ended abnormally: {e}");
        }
        tracing::info!("Control channel closed");
    }

    /// Read frames until the connection fails or shutdown is signalled.
    async fn receive_loop(
        mut reader: OwnedReadHalf,
        config: FrameConfig,
        dispatcher: Dispatcher,
        state: Arc<ChannelStateWatch>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                result = read_frame(&mut reader, &config) => {
                    match result {
                        Ok(Frame::Keepalive) => {
                            tracing::trace!("Keepalive frame");
                        }
                        Ok(Frame::Body(bytes)) => match decode_packet(&bytes) {
                            Ok(packet) => dispatcher.dispatch(packet),
                            Err(e) => tracing::warn!("Dropping packet: {e}"),
                        },
                        Err(e) => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                            tracing::error!("Control connection lost: {e}");
                            if state.close() {
                                dispatcher.connection_lost();
                            }
                            break;
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            let _ = link.shutdown_tx.send(true);
            self.state.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn channel() -> (ControlChannel, mpsc::UnboundedReceiver<Notification>) {
        ControlChannel::new(Arc::new(SessionState::new()))
    }

    #[tokio::test]
    async fn test_channel_starts_disconnected() {
        let (channel, _rx) = channel();
        assert_eq!(channel.state().current(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_transitions_to_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (mut channel, _rx) = channel();

        let (result, accepted) = tokio::join!(
            channel.connect(addr, DEFAULT_CONNECT_TIMEOUT),
            listener.accept()
        );
        result.unwrap();
        assert!(accepted.is_ok());
        assert_eq!(channel.state().current(), ChannelState::Connected);
    }

    #[tokio::test]
    async fn test_refused_connect_closes_channel() {
        // bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let (mut channel, _rx) = channel();

        let result = channel.connect(addr, DEFAULT_CONNECT_TIMEOUT).await;
        assert!(matches!(result, Err(ControlError::ConnectFailed { .. })));
        assert_eq!(channel.state().current(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn test_connect_after_close_rejected() {
        let (mut channel, _rx) = channel();
        channel.close().await;

        let addr = "127.0.0.1:9".parse().unwrap();
        let result = channel.connect(addr, DEFAULT_CONNECT_TIMEOUT).await;
        assert!(matches!(
            result,
            Err(ControlError::InvalidState(ChannelState::Closed))
        ));
    }

    #[tokio::test]
    async fn test_send_before_connect_rejected() {
        let (channel, _rx) = channel();
        let result = channel.send(PacketBody::CreditsTrigger).await;
        assert!(matches!(
            result,
            Err(ControlError::InvalidState(ChannelState::Disconnected))
        ));
    }

    #[tokio::test]
    async fn test_send_station_rejects_host_kind() {
        let (channel, _rx) = channel();
        let result = channel
            .send_station(PacketKind::LevelChanged, Role::Captain)
            .await;
        assert!(matches!(
            result,
            Err(ControlError::NotStationKind(PacketKind::LevelChanged))
        ));
    }

    #[tokio::test]
    async fn test_sender_id_generated_per_channel() {
        let (a, _rx_a) = channel();
        let (b, _rx_b) = channel();
        assert_ne!(a.sender_id(), b.sender_id());
    }

    #[tokio::test]
    async fn test_state_watch_close_is_idempotent() {
        let watch = ChannelStateWatch::new();
        assert!(watch.close());
        assert!(!watch.close());
        assert_eq!(watch.current(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn test_state_watch_subscriber_receives_updates() {
        let watch = ChannelStateWatch::new();
        let mut rx = watch.subscribe();
        watch.set(ChannelState::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ChannelState::Connecting);
    }
}
