//! Length-prefixed framing for the control stream.
//!
//! Each control packet travels in one frame:
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   packet body      |
//! | u32 little-endian |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length excludes the prefix itself. A zero length is a keepalive and
//! carries no packet. Bodies longer than [`FrameConfig::max_payload_size`]
//! are refused in both directions; on read the stream cannot be resynchronised
//! afterwards, so callers treat that error as fatal for the connection.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Configuration for the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest accepted body in bytes. Default: 4096.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 4096,
        }
    }
}

impl FrameConfig {
    /// Config with the given body limit.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self { max_payload_size }
    }
}

/// One frame read off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Zero-length frame.
    Keepalive,
    /// Encoded packet body.
    Body(Vec<u8>),
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The body size exceeds the configured maximum.
    #[error("frame size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The announced or attempted body size.
        size: usize,
        /// The configured maximum.
        max: u32,
    },

    /// The peer closed the stream, possibly mid-frame.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn closed_or_io(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Read one frame. Waits until the whole frame has arrived.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Frame, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(closed_or_io)?;

    let len = u32::from_le_bytes(len_buf);
    if len == 0 {
        return Ok(Frame::Keepalive);
    }
    if len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len as usize,
            max: config.max_payload_size,
        });
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await.map_err(closed_or_io)?;
    Ok(Frame::Body(body))
}

/// Write `body` as one frame and flush.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    body: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= config.max_payload_size)
        .ok_or(FrameError::PayloadTooLarge {
            size: body.len(),
            max: config.max_payload_size,
        })?;

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(body);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a zero-length keepalive frame, as the host does.
#[cfg(test)]
pub(crate) async fn write_keepalive<W: AsyncWriteExt + Unpin>(writer: &mut W) -> Result<(), FrameError> {
    writer.write_all(&0u32.to_le_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
