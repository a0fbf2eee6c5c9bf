use std::fmt;
use std::time::Duration;

/// Which wait of the frame reader ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    /// Waiting for talker, receiver and size bytes.
    Header,
    /// Waiting for the packet bytes and trailer.
    Payload,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStage::Header => f.write_str("header"),
            ReadStage::Payload => f.write_str("payload"),
        }
    }
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The sync handshake has not completed; serial reads are refused.
    #[error("serial link not ready (sync handshake pending)")]
    LinkNotReady,

    /// Not enough bytes arrived within the frame timeout.
    #[error("timed out waiting for frame {stage} after {waited:?}")]
    Timeout { stage: ReadStage, waited: Duration },

    /// The first byte of a frame is not the start marker.
    #[error("invalid start byte 0x{0:02x}")]
    InvalidStart(u8),

    /// The declared packet size exceeds the maximum.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// The buffer does not hold a complete frame.
    #[error("truncated frame ({actual} bytes, expected {expected})")]
    Truncated { expected: usize, actual: usize },

    /// The last byte of a frame is not the end marker.
    #[error("invalid trailer byte 0x{0:02x}")]
    InvalidTrailer(u8),

    /// The underlying transport failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] ntrp_transport::TransportError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the link can keep running after this error.
    ///
    /// Everything except a transport failure only costs the current frame.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FrameError::Transport(_) | FrameError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
