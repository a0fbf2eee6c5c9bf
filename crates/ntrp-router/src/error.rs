/// Errors that can occur in router operations.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ntrp_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] ntrp_frame::FrameError),

    /// Pipe channel outside the radio's range.
    #[error("invalid pipe channel {channel} (max {max})")]
    InvalidChannel { channel: u8, max: u8 },

    /// Pipe speed byte does not name a data rate.
    #[error("invalid pipe speed byte {0}")]
    InvalidSpeed(u8),

    /// Pipe description could not be parsed.
    #[error("invalid pipe spec: {0}")]
    InvalidPipeSpec(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
