use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in serial or radio transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to apply line settings to the serial device.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer hung up; no further input will arrive.
    #[error("serial link closed by peer")]
    Closed,

    /// The peer stopped draining output and the write budget ran out.
    #[error("write stalled after {written} bytes ({waited:?})")]
    WriteTimeout { written: usize, waited: Duration },

    /// A byte was requested while none were available.
    #[error("no data available")]
    NoData,

    /// The radio was asked to transmit while it is listening.
    #[error("radio is in receive mode")]
    NotTransmitting,

    /// The requested setting is not supported by this transport.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
