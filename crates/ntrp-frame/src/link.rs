use ntrp_transport::{Clock, SerialPort, SystemClock};
use tracing::info;

use crate::codec::{FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// The serial link to the host: port, clock, framing state and the
/// link-ready flag.
///
/// Until [`SerialLink::mark_ready`] has been called (by a successful sync
/// handshake) every framed read and write is refused with
/// [`FrameError::LinkNotReady`]. Once set, the flag is never cleared.
pub struct SerialLink<S, C = SystemClock> {
    port: S,
    clock: C,
    reader: FrameReader,
    writer: FrameWriter,
    ready: bool,
}

impl<S: SerialPort> SerialLink<S, SystemClock> {
    /// Link over `port` using the system clock and default configuration.
    pub fn open(port: S) -> Self {
        Self::new(port, SystemClock::new())
    }
}

impl<S: SerialPort, C: Clock> SerialLink<S, C> {
    pub fn new(port: S, clock: C) -> Self {
        Self::with_config(port, clock, FrameConfig::default())
    }

    pub fn with_config(port: S, clock: C, config: FrameConfig) -> Self {
        Self {
            port,
            clock,
            reader: FrameReader::with_config(config),
            writer: FrameWriter::new(),
            ready: false,
        }
    }

    /// Whether the sync handshake has completed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Mark the link live. Called once by the sync handshake.
    pub fn mark_ready(&mut self) {
        if !self.ready {
            info!("serial link ready");
        }
        self.ready = true;
    }

    /// Read the next frame; `Ok(None)` when the link is idle.
    pub fn read_message(&mut self) -> Result<Option<Message>> {
        if !self.ready {
            return Err(FrameError::LinkNotReady);
        }
        self.reader.read_message(&mut self.port, &self.clock)
    }

    /// Send one frame to the host.
    pub fn write_message(&mut self, msg: &Message) -> Result<()> {
        if !self.ready {
            return Err(FrameError::LinkNotReady);
        }
        self.writer.write_message(&mut self.port, msg)
    }

    /// Borrow the serial port.
    pub fn port(&self) -> &S {
        &self.port
    }

    /// Mutably borrow the serial port.
    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    /// The link's clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Port and clock together, for protocol steps that poll the raw port.
    pub fn parts_mut(&mut self) -> (&mut S, &C) {
        (&mut self.port, &self.clock)
    }

    /// Current frame configuration.
    pub fn config(&self) -> &FrameConfig {
        self.reader.config()
    }

    /// Consume the link and return the port.
    pub fn into_inner(self) -> S {
        self.port
    }
}

impl<S, C> std::fmt::Debug for SerialLink<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("ready", &self.ready)
            .field("config", self.reader.config())
            .finish()
    }
}
