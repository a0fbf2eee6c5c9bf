use std::time::Duration;

use bytes::{BufMut, BytesMut};
use ntrp_transport::{Clock, SerialPort};
use tracing::{debug, trace};

use crate::codec::{decode, FrameConfig, Message, MAX_FRAME_SIZE, PREFIX_SIZE, START_BYTE};
use crate::error::{FrameError, ReadStage, Result};

/// Smallest sleep between polls; a zero interval would never advance a
/// virtual clock.
const MIN_POLL_INTERVAL: Duration = Duration::from_micros(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    WaitStart,
    WaitHeader,
    WaitPayload { remaining: usize },
    Decode,
}

enum Wait {
    Ready,
    Expired(Duration),
}

/// Assembles one serial frame per call from a non-blocking [`SerialPort`].
///
/// Every wait is bounded by [`FrameConfig::frame_timeout`]; the accumulator
/// and elapsed time are reset at the start of each call, so a failed read
/// never leaks bytes into the next one.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    config: FrameConfig,
}

impl FrameReader {
    /// Create a new frame reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            config,
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Ok(None)` when no start byte arrives within the timeout.
    /// A leading byte other than the start marker is consumed and reported
    /// as [`FrameError::InvalidStart`]; nothing else is consumed in that
    /// case.
    pub fn read_message<S, C>(&mut self, port: &mut S, clock: &C) -> Result<Option<Message>>
    where
        S: SerialPort + ?Sized,
        C: Clock + ?Sized,
    {
        self.buf.clear();
        let mut state = ReadState::WaitStart;

        loop {
            trace!(?state, buffered = self.buf.len(), "frame reader step");
            state = match state {
                ReadState::WaitStart => {
                    if let Wait::Expired(_) = self.wait_for(port, clock, 1)? {
                        return Ok(None);
                    }
                    let byte = port.read_byte()?;
                    if byte != START_BYTE {
                        debug!(byte, "discarding byte before start marker");
                        return Err(FrameError::InvalidStart(byte));
                    }
                    self.buf.put_u8(byte);
                    ReadState::WaitHeader
                }
                ReadState::WaitHeader => {
                    let needed = PREFIX_SIZE - 1;
                    self.expect(port, clock, needed, ReadStage::Header)?;
                    self.take(port, needed)?;

                    let size = self.buf[PREFIX_SIZE - 1] as usize;
                    if size > self.config.max_packet_size {
                        return Err(FrameError::PacketTooLarge {
                            size,
                            max: self.config.max_packet_size,
                        });
                    }
                    ReadState::WaitPayload {
                        remaining: size + 1,
                    }
                }
                ReadState::WaitPayload { remaining } => {
                    self.expect(port, clock, remaining, ReadStage::Payload)?;
                    self.take(port, remaining)?;
                    ReadState::Decode
                }
                ReadState::Decode => {
                    let msg = decode(&self.buf)?;
                    debug!(
                        talker = msg.talker_id,
                        receiver = msg.receiver_id,
                        size = msg.packet_size,
                        "frame received"
                    );
                    return Ok(Some(msg));
                }
            };
        }
    }

    fn expect<S, C>(&self, port: &mut S, clock: &C, needed: usize, stage: ReadStage) -> Result<()>
    where
        S: SerialPort + ?Sized,
        C: Clock + ?Sized,
    {
        match self.wait_for(port, clock, needed)? {
            Wait::Ready => Ok(()),
            Wait::Expired(waited) => {
                debug!(%stage, ?waited, needed, "frame read timed out");
                Err(FrameError::Timeout { stage, waited })
            }
        }
    }

    fn wait_for<S, C>(&self, port: &mut S, clock: &C, needed: usize) -> Result<Wait>
    where
        S: SerialPort + ?Sized,
        C: Clock + ?Sized,
    {
        let quantum = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        let start = clock.now();
        loop {
            if port.available()? >= needed {
                return Ok(Wait::Ready);
            }
            let waited = clock.now().saturating_sub(start);
            if waited >= self.config.frame_timeout {
                return Ok(Wait::Expired(waited));
            }
            clock.sleep(quantum.min(self.config.frame_timeout - waited));
        }
    }

    fn take<S>(&mut self, port: &mut S, count: usize) -> Result<()>
    where
        S: SerialPort + ?Sized,
    {
        for _ in 0..count {
            let byte = port.read_byte()?;
            self.buf.put_u8(byte);
        }
        Ok(())
    }

    /// Update maximum packet size for subsequent reads.
    pub fn set_max_packet_size(&mut self, max_packet_size: usize) {
        self.config.max_packet_size = max_packet_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
