use bytes::BytesMut;
use ntrp_transport::SerialPort;
use tracing::debug;

use crate::codec::{encode_into, Message, MAX_FRAME_SIZE};
use crate::error::Result;

/// Writes complete serial frames to a [`SerialPort`].
///
/// The frame is fully encoded before the first byte goes out, so a message
/// that fails to encode writes nothing.
#[derive(Debug)]
pub struct FrameWriter {
    buf: BytesMut,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Encode and send one message.
    pub fn write_message<S>(&mut self, port: &mut S, msg: &Message) -> Result<()>
    where
        S: SerialPort + ?Sized,
    {
        self.buf.clear();
        encode_into(msg, &mut self.buf)?;
        port.write_all(&self.buf)?;
        port.flush()?;
        debug!(
            talker = msg.talker_id,
            receiver = msg.receiver_id,
            bytes = self.buf.len(),
            "frame sent"
        );
        Ok(())
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}
