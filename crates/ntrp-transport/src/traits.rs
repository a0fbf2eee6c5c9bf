use std::fmt;

use crate::error::{Result, TransportError};

/// Length of a radio pipe address in bytes.
pub const ADDRESS_LEN: usize = 6;

/// A radio pipe address.
pub type RadioAddress = [u8; ADDRESS_LEN];

/// Highest RF channel index accepted by the transceiver.
pub const MAX_CHANNEL: u8 = 125;

/// Byte-oriented serial link to the host computer.
///
/// Reads never block: callers check [`SerialPort::available`] and poll.
pub trait SerialPort {
    /// Number of bytes that can be read without waiting.
    fn available(&mut self) -> Result<usize>;

    /// Read one byte. Only valid when `available() >= 1`; otherwise returns
    /// [`TransportError::NoData`].
    fn read_byte(&mut self) -> Result<u8>;

    /// Write the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Emit the handshake sync token.
    fn send_sync_token(&mut self, token: &[u8]) -> Result<()> {
        self.write_all(token)?;
        self.flush()
    }
}

impl<T: SerialPort + ?Sized> SerialPort for &mut T {
    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_all(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn send_sync_token(&mut self, token: &[u8]) -> Result<()> {
        (**self).send_sync_token(token)
    }
}

impl<T: SerialPort + ?Sized> SerialPort for Box<T> {
    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_all(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn send_sync_token(&mut self, token: &[u8]) -> Result<()> {
        (**self).send_sync_token(token)
    }
}

/// Air data rate selector carried in a pipe's speed byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataRate {
    Kbps250,
    Mbps1,
    Mbps2,
}

impl DataRate {
    /// Map a wire speed byte to a data rate.
    pub fn from_speed_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Kbps250),
            1 => Some(Self::Mbps1),
            2 => Some(Self::Mbps2),
            _ => None,
        }
    }

    /// The wire speed byte for this rate.
    pub fn speed_byte(self) -> u8 {
        match self {
            Self::Kbps250 => 0,
            Self::Mbps1 => 1,
            Self::Mbps2 => 2,
        }
    }

    /// Air data rate in kbit/s.
    pub fn kbps(self) -> u32 {
        match self {
            Self::Kbps250 => 250,
            Self::Mbps1 => 1000,
            Self::Mbps2 => 2000,
        }
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}kbps", self.kbps())
    }
}

/// Half-duplex packet radio (nRF24-style transceiver).
///
/// The radio is either listening (RX) or transmitting (TX). [`Radio::write`]
/// is only valid between [`Radio::stop_listening`] and
/// [`Radio::begin_listening`].
pub trait Radio {
    /// Bind a receive slot to an address.
    fn set_receive_address(&mut self, slot: u8, address: &RadioAddress) -> Result<()>;

    /// Release a receive slot.
    fn close_receive_pipe(&mut self, _slot: u8) -> Result<()> {
        Ok(())
    }

    /// Enter receive mode.
    fn begin_listening(&mut self) -> Result<()>;

    /// Leave receive mode so the radio can transmit.
    fn stop_listening(&mut self) -> Result<()>;

    /// Set the destination address for subsequent writes.
    fn set_transmit_address(&mut self, address: &RadioAddress) -> Result<()>;

    /// Transmit one payload.
    fn write(&mut self, payload: &[u8]) -> Result<()>;

    /// Tune the RF channel.
    fn set_channel(&mut self, _channel: u8) -> Result<()> {
        Err(TransportError::Unsupported(
            "channel selection not implemented by this radio".to_string(),
        ))
    }

    /// Select the air data rate.
    fn set_data_rate(&mut self, _rate: DataRate) -> Result<()> {
        Err(TransportError::Unsupported(
            "data rate selection not implemented by this radio".to_string(),
        ))
    }

    /// Fetch one received payload, if any, into `buf`.
    ///
    /// Returns the receive slot it arrived on and its length.
    fn try_receive(&mut self, _buf: &mut [u8]) -> Result<Option<(u8, usize)>> {
        Ok(None)
    }
}

impl<T: Radio + ?Sized> Radio for &mut T {
    fn set_receive_address(&mut self, slot: u8, address: &RadioAddress) -> Result<()> {
        (**self).set_receive_address(slot, address)
    }

    fn close_receive_pipe(&mut self, slot: u8) -> Result<()> {
        (**self).close_receive_pipe(slot)
    }

    fn begin_listening(&mut self) -> Result<()> {
        (**self).begin_listening()
    }

    fn stop_listening(&mut self) -> Result<()> {
        (**self).stop_listening()
    }

    fn set_transmit_address(&mut self, address: &RadioAddress) -> Result<()> {
        (**self).set_transmit_address(address)
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        (**self).write(payload)
    }

    fn set_channel(&mut self, channel: u8) -> Result<()> {
        (**self).set_channel(channel)
    }

    fn set_data_rate(&mut self, rate: DataRate) -> Result<()> {
        (**self).set_data_rate(rate)
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> Result<Option<(u8, usize)>> {
        (**self).try_receive(buf)
    }
}

impl<T: Radio + ?Sized> Radio for Box<T> {
    fn set_receive_address(&mut self, slot: u8, address: &RadioAddress) -> Result<()> {
        (**self).set_receive_address(slot, address)
    }

    fn close_receive_pipe(&mut self, slot: u8) -> Result<()> {
        (**self).close_receive_pipe(slot)
    }

    fn begin_listening(&mut self) -> Result<()> {
        (**self).begin_listening()
    }

    fn stop_listening(&mut self) -> Result<()> {
        (**self).stop_listening()
    }

    fn set_transmit_address(&mut self, address: &RadioAddress) -> Result<()> {
        (**self).set_transmit_address(address)
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        (**self).write(payload)
    }

    fn set_channel(&mut self, channel: u8) -> Result<()> {
        (**self).set_channel(channel)
    }

    fn set_data_rate(&mut self, rate: DataRate) -> Result<()> {
        (**self).set_data_rate(rate)
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> Result<Option<(u8, usize)>> {
        (**self).try_receive(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_byte_mapping() {
        assert_eq!(DataRate::from_speed_byte(0), Some(DataRate::Kbps250));
        assert_eq!(DataRate::from_speed_byte(1), Some(DataRate::Mbps1));
        assert_eq!(DataRate::from_speed_byte(2), Some(DataRate::Mbps2));
        assert_eq!(DataRate::from_speed_byte(3), None);
        assert_eq!(DataRate::Mbps2.speed_byte(), 2);
        assert_eq!(DataRate::Kbps250.to_string(), "250kbps");
    }

    #[test]
    fn boxed_radio_forwards() {
        let mut radio: Box<dyn Radio> = Box::new(crate::sim::RecordingRadio::new());
        radio.stop_listening().unwrap();
        radio.write(b"hi").unwrap();
        assert!(matches!(radio.set_channel(3), Ok(())));
    }
}
