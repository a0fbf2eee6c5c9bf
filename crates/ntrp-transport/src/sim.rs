//! In-memory transports for deterministic tests and dry runs.
//!
//! [`ScriptedSerial`] releases inbound bytes at virtual times taken from a
//! shared [`ManualClock`]; [`RecordingRadio`] records every call made to it.

use std::collections::VecDeque;
use std::time::Duration;

use crate::clock::{Clock, ManualClock};
use crate::error::{Result, TransportError};
use crate::traits::{DataRate, Radio, RadioAddress, SerialPort};

/// Serial port whose inbound bytes follow a time script.
#[derive(Debug, Clone)]
pub struct ScriptedSerial {
    clock: ManualClock,
    schedule: VecDeque<(Duration, Vec<u8>)>,
    rx: VecDeque<u8>,
    written: Vec<u8>,
    sync_tokens_sent: usize,
    bytes_read: usize,
    hung_up: bool,
}

impl ScriptedSerial {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            schedule: VecDeque::new(),
            rx: VecDeque::new(),
            written: Vec::new(),
            sync_tokens_sent: 0,
            bytes_read: 0,
            hung_up: false,
        }
    }

    /// Make `bytes` available immediately.
    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Make `bytes` available once the clock reaches `at`.
    ///
    /// Entries must be scripted in non-decreasing time order.
    pub fn push_at(&mut self, at: Duration, bytes: &[u8]) {
        self.schedule.push_back((at, bytes.to_vec()));
    }

    /// Builder form of [`ScriptedSerial::push`].
    pub fn with_input(mut self, bytes: &[u8]) -> Self {
        self.push(bytes);
        self
    }

    /// Builder form of [`ScriptedSerial::push_at`].
    pub fn with_input_at(mut self, at: Duration, bytes: &[u8]) -> Self {
        self.push_at(at, bytes);
        self
    }

    /// Everything written to the port so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Drain and return everything written so far.
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }

    /// Number of `send_sync_token` calls.
    pub fn sync_tokens_sent(&self) -> usize {
        self.sync_tokens_sent
    }

    /// Number of bytes consumed through `read_byte`.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Simulate the device going away. Input already released can still be
    /// read; after that every read reports [`TransportError::Closed`].
    pub fn hang_up(&mut self) {
        self.hung_up = true;
    }

    /// Bytes released but not yet read.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn release_due(&mut self) {
        let now = self.clock.now();
        while let Some((at, _)) = self.schedule.front() {
            if *at > now {
                break;
            }
            if let Some((_, bytes)) = self.schedule.pop_front() {
                self.rx.extend(bytes);
            }
        }
    }
}

impl SerialPort for ScriptedSerial {
    fn available(&mut self) -> Result<usize> {
        self.release_due();
        if self.hung_up && self.rx.is_empty() {
            return Err(TransportError::Closed);
        }
        Ok(self.rx.len())
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.release_due();
        if self.hung_up && self.rx.is_empty() {
            return Err(TransportError::Closed);
        }
        let byte = self.rx.pop_front().ok_or(TransportError::NoData)?;
        self.bytes_read += 1;
        Ok(byte)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.written.extend_from_slice(buf);
        Ok(())
    }

    fn send_sync_token(&mut self, token: &[u8]) -> Result<()> {
        self.sync_tokens_sent += 1;
        self.write_all(token)
    }
}

/// One call observed by [`RecordingRadio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioOp {
    SetReceiveAddress { slot: u8, address: RadioAddress },
    CloseReceivePipe(u8),
    BeginListening,
    StopListening,
    SetTransmitAddress(RadioAddress),
    Write(Vec<u8>),
    SetChannel(u8),
    SetDataRate(DataRate),
}

/// Radio that records calls and enforces the TX/RX mode contract.
#[derive(Debug, Clone, Default)]
pub struct RecordingRadio {
    ops: Vec<RadioOp>,
    listening: bool,
    inbound: VecDeque<(u8, Vec<u8>)>,
}

impl RecordingRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, oldest first.
    pub fn ops(&self) -> &[RadioOp] {
        &self.ops
    }

    /// Forget recorded calls.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Payloads passed to `write`.
    pub fn writes(&self) -> Vec<&[u8]> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                RadioOp::Write(payload) => Some(payload.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Addresses passed to `set_transmit_address`.
    pub fn transmit_addresses(&self) -> Vec<RadioAddress> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                RadioOp::SetTransmitAddress(address) => Some(*address),
                _ => None,
            })
            .collect()
    }

    /// Whether the radio is currently in receive mode.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Queue a payload as if it arrived on receive slot `slot`.
    pub fn inject(&mut self, slot: u8, payload: &[u8]) {
        self.inbound.push_back((slot, payload.to_vec()));
    }
}

impl Radio for RecordingRadio {
    fn set_receive_address(&mut self, slot: u8, address: &RadioAddress) -> Result<()> {
        self.ops.push(RadioOp::SetReceiveAddress {
            slot,
            address: *address,
        });
        Ok(())
    }

    fn close_receive_pipe(&mut self, slot: u8) -> Result<()> {
        self.ops.push(RadioOp::CloseReceivePipe(slot));
        Ok(())
    }

    fn begin_listening(&mut self) -> Result<()> {
        self.listening = true;
        self.ops.push(RadioOp::BeginListening);
        Ok(())
    }

    fn stop_listening(&mut self) -> Result<()> {
        self.listening = false;
        self.ops.push(RadioOp::StopListening);
        Ok(())
    }

    fn set_transmit_address(&mut self, address: &RadioAddress) -> Result<()> {
        self.ops.push(RadioOp::SetTransmitAddress(*address));
        Ok(())
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        if self.listening {
            return Err(TransportError::NotTransmitting);
        }
        self.ops.push(RadioOp::Write(payload.to_vec()));
        Ok(())
    }

    fn set_channel(&mut self, channel: u8) -> Result<()> {
        self.ops.push(RadioOp::SetChannel(channel));
        Ok(())
    }

    fn set_data_rate(&mut self, rate: DataRate) -> Result<()> {
        self.ops.push(RadioOp::SetDataRate(rate));
        Ok(())
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> Result<Option<(u8, usize)>> {
        let Some((slot, payload)) = self.inbound.pop_front() else {
            return Ok(None);
        };
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok(Some((slot, len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_bytes_follow_the_clock() {
        let clock = ManualClock::new();
        let mut serial = ScriptedSerial::new(clock.clone())
            .with_input(b"a")
            .with_input_at(Duration::from_millis(10), b"bc");

        assert_eq!(serial.available().unwrap(), 1);
        clock.advance(Duration::from_millis(9));
        assert_eq!(serial.available().unwrap(), 1);
        clock.advance(Duration::from_millis(1));
        assert_eq!(serial.available().unwrap(), 3);

        assert_eq!(serial.read_byte().unwrap(), b'a');
        assert_eq!(serial.bytes_read(), 1);
        assert_eq!(serial.pending(), 2);
    }

    #[test]
    fn read_without_data_fails() {
        let mut serial = ScriptedSerial::new(ManualClock::new());
        assert!(matches!(serial.read_byte(), Err(TransportError::NoData)));
    }

    #[test]
    fn radio_rejects_write_while_listening() {
        let mut radio = RecordingRadio::new();
        radio.begin_listening().unwrap();
        assert!(matches!(
            radio.write(b"x"),
            Err(TransportError::NotTransmitting)
        ));

        radio.stop_listening().unwrap();
        radio.write(b"x").unwrap();
        assert_eq!(radio.writes(), vec![b"x".as_slice()]);
    }

    #[test]
    fn radio_delivers_injected_payloads() {
        let mut radio = RecordingRadio::new();
        radio.inject(2, b"hello");

        let mut buf = [0u8; 32];
        assert_eq!(radio.try_receive(&mut buf).unwrap(), Some((2, 5)));
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(radio.try_receive(&mut buf).unwrap(), None);
    }

    #[test]
    fn hang_up_drains_then_closes() {
        let mut serial = ScriptedSerial::new(ManualClock::new()).with_input(b"q");
        serial.hang_up();

        assert_eq!(serial.available().unwrap(), 1);
        assert_eq!(serial.read_byte().unwrap(), b'q');
        assert!(matches!(serial.available(), Err(TransportError::Closed)));
        assert!(matches!(serial.read_byte(), Err(TransportError::Closed)));
    }
}
