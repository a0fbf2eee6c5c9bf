use std::fmt;
use std::str::FromStr;

use ntrp_frame::Packet;
use ntrp_transport::{DataRate, RadioAddress, ADDRESS_LEN, MAX_CHANNEL};

use crate::error::{Result, RouterError};

/// Receive slots on the transceiver.
pub const PIPE_TABLE_CAPACITY: usize = 6;

/// A logical link to one remote radio node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipe {
    pub id: u8,
    pub channel: u8,
    pub data_rate: DataRate,
    pub address: RadioAddress,
}

impl Pipe {
    pub fn new(id: u8, channel: u8, data_rate: DataRate, address: RadioAddress) -> Result<Self> {
        if channel > MAX_CHANNEL {
            return Err(RouterError::InvalidChannel {
                channel,
                max: MAX_CHANNEL,
            });
        }
        Ok(Self {
            id,
            channel,
            data_rate,
            address,
        })
    }

    /// Build a pipe from the raw speed byte carried on the wire.
    pub fn from_speed_byte(id: u8, channel: u8, speed: u8, address: RadioAddress) -> Result<Self> {
        let data_rate = DataRate::from_speed_byte(speed).ok_or(RouterError::InvalidSpeed(speed))?;
        Self::new(id, channel, data_rate, address)
    }

    /// Parse the data of an OPENPIPE packet.
    ///
    /// Layout: `[channel][speed][address; 6]`, pipe id in the dataID byte.
    /// The caller checks the packet size first.
    pub fn from_open_command(packet: &Packet) -> Result<Self> {
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&packet.data[2..2 + ADDRESS_LEN]);
        Self::from_speed_byte(packet.data_id, packet.data[0], packet.data[1], address)
    }

    /// The OPENPIPE data bytes describing this pipe.
    pub fn open_command_data(&self) -> [u8; 2 + ADDRESS_LEN] {
        let mut data = [0u8; 2 + ADDRESS_LEN];
        data[0] = self.channel;
        data[1] = self.data_rate.speed_byte();
        data[2..].copy_from_slice(&self.address);
        data
    }

    /// Address as upper-case hex, for logs and diagnostics.
    pub fn address_hex(&self) -> String {
        hex::encode_upper(self.address)
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pipe {} ch{} {} {}",
            self.id,
            self.channel,
            self.data_rate,
            self.address_hex()
        )
    }
}

/// Parses `ID:CHANNEL:RATE:ADDRESS`, e.g. `7:76:1000:E7E7E7E7E701`.
///
/// ID follows [`parse_address`]. RATE is the
/// air rate in kbit/s (250, 1000 or 2000). ADDRESS is six bytes of hex.
impl FromStr for Pipe {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |msg: &str| RouterError::InvalidPipeSpec(format!("{s}: {msg}"));

        let parts: Vec<&str> = s.split(':').collect();
        let [id, channel, rate, address] = parts.as_slice() else {
            return Err(invalid("expected ID:CHANNEL:RATE:ADDRESS"));
        };

        let id = parse_address(id).ok_or_else(|| invalid("bad pipe id"))?;
        let channel: u8 = channel.parse().map_err(|_| invalid("bad channel"))?;
        let data_rate = match *rate {
            "250" => DataRate::Kbps250,
            "1000" => DataRate::Mbps1,
            "2000" => DataRate::Mbps2,
            _ => return Err(invalid("rate must be 250, 1000 or 2000")),
        };
        let bytes = hex::decode(address).map_err(|_| invalid("address is not hex"))?;
        let address: RadioAddress = bytes
            .try_into()
            .map_err(|_| invalid("address must be 6 bytes"))?;

        Self::new(id, channel, data_rate, address)
    }
}

/// Parse an address byte.
///
/// A single character stands for itself, so `0` is the master and `A` is
/// 0x41. Longer input is a decimal or `0x`-prefixed hex byte.
pub fn parse_address(s: &str) -> Option<u8> {
    match s.as_bytes() {
        [c] => Some(*c),
        _ => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
    }
}

/// Ordered table of open pipes plus the last-transmit cache.
///
/// Slot indices are dense: slot `i` corresponds to receive slot `i` on the
/// radio. Ids are not required to be unique; every matching entry receives
/// a copy of a routed message.
#[derive(Debug, Clone)]
pub struct PipeTable {
    entries: Vec<Pipe>,
    capacity: usize,
    last_transmit: Option<usize>,
}

impl PipeTable {
    /// Empty table. Capacity is limited to the range of a radio slot byte.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(u8::MAX as usize + 1);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            last_transmit: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn get(&self, slot: usize) -> Option<&Pipe> {
        self.entries.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pipe> {
        self.entries.iter()
    }

    /// Append a pipe; returns its slot, or `None` when the table is full.
    pub fn insert(&mut self, pipe: Pipe) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        self.entries.push(pipe);
        Some(self.entries.len() - 1)
    }

    /// Slots of every entry with `id`, in table order.
    pub fn lookup(&self, id: u8) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, pipe)| pipe.id == id)
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Remove every entry with `id` and compact the table.
    ///
    /// Returns the removed slots (pre-removal indices). The transmit cache
    /// is cleared if it pointed at a removed entry, otherwise shifted to
    /// follow its entry.
    pub fn remove(&mut self, id: u8) -> Vec<usize> {
        let removed = self.lookup(id);
        if removed.is_empty() {
            return removed;
        }

        self.last_transmit = self.last_transmit.and_then(|slot| {
            if removed.contains(&slot) {
                None
            } else {
                Some(slot - removed.iter().filter(|r| **r < slot).count())
            }
        });
        self.entries.retain(|pipe| pipe.id != id);
        removed
    }

    /// Slot whose address the radio is currently transmitting to.
    pub fn last_transmit(&self) -> Option<usize> {
        self.last_transmit
    }

    pub(crate) fn set_last_transmit(&mut self, slot: usize) {
        self.last_transmit = Some(slot);
    }

    pub(crate) fn invalidate_transmit(&mut self) {
        self.last_transmit = None;
    }
}

impl Default for PipeTable {
    fn default() -> Self {
        Self::new(PIPE_TABLE_CAPACITY)
    }
}
