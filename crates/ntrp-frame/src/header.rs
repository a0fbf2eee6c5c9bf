//! Reserved addresses and packet header bytes.
//!
//! Addresses share one 0-255 space: [`MASTER_ID`] and [`ROUTER_ID`] are
//! reserved, every other value names a radio pipe. Keeping pipe ids clear of
//! the reserved values is the caller's responsibility.

/// The host computer on the serial link.
pub const MASTER_ID: u8 = b'0';

/// The router itself (administrative commands).
pub const ROUTER_ID: u8 = b'1';

/// Text message; routed to the router it is acknowledged.
pub const MSG: u8 = 0x01;

/// Positive acknowledgement.
pub const ACK: u8 = 0x02;

/// Negative acknowledgement.
pub const NAK: u8 = 0x03;

/// Parameter set.
pub const SET: u8 = 0x04;

/// Telemetry log record.
pub const LOG: u8 = 0x05;

/// Application command.
pub const CMD: u8 = 0x06;

/// Router command: open a radio pipe.
pub const OPENPIPE: u8 = 0x10;

/// Router command: close a radio pipe.
pub const CLOSEPIPE: u8 = 0x11;

/// Router command: leave routing mode.
pub const EXIT: u8 = 0x12;

/// Human-readable name for a header byte.
pub fn header_name(header: u8) -> &'static str {
    match header {
        MSG => "MSG",
        ACK => "ACK",
        NAK => "NAK",
        SET => "SET",
        LOG => "LOG",
        CMD => "CMD",
        OPENPIPE => "OPENPIPE",
        CLOSEPIPE => "CLOSEPIPE",
        EXIT => "EXIT",
        _ => "UNKNOWN",
    }
}

/// Human-readable name for an address.
pub fn address_name(id: u8) -> &'static str {
    match id {
        MASTER_ID => "MASTER",
        ROUTER_ID => "ROUTER",
        _ => "PIPE",
    }
}

/// Returns true if `id` is one of the reserved addresses.
pub fn is_reserved_id(id: u8) -> bool {
    id == MASTER_ID || id == ROUTER_ID
}
