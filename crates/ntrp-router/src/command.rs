use std::fmt;

use ntrp_frame::{Message, Packet, CLOSEPIPE, EXIT, MSG, OPENPIPE, PACKET_HEADER_SIZE, ROUTER_ID};
use ntrp_transport::ADDRESS_LEN;

use crate::error::Result;
use crate::pipe::Pipe;

/// Smallest packet size that carries a full OPENPIPE description.
pub const OPENPIPE_MIN_SIZE: usize = PACKET_HEADER_SIZE + 2 + ADDRESS_LEN;

/// Administrative commands addressed to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterCommand {
    Msg,
    OpenPipe,
    ClosePipe,
    Exit,
}

impl RouterCommand {
    pub fn from_header(header: u8) -> Option<Self> {
        match header {
            MSG => Some(Self::Msg),
            OPENPIPE => Some(Self::OpenPipe),
            CLOSEPIPE => Some(Self::ClosePipe),
            EXIT => Some(Self::Exit),
            _ => None,
        }
    }

    pub fn header(self) -> u8 {
        match self {
            Self::Msg => MSG,
            Self::OpenPipe => OPENPIPE,
            Self::ClosePipe => CLOSEPIPE,
            Self::Exit => EXIT,
        }
    }
}

impl fmt::Display for RouterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ntrp_frame::header::header_name(self.header()))
    }
}

/// Result of executing one administrative command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// MSG: acknowledged with a diagnostic.
    Acknowledged,
    /// OPENPIPE: pipe stored in `slot`.
    PipeOpened { slot: usize, id: u8 },
    /// OPENPIPE: no free slot.
    PipeTableFull { id: u8 },
    /// OPENPIPE: channel or speed out of range.
    InvalidPipe { id: u8, channel: u8, speed: u8 },
    /// OPENPIPE: packet too short to describe a pipe.
    RejectedTooSmall { size: u8 },
    /// Recognized command that performs no action.
    Ignored(RouterCommand),
    /// Header is not a router command.
    Unrecognized(u8),
}

/// Build an OPENPIPE command from the host.
pub fn open_pipe_message(talker_id: u8, pipe: &Pipe) -> Result<Message> {
    Ok(Message::with_data(
        talker_id,
        ROUTER_ID,
        OPENPIPE,
        pipe.id,
        &pipe.open_command_data(),
    )?)
}

/// Build a CLOSEPIPE command for pipe `id`.
pub fn close_pipe_message(talker_id: u8, id: u8) -> Message {
    header_only(talker_id, CLOSEPIPE, id)
}

/// Build an EXIT command.
pub fn exit_message(talker_id: u8) -> Message {
    header_only(talker_id, EXIT, 0)
}

fn header_only(talker_id: u8, header: u8, data_id: u8) -> Message {
    Message {
        talker_id,
        receiver_id: ROUTER_ID,
        packet: Packet::empty(header, data_id),
        packet_size: PACKET_HEADER_SIZE as u8,
    }
}
