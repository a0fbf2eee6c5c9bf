//! NTRP message model and serial framing.
//!
//! Every serial frame carries:
//! - a start marker (`'>'`) for stream synchronization
//! - talker and receiver addresses
//! - a 1-byte packet size N, followed by N packet bytes and an end marker
//!
//! Radio payloads carry the packet bytes only. Reads are timeout-bounded
//! poll loops; no call blocks longer than the configured frame timeout.

pub mod codec;
pub mod error;
pub mod header;
pub mod link;
pub mod reader;
pub mod writer;

pub use codec::{
    decode, decode_frame, decode_pipe_payload, encode, encode_into, encode_pipe_payload,
    FrameConfig, Message, Packet, END_BYTE, FRAME_OVERHEAD, MAX_DATA_SIZE, MAX_FRAME_SIZE,
    MAX_PACKET_SIZE, PACKET_HEADER_SIZE, PREFIX_SIZE, START_BYTE,
};
#[cfg(feature = "async")]
pub use codec::NtrpCodec;
pub use error::{FrameError, ReadStage, Result};
pub use header::{
    ACK, CLOSEPIPE, CMD, EXIT, LOG, MASTER_ID, MSG, NAK, OPENPIPE, ROUTER_ID, SET,
};
pub use link::SerialLink;
pub use reader::FrameReader;
pub use writer::FrameWriter;
