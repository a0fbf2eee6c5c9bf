use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// First byte of every serial frame.
pub const START_BYTE: u8 = b'>';

/// Last byte of every serial frame.
pub const END_BYTE: u8 = b'\n';

/// Frame prefix: start + talker + receiver + packet size = 4 bytes.
pub const PREFIX_SIZE: usize = 4;

/// Bytes a serial frame adds around its packet: prefix + trailer.
pub const FRAME_OVERHEAD: usize = PREFIX_SIZE + 1;

/// Maximum packet size (header + dataID + data); the radio payload limit.
pub const MAX_PACKET_SIZE: usize = 32;

/// Packet header: header byte + dataID byte.
pub const PACKET_HEADER_SIZE: usize = 2;

/// Capacity of a packet's data buffer.
pub const MAX_DATA_SIZE: usize = MAX_PACKET_SIZE - PACKET_HEADER_SIZE;

/// Maximum size of a serial frame.
pub const MAX_FRAME_SIZE: usize = MAX_PACKET_SIZE + FRAME_OVERHEAD;

/// Fixed-capacity payload unit carried by a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Command or message kind (see [`crate::header`]).
    pub header: u8,
    /// Meaning depends on `header`: byte count for MSG, pipe id for OPENPIPE.
    pub data_id: u8,
    /// Data bytes; only the first `packet_size - 2` are significant.
    pub data: [u8; MAX_DATA_SIZE],
}

impl Packet {
    /// Create a packet, copying `data` into the fixed buffer.
    pub fn new(header: u8, data_id: u8, data: &[u8]) -> Result<Self> {
        if data.len() > MAX_DATA_SIZE {
            return Err(FrameError::PacketTooLarge {
                size: data.len() + PACKET_HEADER_SIZE,
                max: MAX_PACKET_SIZE,
            });
        }
        let mut packet = Self::empty(header, data_id);
        packet.data[..data.len()].copy_from_slice(data);
        Ok(packet)
    }

    /// Packet with a zeroed data buffer.
    pub fn empty(header: u8, data_id: u8) -> Self {
        Self {
            header,
            data_id,
            data: [0u8; MAX_DATA_SIZE],
        }
    }

    /// Rebuild a packet from its wire form; missing bytes are zero.
    ///
    /// At most [`MAX_PACKET_SIZE`] bytes are taken from `wire`.
    pub fn from_wire(wire: &[u8]) -> Self {
        let wire = &wire[..wire.len().min(MAX_PACKET_SIZE)];
        let mut packet = Self::empty(0, 0);
        if let Some(&header) = wire.first() {
            packet.header = header;
        }
        if let Some(&data_id) = wire.get(1) {
            packet.data_id = data_id;
        }
        if wire.len() > PACKET_HEADER_SIZE {
            let data = &wire[PACKET_HEADER_SIZE..];
            packet.data[..data.len()].copy_from_slice(data);
        }
        packet
    }

    /// The packet's wire form: header, dataID, data.
    pub fn to_wire(&self) -> [u8; MAX_PACKET_SIZE] {
        let mut wire = [0u8; MAX_PACKET_SIZE];
        wire[0] = self.header;
        wire[1] = self.data_id;
        wire[PACKET_HEADER_SIZE..].copy_from_slice(&self.data);
        wire
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::empty(0, 0)
    }
}

/// Addressed envelope carried over either transport.
#[derive(Debug, Clone, Copy)]
pub struct Message {
    /// Sender identity.
    pub talker_id: u8,
    /// Destination: master, router-self, or a pipe id.
    pub receiver_id: u8,
    /// Embedded packet.
    pub packet: Packet,
    /// Significant packet bytes (header + dataID + data).
    pub packet_size: u8,
}

impl Message {
    /// Create a message; `packet_size` must not exceed [`MAX_PACKET_SIZE`].
    pub fn new(talker_id: u8, receiver_id: u8, packet: Packet, packet_size: u8) -> Result<Self> {
        check_packet_size(packet_size as usize)?;
        Ok(Self {
            talker_id,
            receiver_id,
            packet,
            packet_size,
        })
    }

    /// Create a message whose packet carries `data` after header and dataID.
    pub fn with_data(
        talker_id: u8,
        receiver_id: u8,
        header: u8,
        data_id: u8,
        data: &[u8],
    ) -> Result<Self> {
        let packet = Packet::new(header, data_id, data)?;
        // Packet::new bounds data to MAX_DATA_SIZE, so this fits in a u8.
        let packet_size = (data.len() + PACKET_HEADER_SIZE) as u8;
        Self::new(talker_id, receiver_id, packet, packet_size)
    }

    /// The significant data bytes.
    pub fn payload(&self) -> &[u8] {
        let len = (self.packet_size as usize)
            .saturating_sub(PACKET_HEADER_SIZE)
            .min(MAX_DATA_SIZE);
        &self.packet.data[..len]
    }

    /// Total serial frame size for this message.
    pub fn wire_size(&self) -> usize {
        self.packet_size as usize + FRAME_OVERHEAD
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        let size = (self.packet_size as usize).min(MAX_PACKET_SIZE);
        self.talker_id == other.talker_id
            && self.receiver_id == other.receiver_id
            && self.packet_size == other.packet_size
            && self.packet.to_wire()[..size] == other.packet.to_wire()[..size]
    }
}

impl Eq for Message {}

fn check_packet_size(size: usize) -> Result<()> {
    if size > MAX_PACKET_SIZE {
        return Err(FrameError::PacketTooLarge {
            size,
            max: MAX_PACKET_SIZE,
        });
    }
    Ok(())
}

/// Encode a message into the serial wire format.
///
/// Wire format:
/// ```text
/// ┌───────┬────────┬──────────┬──────┬────────┬────────┬──────────────┬─────┐
/// │ START │ talker │ receiver │ N    │ header │ dataID │ data (N-2 B) │ END │
/// │ '>'   │ (1B)   │ (1B)     │ (1B) │ (1B)   │ (1B)   │              │ \n  │
/// └───────┴────────┴──────────┴──────┴────────┴────────┴──────────────┴─────┘
/// ```
/// Exactly `N + 5` bytes are appended to `dst`.
pub fn encode_into(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    let size = msg.packet_size as usize;
    check_packet_size(size)?;

    dst.reserve(size + FRAME_OVERHEAD);
    dst.put_u8(START_BYTE);
    dst.put_u8(msg.talker_id);
    dst.put_u8(msg.receiver_id);
    dst.put_u8(msg.packet_size);
    dst.put_slice(&msg.packet.to_wire()[..size]);
    dst.put_u8(END_BYTE);
    Ok(())
}

/// Encode a message into a freshly allocated serial frame.
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(msg.wire_size());
    encode_into(msg, &mut buf)?;
    Ok(buf.to_vec())
}

/// Decode one serial frame from the front of `raw`.
///
/// Bytes after the frame are ignored.
pub fn decode(raw: &[u8]) -> Result<Message> {
    let Some(&first) = raw.first() else {
        return Err(FrameError::Truncated {
            expected: PREFIX_SIZE,
            actual: 0,
        });
    };
    if first != START_BYTE {
        return Err(FrameError::InvalidStart(first));
    }
    if raw.len() < PREFIX_SIZE {
        return Err(FrameError::Truncated {
            expected: PREFIX_SIZE,
            actual: raw.len(),
        });
    }

    let size = raw[3] as usize;
    check_packet_size(size)?;

    let total = size + FRAME_OVERHEAD;
    if raw.len() < total {
        return Err(FrameError::Truncated {
            expected: total,
            actual: raw.len(),
        });
    }

    let trailer = raw[total - 1];
    if trailer != END_BYTE {
        return Err(FrameError::InvalidTrailer(trailer));
    }

    Ok(Message {
        talker_id: raw[1],
        receiver_id: raw[2],
        packet: Packet::from_wire(&raw[PREFIX_SIZE..PREFIX_SIZE + size]),
        packet_size: raw[3],
    })
}

/// Decode a frame from a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. A bad start byte is
/// reported without consuming anything; the caller decides how to resync.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Message>> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };
    if first != START_BYTE {
        return Err(FrameError::InvalidStart(first));
    }
    if src.len() < PREFIX_SIZE {
        return Ok(None);
    }

    let size = src[3] as usize;
    check_packet_size(size)?;

    let total = size + FRAME_OVERHEAD;
    if src.len() < total {
        return Ok(None);
    }

    let msg = decode(&src[..total])?;
    src.advance(total);
    Ok(Some(msg))
}

/// Encode the first `size` packet bytes as a radio payload.
///
/// The radio's own addressing replaces the serial envelope, so only header,
/// dataID and data are sent.
pub fn encode_pipe_payload(packet: &Packet, size: usize) -> Result<Vec<u8>> {
    check_packet_size(size)?;
    Ok(packet.to_wire()[..size].to_vec())
}

/// Decode a radio payload into a packet and its size.
pub fn decode_pipe_payload(raw: &[u8]) -> Result<(Packet, u8)> {
    check_packet_size(raw.len())?;
    Ok((Packet::from_wire(raw), raw.len() as u8))
}

/// Configuration for the serial frame reader.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted packet size. Default: [`MAX_PACKET_SIZE`].
    pub max_packet_size: usize,
    /// Budget for each wait of the frame reader. Default: 100 ms.
    pub frame_timeout: Duration,
    /// Sleep quantum between polls. Default: 1 ms.
    pub poll_interval: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            frame_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
        }
    }
}

#[cfg(feature = "async")]
pub use self::tokio_codec::NtrpCodec;

#[cfg(feature = "async")]
mod tokio_codec {
    use bytes::{Buf, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};
    use tracing::debug;

    use super::{decode_frame, encode_into, Message, START_BYTE};
    use crate::error::FrameError;

    /// Tokio codec for NTRP serial frames.
    ///
    /// Leading bytes that are not a start marker are discarded.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NtrpCodec;

    impl NtrpCodec {
        pub fn new() -> Self {
            Self
        }
    }

    impl Decoder for NtrpCodec {
        type Item = Message;
        type Error = FrameError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, FrameError> {
            let skip = src
                .iter()
                .position(|&b| b == START_BYTE)
                .unwrap_or(src.len());
            if skip > 0 {
                debug!(skipped = skip, "discarding bytes before start marker");
                src.advance(skip);
            }
            decode_frame(src)
        }
    }

    impl Encoder<Message> for NtrpCodec {
        type Error = FrameError;

        fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), FrameError> {
            encode_into(&item, dst)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::header::{MASTER_ID, MSG};

        #[test]
        fn codec_skips_garbage_and_decodes() {
            let mut codec = NtrpCodec::new();
            let msg = Message::with_data(b'5', MASTER_ID, MSG, 2, b"hi").unwrap();

            let mut buf = BytesMut::from(&b"\x00\xff"[..]);
            codec.encode(msg, &mut buf).unwrap();

            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, msg);
            assert!(buf.is_empty());
        }

        #[test]
        fn codec_waits_for_complete_frame() {
            let mut codec = NtrpCodec::new();
            let msg = Message::with_data(b'5', MASTER_ID, MSG, 2, b"hi").unwrap();

            let mut wire = BytesMut::new();
            codec.encode(msg, &mut wire).unwrap();
            let mut partial = BytesMut::from(&wire[..5]);

            assert!(codec.decode(&mut partial).unwrap().is_none());
            partial.extend_from_slice(&wire[5..]);
            assert_eq!(codec.decode(&mut partial).unwrap(), Some(msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{MASTER_ID, MSG, OPENPIPE, ROUTER_ID};

    #[test]
    fn test_encode_decode_roundtrip() {
        let msg = Message::with_data(MASTER_ID, b'7', MSG, 5, b"hello").unwrap();

        let wire = encode(&msg).unwrap();
        assert_eq!(wire.len(), msg.packet_size as usize + FRAME_OVERHEAD);

        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.payload(), b"hello");
    }

    #[test]
    fn test_wire_layout() {
        let msg = Message::with_data(MASTER_ID, ROUTER_ID, OPENPIPE, b'9', &[1, 2]).unwrap();
        let wire = encode(&msg).unwrap();
        assert_eq!(
            wire,
            vec![START_BYTE, MASTER_ID, ROUTER_ID, 4, OPENPIPE, b'9', 1, 2, END_BYTE]
        );
    }

    #[test]
    fn test_encode_short_packet_sizes() {
        let packet = Packet::new(MSG, 3, b"abc").unwrap();

        let header_only = Message::new(MASTER_ID, b'7', packet, 1).unwrap();
        assert_eq!(
            encode(&header_only).unwrap(),
            vec![START_BYTE, MASTER_ID, b'7', 1, MSG, END_BYTE]
        );

        let empty = Message::new(MASTER_ID, b'7', packet, 0).unwrap();
        let wire = encode(&empty).unwrap();
        assert_eq!(wire, vec![START_BYTE, MASTER_ID, b'7', 0, END_BYTE]);
        assert_eq!(decode(&wire).unwrap(), empty);
    }

    #[test]
    fn test_decode_invalid_start() {
        let result = decode(&[0x00, MASTER_ID, ROUTER_ID, 0, END_BYTE]);
        assert!(matches!(result, Err(FrameError::InvalidStart(0x00))));
    }

    #[test]
    fn test_decode_packet_too_large() {
        let result = decode(&[START_BYTE, MASTER_ID, ROUTER_ID, 33]);
        assert!(matches!(
            result,
            Err(FrameError::PacketTooLarge { size: 33, max: 32 })
        ));
    }

    #[test]
    fn test_decode_truncated() {
        let msg = Message::with_data(MASTER_ID, b'7', MSG, 5, b"hello").unwrap();
        let wire = encode(&msg).unwrap();

        let result = decode(&wire[..wire.len() - 1]);
        assert!(matches!(
            result,
            Err(FrameError::Truncated {
                expected: 12,
                actual: 11
            })
        ));
        assert!(matches!(
            decode(&wire[..2]),
            Err(FrameError::Truncated { .. })
        ));
        assert!(matches!(decode(&[]), Err(FrameError::Truncated { .. })));
    }

    #[test]
    fn test_decode_invalid_trailer() {
        let msg = Message::with_data(MASTER_ID, b'7', MSG, 1, b"x").unwrap();
        let mut wire = encode(&msg).unwrap();
        let last = wire.len() - 1;
        wire[last] = 0xAA;
        assert!(matches!(decode(&wire), Err(FrameError::InvalidTrailer(0xAA))));
    }

    #[test]
    fn test_message_rejects_oversized_packet() {
        assert!(Message::new(MASTER_ID, b'7', Packet::default(), 33).is_err());
        assert!(Packet::new(MSG, 0, &[0u8; MAX_DATA_SIZE + 1]).is_err());
        assert!(Message::with_data(MASTER_ID, b'7', MSG, 0, &[0u8; MAX_DATA_SIZE]).is_ok());
    }

    #[test]
    fn test_encode_rejects_oversized_public_field() {
        let mut msg = Message::with_data(MASTER_ID, b'7', MSG, 0, b"").unwrap();
        msg.packet_size = 40;
        assert!(matches!(
            encode(&msg),
            Err(FrameError::PacketTooLarge { .. })
        ));
    }

    #[test]
    fn test_equality_ignores_bytes_past_packet_size() {
        let a = Message::new(MASTER_ID, b'7', Packet::new(MSG, 1, b"ab").unwrap(), 3).unwrap();
        let b = Message::new(MASTER_ID, b'7', Packet::new(MSG, 1, b"az").unwrap(), 3).unwrap();
        assert_eq!(a, b);

        let c = Message::new(MASTER_ID, b'7', Packet::new(MSG, 1, b"zb").unwrap(), 3).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_multiple_frames_in_stream() {
        let first = Message::with_data(MASTER_ID, b'7', MSG, 5, b"first").unwrap();
        let second = Message::with_data(b'7', MASTER_ID, MSG, 6, b"second").unwrap();

        let mut buf = BytesMut::new();
        encode_into(&first, &mut buf).unwrap();
        encode_into(&second, &mut buf).unwrap();

        assert_eq!(decode_frame(&mut buf).unwrap(), Some(first));
        assert_eq!(decode_frame(&mut buf).unwrap(), Some(second));
        assert_eq!(decode_frame(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_frame_incomplete() {
        let msg = Message::with_data(MASTER_ID, b'7', MSG, 5, b"hello").unwrap();
        let wire = encode(&msg).unwrap();

        let mut buf = BytesMut::from(&wire[..3]);
        assert_eq!(decode_frame(&mut buf).unwrap(), None);

        let mut buf = BytesMut::from(&wire[..wire.len() - 1]);
        assert_eq!(decode_frame(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), wire.len() - 1);
    }

    #[test]
    fn test_decode_frame_invalid_start_consumes_nothing() {
        let mut buf = BytesMut::from(&b"xyz"[..]);
        assert!(matches!(
            decode_frame(&mut buf),
            Err(FrameError::InvalidStart(b'x'))
        ));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_pipe_payload_omits_envelope() {
        let packet = Packet::new(MSG, 4, b"ping").unwrap();
        let payload = encode_pipe_payload(&packet, 6).unwrap();
        assert_eq!(payload, vec![MSG, 4, b'p', b'i', b'n', b'g']);

        let (decoded, size) = decode_pipe_payload(&payload).unwrap();
        assert_eq!(size, 6);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_pipe_payload_size_bounds() {
        let packet = Packet::default();
        assert!(encode_pipe_payload(&packet, MAX_PACKET_SIZE).is_ok());
        assert!(encode_pipe_payload(&packet, MAX_PACKET_SIZE + 1).is_err());
        assert!(decode_pipe_payload(&[0u8; MAX_PACKET_SIZE + 1]).is_err());
    }
}
