use std::io::Read;

use ntrp_frame::{decode, decode_pipe_payload, Message, MASTER_ID};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let text = match &args.hex {
        Some(text) => text.clone(),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|err| io_error("failed reading stdin", err))?;
            text
        }
    };
    let bytes = parse_hex(&text)?;
    if bytes.is_empty() {
        return Err(CliError::new(DATA_INVALID, "no input bytes"));
    }

    if args.radio {
        let (packet, packet_size) =
            decode_pipe_payload(&bytes).map_err(|err| frame_error("decode failed", err))?;
        let msg = Message {
            talker_id: args.talker,
            receiver_id: MASTER_ID,
            packet,
            packet_size,
        };
        print_message(&msg, "radio", format);
        return Ok(SUCCESS);
    }

    for msg in decode_frames(&bytes)? {
        print_message(&msg, "serial", format);
    }
    Ok(SUCCESS)
}

/// Decode back-to-back serial frames; every byte must belong to a frame.
fn decode_frames(mut bytes: &[u8]) -> CliResult<Vec<Message>> {
    let mut messages = Vec::new();
    while !bytes.is_empty() {
        let msg = decode(bytes).map_err(|err| {
            frame_error(&format!("decode failed at frame {}", messages.len()), err)
        })?;
        bytes = &bytes[msg.wire_size()..];
        messages.push(msg);
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use ntrp_frame::{encode, LOG, MSG, ROUTER_ID};

    use super::*;

    #[test]
    fn decodes_concatenated_frames() {
        let a = Message::with_data(MASTER_ID, ROUTER_ID, MSG, 2, b"hi").unwrap();
        let b = Message::with_data(b'A', MASTER_ID, LOG, 0, b"").unwrap();
        let mut bytes = encode(&a).unwrap();
        bytes.extend(encode(&b).unwrap());

        assert_eq!(decode_frames(&bytes).unwrap(), vec![a, b]);
    }

    #[test]
    fn trailing_garbage_is_invalid() {
        let a = Message::with_data(MASTER_ID, ROUTER_ID, MSG, 0, b"").unwrap();
        let mut bytes = encode(&a).unwrap();
        bytes.push(b'?');

        let err = decode_frames(&bytes).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("frame 1"));
    }
}
