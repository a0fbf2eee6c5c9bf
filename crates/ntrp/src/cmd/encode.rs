use ntrp_frame::{encode, encode_pipe_payload, Message};
use ntrp_router::open_pipe_message;

use crate::cmd::{parse_hex, EncodeArgs};
use crate::exit::{frame_error, router_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let msg = build_message(&args)?;

    let bytes = if args.radio {
        encode_pipe_payload(&msg.packet, msg.packet_size as usize)
    } else {
        encode(&msg)
    }
    .map_err(|err| frame_error("encode failed", err))?;

    print_frame(&bytes, format);
    Ok(SUCCESS)
}

fn build_message(args: &EncodeArgs) -> CliResult<Message> {
    if let Some(pipe) = &args.open_pipe {
        return open_pipe_message(args.talker, pipe)
            .map_err(|err| router_error("encode failed", err));
    }

    let data = match (&args.data, &args.hex) {
        (Some(text), _) => text.as_bytes().to_vec(),
        (None, Some(hex)) => parse_hex(hex)?,
        (None, None) => Vec::new(),
    };
    let data_id = args.data_id.unwrap_or(data.len().min(u8::MAX as usize) as u8);

    Message::with_data(args.talker, args.receiver, args.header, data_id, &data)
        .map_err(|err| frame_error("encode failed", err))
}
