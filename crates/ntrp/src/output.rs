use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ntrp_frame::header::{address_name, header_name};
use ntrp_frame::{Message, Packet, PACKET_HEADER_SIZE};
use ntrp_transport::RadioAddress;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    direction: &'a str,
    talker: u8,
    talker_name: &'static str,
    receiver: u8,
    receiver_name: &'static str,
    header: u8,
    header_name: &'static str,
    data_id: u8,
    packet_size: u8,
    data: String,
    data_hex: String,
}

impl<'a> MessageOutput<'a> {
    fn new(msg: &Message, direction: &'a str) -> Self {
        Self {
            direction,
            talker: msg.talker_id,
            talker_name: address_name(msg.talker_id),
            receiver: msg.receiver_id,
            receiver_name: address_name(msg.receiver_id),
            header: msg.packet.header,
            header_name: header_name(msg.packet.header),
            data_id: msg.packet.data_id,
            packet_size: msg.packet_size,
            data: data_preview(msg.payload()),
            data_hex: hex::encode_upper(msg.payload()),
        }
    }
}

/// Print one message. `direction` says where it was seen, e.g. `decoded`.
pub fn print_message(msg: &Message, direction: &str, format: OutputFormat) {
    let out = MessageOutput::new(msg, direction);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DIR", "FROM", "TO", "HEADER", "ID", "SIZE", "DATA"])
                .add_row(vec![
                    out.direction.to_string(),
                    address_label(out.talker),
                    address_label(out.receiver),
                    out.header_name.to_string(),
                    out.data_id.to_string(),
                    out.packet_size.to_string(),
                    out.data.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} {} -> {} {} id={} size={} data={}",
                out.direction,
                address_label(out.talker),
                address_label(out.receiver),
                out.header_name,
                out.data_id,
                out.packet_size,
                out.data
            );
        }
        OutputFormat::Raw => {
            println!("{}", out.data_hex);
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    frame_hex: String,
    frame_size: usize,
}

/// Print an encoded serial frame.
pub fn print_frame(frame: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                frame_hex: hex::encode_upper(frame),
                frame_size: frame.len(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{}", hex::encode_upper(frame));
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

#[derive(Serialize)]
struct RadioOutput {
    direction: &'static str,
    address: Option<String>,
    header: u8,
    header_name: &'static str,
    data_id: u8,
    packet_size: usize,
    data: String,
    payload_hex: String,
}

/// Print a payload handed to the radio for transmission.
pub fn print_radio_payload(address: Option<&RadioAddress>, payload: &[u8], format: OutputFormat) {
    let packet = Packet::from_wire(payload);
    let data = payload.get(PACKET_HEADER_SIZE..).unwrap_or_default();
    let out = RadioOutput {
        direction: "radio-tx",
        address: address.map(hex::encode_upper),
        header: packet.header,
        header_name: header_name(packet.header),
        data_id: packet.data_id,
        packet_size: payload.len(),
        data: data_preview(data),
        payload_hex: hex::encode_upper(payload),
    };
    let address = out.address.as_deref().unwrap_or("-");

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DIR", "ADDRESS", "HEADER", "ID", "SIZE", "DATA"])
                .add_row(vec![
                    out.direction.to_string(),
                    address.to_string(),
                    out.header_name.to_string(),
                    out.data_id.to_string(),
                    out.packet_size.to_string(),
                    out.data.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} {} {} id={} size={} data={}",
                out.direction, address, out.header_name, out.data_id, out.packet_size, out.data
            );
        }
        OutputFormat::Raw => {
            println!("{} {}", address, out.payload_hex);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// `MASTER`, `ROUTER`, or the pipe id as a character when printable.
pub fn address_label(id: u8) -> String {
    match address_name(id) {
        "PIPE" if id.is_ascii_graphic() => format!("PIPE({})", id as char),
        "PIPE" => format!("PIPE(0x{id:02X})"),
        name => name.to_string(),
    }
}

fn data_preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("<binary {} bytes>", data.len()),
    }
}

#[cfg(test)]
mod tests {
    use ntrp_frame::{LOG, MASTER_ID, ROUTER_ID};

    use super::*;

    #[test]
    fn labels() {
        assert_eq!(address_label(MASTER_ID), "MASTER");
        assert_eq!(address_label(ROUTER_ID), "ROUTER");
        assert_eq!(address_label(b'A'), "PIPE(A)");
        assert_eq!(address_label(0x05), "PIPE(0x05)");
    }

    #[test]
    fn message_output_fields() {
        let msg = Message::with_data(b'A', MASTER_ID, LOG, 2, &[0xFF, 0x01]).unwrap();
        let out = MessageOutput::new(&msg, "radio");
        assert_eq!(out.header_name, "LOG");
        assert_eq!(out.receiver_name, "MASTER");
        assert_eq!(out.data, "<binary 2 bytes>");
        assert_eq!(out.data_hex, "FF01");
    }
}
