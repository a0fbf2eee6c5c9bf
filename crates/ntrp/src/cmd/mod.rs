use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use ntrp_router::{parse_address, Pipe};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the router against a serial device.
    Run(RunArgs),
    /// Encode one message as a serial frame (or radio payload).
    Encode(EncodeArgs),
    /// Decode hex-encoded serial frames (or a radio payload).
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Serial device path (e.g. /dev/ttyUSB0).
    pub device: PathBuf,
    /// Serial baud rate.
    #[arg(long, default_value_t = 115_200, env = "NTRP_BAUD")]
    pub baud: u32,
    /// Time allowed for the rest of a frame once its start byte arrives (e.g. 100ms).
    #[arg(long, default_value = "100ms")]
    pub frame_timeout: String,
    /// Time allowed per sync handshake attempt (e.g. 5s).
    #[arg(long, default_value = "5s")]
    pub sync_timeout: String,
    /// Give up after this many failed handshakes. Default: retry until stopped.
    #[arg(long)]
    pub sync_attempts: Option<u32>,
    /// Pipe to open at startup, as ID:CHANNEL:RATE:ADDRESS (repeatable).
    #[arg(long = "pipe", value_name = "SPEC", value_parser = parse_pipe)]
    pub pipes: Vec<Pipe>,
    /// Program channel and data rate when pipes are opened.
    #[arg(long)]
    pub apply_rf: bool,
    /// Exit after routing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Talker address (single character or byte value).
    #[arg(long, default_value = "0", value_parser = parse_address_arg)]
    pub talker: u8,
    /// Receiver address (single character or byte value).
    #[arg(long, default_value = "1", value_parser = parse_address_arg)]
    pub receiver: u8,
    /// Header name (MSG, ACK, NAK, SET, LOG, CMD, OPENPIPE, CLOSEPIPE, EXIT) or byte value.
    #[arg(long, default_value = "MSG", value_parser = parse_header)]
    pub header: u8,
    /// dataID byte. Default: number of data bytes.
    #[arg(long)]
    pub data_id: Option<u8>,
    /// Text data.
    #[arg(long, conflicts_with_all = ["hex", "open_pipe"])]
    pub data: Option<String>,
    /// Hex data.
    #[arg(long, conflicts_with_all = ["data", "open_pipe"])]
    pub hex: Option<String>,
    /// Build an OPENPIPE command for ID:CHANNEL:RATE:ADDRESS.
    #[arg(long, value_name = "SPEC", value_parser = parse_pipe, conflicts_with_all = ["data", "hex", "header"])]
    pub open_pipe: Option<Pipe>,
    /// Emit the radio payload instead of a serial frame.
    #[arg(long)]
    pub radio: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes; whitespace is ignored. Read from stdin when omitted.
    pub hex: Option<String>,
    /// Input is a radio payload rather than serial frames.
    #[arg(long)]
    pub radio: bool,
    /// Talker address to report for a radio payload.
    #[arg(long, default_value = "0", value_parser = parse_address_arg)]
    pub talker: u8,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_pipe(input: &str) -> Result<Pipe, String> {
    input.parse().map_err(|err: ntrp_router::RouterError| err.to_string())
}

fn parse_address_arg(input: &str) -> Result<u8, String> {
    parse_address(input).ok_or_else(|| format!("invalid address: {input}"))
}

fn parse_header(input: &str) -> Result<u8, String> {
    use ntrp_frame::{ACK, CLOSEPIPE, CMD, EXIT, LOG, MSG, NAK, OPENPIPE, SET};

    let header = match input.to_ascii_uppercase().as_str() {
        "MSG" => MSG,
        "ACK" => ACK,
        "NAK" => NAK,
        "SET" => SET,
        "LOG" => LOG,
        "CMD" => CMD,
        "OPENPIPE" => OPENPIPE,
        "CLOSEPIPE" => CLOSEPIPE,
        "EXIT" => EXIT,
        _ => {
            return match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => input.parse(),
            }
            .map_err(|_| format!("invalid header: {input}"));
        }
    };
    Ok(header)
}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Decode hex text, ignoring whitespace.
pub(crate) fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|err| {
        CliError::new(crate::exit::DATA_INVALID, format!("invalid hex input: {err}"))
    })
}
