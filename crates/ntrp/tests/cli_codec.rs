#![cfg(feature = "cli")]

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn ntrp(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ntrp"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("ntrp should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn encode_msg_to_router() {
    let output = ntrp(&["--format", "pretty", "encode", "--data", "hi"]);
    assert!(output.status.success());
    // '>' '0' '1' N=4 MSG dataID=2 'h' 'i' '\n'
    assert_eq!(stdout(&output), "3E303104010268690A");
}

#[test]
fn encode_then_decode_round_trips() {
    let encoded = ntrp(&[
        "--format", "pretty", "encode", "--talker", "0", "--receiver", "A", "--header", "CMD",
        "--data-id", "7", "--data", "go",
    ]);
    assert!(encoded.status.success());
    let frame_hex = stdout(&encoded);

    let decoded = ntrp(&["--format", "json", "decode", &frame_hex]);
    assert!(decoded.status.success());
    let json: serde_json::Value =
        serde_json::from_str(&stdout(&decoded)).expect("decode emits JSON");
    assert_eq!(json["talker"], u64::from(b'0'));
    assert_eq!(json["receiver"], u64::from(b'A'));
    assert_eq!(json["header_name"], "CMD");
    assert_eq!(json["data_id"], 7);
    assert_eq!(json["packet_size"], 4);
    assert_eq!(json["data"], "go");
}

#[test]
fn encode_open_pipe_command() {
    let output = ntrp(&[
        "--format",
        "json",
        "encode",
        "--open-pipe",
        "A:76:2000:E7E7E7E7E701",
    ]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["frame_size"], 15);
    assert_eq!(json["frame_hex"], "3E30310A10414C02E7E7E7E7E7010A");
}

#[test]
fn encode_radio_payload_omits_envelope() {
    let output = ntrp(&[
        "--format", "pretty", "encode", "--receiver", "A", "--header", "LOG", "--hex", "FF00",
        "--radio",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "0502FF00");
}

#[test]
fn decode_reads_stdin() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ntrp"))
        .args(["--log-level", "error", "--format", "pretty", "decode"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("ntrp should start");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(b"3E 30 31 02 01 00 0A\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(stdout(&output), "serial MASTER -> ROUTER MSG id=0 size=2 data=");
}

#[test]
fn decode_bad_trailer_returns_60() {
    let output = ntrp(&["decode", "3E3031020100FF"]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("decode failed"));
}

#[test]
fn decode_oversized_packet_returns_60() {
    let output = ntrp(&["decode", "3E303121"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn run_missing_device_fails() {
    let output = ntrp(&[
        "run",
        "/dev/ntrp-does-not-exist",
        "--sync-attempts",
        "1",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("/dev/ntrp-does-not-exist"));
}

#[test]
fn bad_duration_is_usage_error() {
    let output = ntrp(&["run", "/dev/null", "--frame-timeout", "soon"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn reserved_pipe_id_is_usage_error() {
    let output = ntrp(&["run", "/dev/null", "--pipe", "0:76:1000:E7E7E7E7E701"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("reserved"));
}

#[test]
fn version_prints_name() {
    let output = ntrp(&["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("ntrp "));
}
