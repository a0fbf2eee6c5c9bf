//! A whole router session driven over scripted serial input:
//! handshake, pipe setup, routing in both directions.

use std::time::Duration;

use ntrp_frame::{decode, encode, Message, SerialLink, CMD, LOG, MASTER_ID, ROUTER_ID};
use ntrp_router::{
    open_pipe_message, CommandOutcome, HandshakeConfig, Pipe, PollOutcome, RouteOutcome, Router,
    SyncOutcome, PAIR_TOKEN,
};
use ntrp_transport::sim::{RecordingRadio, ScriptedSerial};
use ntrp_transport::{Clock, ManualClock};

fn decode_all(mut bytes: &[u8]) -> Vec<Message> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let msg = decode(bytes).unwrap();
        bytes = &bytes[msg.wire_size()..];
        out.push(msg);
    }
    out
}

#[test]
fn host_session_end_to_end() {
    let clock = ManualClock::new();
    let pipe: Pipe = "65:76:1000:C2C2C2C2C201".parse().unwrap();
    let open = open_pipe_message(MASTER_ID, &pipe).unwrap();
    let order = Message::with_data(MASTER_ID, pipe.id, CMD, 1, b"start").unwrap();

    let mut input = encode(&open).unwrap();
    input.extend(encode(&order).unwrap());
    let port = ScriptedSerial::new(clock.clone())
        .with_input_at(Duration::from_millis(150), &PAIR_TOKEN)
        .with_input_at(Duration::from_millis(400), &input);

    let link = SerialLink::new(port, clock.clone());
    let mut router = Router::new(link, RecordingRadio::new());

    assert!(matches!(
        router.poll().unwrap(),
        PollOutcome::Discarded(_)
    ));
    assert_eq!(
        router.sync(&HandshakeConfig::default()).unwrap(),
        SyncOutcome::Paired
    );
    router.link_mut().port_mut().take_written();

    // Nothing until the host's frames arrive; each idle poll waits out one
    // frame timeout.
    assert!(matches!(router.poll().unwrap(), PollOutcome::Idle));
    assert!(clock.now() >= Duration::from_millis(300));
    clock.advance(Duration::from_millis(200));

    assert!(matches!(
        router.poll().unwrap(),
        PollOutcome::Routed(RouteOutcome::Command(CommandOutcome::PipeOpened {
            slot: 0,
            id: 65
        }))
    ));
    assert!(matches!(
        router.poll().unwrap(),
        PollOutcome::Routed(RouteOutcome::Pipe { delivered: 1 })
    ));
    assert_eq!(router.radio().writes(), vec![&[CMD, 1, b's', b't', b'a', b'r', b't'][..]]);
    assert_eq!(router.radio().transmit_addresses(), vec![pipe.address]);

    router.radio_mut().inject(0, &[LOG, 7, 42]);
    assert!(matches!(
        router.poll_radio().unwrap(),
        PollOutcome::Routed(RouteOutcome::Master)
    ));

    let written = router.link_mut().port_mut().take_written();
    let sent = decode_all(&written);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].talker_id, ROUTER_ID);
    assert!(String::from_utf8_lossy(sent[0].payload()).starts_with("NRF Pipe Opened"));
    assert_eq!(sent[1].talker_id, pipe.id);
    assert_eq!(sent[1].receiver_id, MASTER_ID);
    assert_eq!(sent[1].payload(), &[42]);
}
