use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ntrp_frame::header::is_reserved_id;
use ntrp_frame::{FrameConfig, SerialLink};
use ntrp_router::{
    HandshakeConfig, OpenOutcome, Pipe, PollOutcome, Router, RouterConfig, SyncOutcome,
};
use ntrp_transport::{DataRate, Radio, RadioAddress, SerialPort, SystemClock};
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{router_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_radio_payload, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let frame_timeout = parse_duration(&args.frame_timeout)?;
    let sync_timeout = parse_duration(&args.sync_timeout)?;
    check_startup_pipes(&args.pipes)?;

    let port = open_port(&args)?;
    let frame_config = FrameConfig {
        frame_timeout,
        ..FrameConfig::default()
    };
    let link = SerialLink::with_config(port, SystemClock::new(), frame_config);
    let config = RouterConfig {
        apply_rf_settings: args.apply_rf,
        ..RouterConfig::default()
    };
    let mut router = Router::with_config(link, ConsoleRadio::new(format), config);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let handshake = HandshakeConfig {
        timeout: sync_timeout,
        ..HandshakeConfig::default()
    };
    if !wait_for_sync(&mut router, &handshake, args.sync_attempts, &running)? {
        return Ok(SUCCESS);
    }

    for pipe in &args.pipes {
        match router
            .open_pipe(*pipe)
            .map_err(|err| router_error("open pipe failed", err))?
        {
            OpenOutcome::Opened { slot } => info!(slot, %pipe, "startup pipe opened"),
            OpenOutcome::TableFull => {
                return Err(CliError::new(
                    USAGE,
                    format!(
                        "too many --pipe options (capacity {})",
                        router.pipes().capacity()
                    ),
                ));
            }
        }
    }

    let mut routed = 0usize;
    while running.load(Ordering::SeqCst) {
        let serial = router
            .poll()
            .map_err(|err| router_error("serial poll failed", err))?;
        let radio = router
            .poll_radio()
            .map_err(|err| router_error("radio poll failed", err))?;

        for outcome in [serial, radio] {
            if let PollOutcome::Routed(route) = outcome {
                debug!(?route, "routed");
                routed = routed.saturating_add(1);
            }
        }

        if let Some(count) = args.count {
            if routed >= count {
                break;
            }
        }
    }

    info!(routed, "router stopped");
    Ok(SUCCESS)
}

/// Pipe ids must not shadow the master or router address; the router
/// itself does not check.
fn check_startup_pipes(pipes: &[Pipe]) -> CliResult<()> {
    match pipes.iter().find(|pipe| is_reserved_id(pipe.id)) {
        Some(pipe) => Err(CliError::new(
            USAGE,
            format!(
                "--pipe id {:?} is reserved for the master or router",
                pipe.id as char
            ),
        )),
        None => Ok(()),
    }
}

/// Repeat the handshake until paired. Returns false if stopped first.
fn wait_for_sync<S: SerialPort, R: Radio>(
    router: &mut Router<S, R, SystemClock>,
    handshake: &HandshakeConfig,
    max_attempts: Option<u32>,
    running: &AtomicBool,
) -> CliResult<bool> {
    let mut attempts = 0u32;
    while running.load(Ordering::SeqCst) {
        let outcome = router
            .sync(handshake)
            .map_err(|err| router_error("sync failed", err))?;
        if outcome == SyncOutcome::Paired {
            return Ok(true);
        }

        attempts = attempts.saturating_add(1);
        warn!(%outcome, attempts, "sync handshake failed, retrying");
        if let Some(max) = max_attempts {
            if attempts >= max {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("sync failed after {attempts} attempts: {outcome}"),
                ));
            }
        }
    }
    Ok(false)
}

#[cfg(unix)]
fn open_port(args: &RunArgs) -> CliResult<ntrp_transport::TtySerial> {
    ntrp_transport::TtySerial::open_with_baud(&args.device, args.baud).map_err(|err| {
        crate::exit::transport_error(&format!("open {}", args.device.display()), err)
    })
}

#[cfg(not(unix))]
fn open_port(args: &RunArgs) -> CliResult<ntrp_transport::StreamSerial<std::fs::File>> {
    Err(CliError::new(
        USAGE,
        format!(
            "cannot open {}: serial devices are only supported on Unix",
            args.device.display()
        ),
    ))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

/// Radio stand-in that prints every transmission to stdout.
///
/// No transceiver driver is bundled; pipe traffic is shown instead of sent.
struct ConsoleRadio {
    format: OutputFormat,
    target: Option<RadioAddress>,
    listening: bool,
}

impl ConsoleRadio {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            target: None,
            listening: false,
        }
    }
}

impl Radio for ConsoleRadio {
    fn set_receive_address(
        &mut self,
        slot: u8,
        address: &RadioAddress,
    ) -> ntrp_transport::Result<()> {
        debug!(slot, address = %hex::encode_upper(address), "receive address");
        Ok(())
    }

    fn close_receive_pipe(&mut self, slot: u8) -> ntrp_transport::Result<()> {
        debug!(slot, "receive slot closed");
        Ok(())
    }

    fn begin_listening(&mut self) -> ntrp_transport::Result<()> {
        self.listening = true;
        Ok(())
    }

    fn stop_listening(&mut self) -> ntrp_transport::Result<()> {
        self.listening = false;
        Ok(())
    }

    fn set_transmit_address(&mut self, address: &RadioAddress) -> ntrp_transport::Result<()> {
        self.target = Some(*address);
        Ok(())
    }

    fn write(&mut self, payload: &[u8]) -> ntrp_transport::Result<()> {
        if self.listening {
            return Err(ntrp_transport::TransportError::NotTransmitting);
        }
        print_radio_payload(self.target.as_ref(), payload, self.format);
        Ok(())
    }

    fn set_channel(&mut self, channel: u8) -> ntrp_transport::Result<()> {
        info!(channel, "radio channel");
        Ok(())
    }

    fn set_data_rate(&mut self, rate: DataRate) -> ntrp_transport::Result<()> {
        info!(%rate, "radio data rate");
        Ok(())
    }
}
