use std::fmt;
use std::time::Duration;

use ntrp_frame::SerialLink;
use ntrp_transport::{Clock, SerialPort};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Length of the sync and pair tokens.
pub const TOKEN_LEN: usize = 3;

/// Token the router repeats while waiting for the host.
pub const SYNC_TOKEN: [u8; TOKEN_LEN] = *b"-S-";

/// Token the host answers with.
pub const PAIR_TOKEN: [u8; TOKEN_LEN] = *b"-P-";

/// Shortest gap between sync tokens, whatever the configured interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Configuration for the sync handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Give up after this long without a reply.
    pub timeout: Duration,
    /// Delay between sync token repeats.
    pub poll_interval: Duration,
    /// Token sent to the host.
    pub sync_token: [u8; TOKEN_LEN],
    /// Reply expected from the host.
    pub pair_token: [u8; TOKEN_LEN],
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            sync_token: SYNC_TOKEN,
            pair_token: PAIR_TOKEN,
        }
    }
}

/// How a handshake attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The host answered with the pair token; the link is ready.
    Paired,
    /// Three bytes arrived but they were not the pair token.
    Mismatch([u8; TOKEN_LEN]),
    /// Nothing usable arrived before the timeout.
    TimedOut { waited: Duration },
}

impl SyncOutcome {
    pub fn is_paired(&self) -> bool {
        matches!(self, SyncOutcome::Paired)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Paired => f.write_str("paired"),
            SyncOutcome::Mismatch(got) => {
                write!(f, "pair token mismatch ({})", String::from_utf8_lossy(got))
            }
            SyncOutcome::TimedOut { waited } => write!(f, "timed out after {waited:?}"),
        }
    }
}

/// Run the sync handshake with default configuration.
pub fn sync<S: SerialPort, C: Clock>(link: &mut SerialLink<S, C>) -> Result<SyncOutcome> {
    sync_with_config(link, &HandshakeConfig::default())
}

/// Run the sync handshake.
///
/// Repeats the sync token until at least three bytes are waiting or the
/// timeout elapses, then reads exactly three bytes and compares them with
/// the pair token. Only a match marks the link ready; failures leave the
/// ready flag untouched, so the handshake can simply be retried. A timeout
/// consumes no input and is reported exactly at the configured budget.
pub fn sync_with_config<S: SerialPort, C: Clock>(
    link: &mut SerialLink<S, C>,
    config: &HandshakeConfig,
) -> Result<SyncOutcome> {
    let (port, clock) = link.parts_mut();
    let quantum = config.poll_interval.max(MIN_POLL_INTERVAL);

    let start = clock.now();
    loop {
        if port.available()? >= TOKEN_LEN {
            break;
        }
        let waited = clock.now().saturating_sub(start);
        if waited >= config.timeout {
            warn!(?waited, "sync handshake timed out");
            return Ok(SyncOutcome::TimedOut { waited });
        }
        port.send_sync_token(&config.sync_token)?;
        clock.sleep(quantum.min(config.timeout - waited));
    }

    let mut received = [0u8; TOKEN_LEN];
    for byte in received.iter_mut() {
        *byte = port.read_byte()?;
    }
    debug!(?received, "sync reply");

    if received != config.pair_token {
        warn!(?received, "sync handshake got unexpected pair token");
        return Ok(SyncOutcome::Mismatch(received));
    }

    link.mark_ready();
    info!("sync handshake complete");
    Ok(SyncOutcome::Paired)
}
