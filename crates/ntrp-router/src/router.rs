use ntrp_frame::{
    decode_pipe_payload, encode_pipe_payload, FrameError, Message, Packet, SerialLink,
    MASTER_ID, MAX_DATA_SIZE, MAX_PACKET_SIZE, MSG, ROUTER_ID,
};
use ntrp_transport::{Clock, Radio, SerialPort, SystemClock};
use tracing::{debug, info, warn};

use crate::command::{CommandOutcome, RouterCommand, OPENPIPE_MIN_SIZE};
use crate::error::Result;
use crate::handshake::{sync_with_config, HandshakeConfig, SyncOutcome};
use crate::pipe::{Pipe, PipeTable, PIPE_TABLE_CAPACITY};

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Number of pipe table slots.
    pub pipe_capacity: usize,
    /// Program channel and data rate when a pipe is opened.
    pub apply_rf_settings: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            pipe_capacity: PIPE_TABLE_CAPACITY,
            apply_rf_settings: false,
        }
    }
}

/// Where [`Router::route`] sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded to the host.
    Master,
    /// Executed as an administrative command.
    Command(CommandOutcome),
    /// Transmitted to `delivered` matching pipes.
    Pipe { delivered: usize },
    /// No pipe with this id; a diagnostic was sent instead.
    NoRoute { receiver: u8 },
}

/// Result of [`Router::open_pipe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened { slot: usize },
    TableFull,
}

/// Result of [`Router::debug`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugOutcome {
    Sent,
    /// Sent with the last `dropped` bytes cut off.
    Truncated { dropped: usize },
    /// Not sent: link not ready or write failed.
    Dropped,
}

/// Result of one poll step.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing arrived.
    Idle,
    /// A message was read and routed.
    Routed(RouteOutcome),
    /// Bad input was skipped; the next poll resynchronizes.
    Discarded(FrameError),
    /// A radio payload arrived on a slot with no open pipe.
    UnknownSlot(u8),
}

/// The message router: serial link to the host, radio, and pipe table.
pub struct Router<S, R, C = SystemClock> {
    link: SerialLink<S, C>,
    radio: R,
    pipes: PipeTable,
    config: RouterConfig,
}

impl<S: SerialPort, R: Radio, C: Clock> Router<S, R, C> {
    /// Create a router with default configuration and an empty pipe table.
    pub fn new(link: SerialLink<S, C>, radio: R) -> Self {
        Self::with_config(link, radio, RouterConfig::default())
    }

    /// Create a router with explicit configuration.
    pub fn with_config(link: SerialLink<S, C>, radio: R, config: RouterConfig) -> Self {
        Self {
            link,
            radio,
            pipes: PipeTable::new(config.pipe_capacity),
            config,
        }
    }

    /// Run the sync handshake on the serial link.
    pub fn sync(&mut self, config: &HandshakeConfig) -> Result<SyncOutcome> {
        sync_with_config(&mut self.link, config)
    }

    /// True once a sync handshake has paired with the host.
    pub fn is_ready(&self) -> bool {
        self.link.is_ready()
    }

    /// Read and route at most one message from the host.
    ///
    /// Framing errors are logged and reported as [`PollOutcome::Discarded`];
    /// only transport failures are returned as errors.
    pub fn poll(&mut self) -> Result<PollOutcome> {
        match self.link.read_message() {
            Ok(Some(msg)) => Ok(PollOutcome::Routed(self.route(&msg)?)),
            Ok(None) => Ok(PollOutcome::Idle),
            Err(err) if err.is_recoverable() => {
                if !matches!(err, FrameError::LinkNotReady) {
                    warn!(error = %err, "discarding serial input");
                }
                Ok(PollOutcome::Discarded(err))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Route at most one payload received by the radio.
    ///
    /// The sending pipe becomes the talker and the host the receiver.
    pub fn poll_radio(&mut self) -> Result<PollOutcome> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let Some((slot, len)) = self.radio.try_receive(&mut buf)? else {
            return Ok(PollOutcome::Idle);
        };
        let Some(pipe) = self.pipes.get(slot as usize).copied() else {
            warn!(slot, "radio payload on unopened slot");
            return Ok(PollOutcome::UnknownSlot(slot));
        };
        let (packet, packet_size) = match decode_pipe_payload(&buf[..len]) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(slot, error = %err, "discarding radio payload");
                return Ok(PollOutcome::Discarded(err));
            }
        };
        let msg = Message {
            talker_id: pipe.id,
            receiver_id: MASTER_ID,
            packet,
            packet_size,
        };
        Ok(PollOutcome::Routed(self.route(&msg)?))
    }

    /// Dispatch one message by receiver id.
    pub fn route(&mut self, msg: &Message) -> Result<RouteOutcome> {
        debug!(
            talker = msg.talker_id,
            receiver = msg.receiver_id,
            header = msg.packet.header,
            size = msg.packet_size,
            "routing message"
        );
        match msg.receiver_id {
            MASTER_ID => {
                self.transmit_master(msg)?;
                Ok(RouteOutcome::Master)
            }
            ROUTER_ID => Ok(RouteOutcome::Command(
                self.command(&msg.packet, msg.packet_size)?,
            )),
            receiver => {
                let delivered = self.transmit_pipe(receiver, &msg.packet, msg.packet_size)?;
                if delivered == 0 {
                    self.debug(&format!("NRF Pipe not found: {receiver}"));
                    return Ok(RouteOutcome::NoRoute { receiver });
                }
                Ok(RouteOutcome::Pipe { delivered })
            }
        }
    }

    /// Execute an administrative command.
    pub fn command(&mut self, packet: &Packet, packet_size: u8) -> Result<CommandOutcome> {
        let Some(command) = RouterCommand::from_header(packet.header) else {
            debug!(header = packet.header, "unrecognized router command");
            return Ok(CommandOutcome::Unrecognized(packet.header));
        };

        match command {
            RouterCommand::Msg => {
                self.debug("Message ACK");
                Ok(CommandOutcome::Acknowledged)
            }
            RouterCommand::OpenPipe => self.open_pipe_command(packet, packet_size),
            RouterCommand::ClosePipe | RouterCommand::Exit => {
                debug!(%command, "router command ignored");
                Ok(CommandOutcome::Ignored(command))
            }
        }
    }

    fn open_pipe_command(&mut self, packet: &Packet, packet_size: u8) -> Result<CommandOutcome> {
        let id = packet.data_id;
        if (packet_size as usize) < OPENPIPE_MIN_SIZE {
            warn!(size = packet_size, "OPENPIPE too short");
            return Ok(CommandOutcome::RejectedTooSmall { size: packet_size });
        }

        let pipe = match Pipe::from_open_command(packet) {
            Ok(pipe) => pipe,
            Err(err) => {
                warn!(id, error = %err, "OPENPIPE rejected");
                self.debug(&format!("NRF Pipe Error: {err}"));
                return Ok(CommandOutcome::InvalidPipe {
                    id,
                    channel: packet.data[0],
                    speed: packet.data[1],
                });
            }
        };

        match self.open_pipe(pipe)? {
            OpenOutcome::Opened { slot } => {
                self.debug(&format!("NRF Pipe Opened: {}", pipe.address_hex()));
                Ok(CommandOutcome::PipeOpened { slot, id })
            }
            OpenOutcome::TableFull => {
                self.debug(&format!("NRF Pipe Error: table full, {}", pipe.address_hex()));
                Ok(CommandOutcome::PipeTableFull { id })
            }
        }
    }

    /// Bind `pipe` to the next free receive slot and resume listening.
    ///
    /// Channel and data rate are programmed only when
    /// [`RouterConfig::apply_rf_settings`] is set. The table is unchanged
    /// if any radio call fails.
    pub fn open_pipe(&mut self, pipe: Pipe) -> Result<OpenOutcome> {
        if self.pipes.is_full() {
            warn!(id = pipe.id, capacity = self.pipes.capacity(), "pipe table full");
            return Ok(OpenOutcome::TableFull);
        }

        let slot = self.pipes.len();
        self.radio.set_receive_address(slot as u8, &pipe.address)?;
        if self.config.apply_rf_settings {
            self.radio.set_channel(pipe.channel)?;
            self.radio.set_data_rate(pipe.data_rate)?;
        }
        self.radio.begin_listening()?;

        let slot = self.pipes.insert(pipe).unwrap_or(slot);
        info!(slot, %pipe, "pipe opened");
        Ok(OpenOutcome::Opened { slot })
    }

    /// Remove every pipe with `id`; returns how many were removed.
    ///
    /// Remaining pipes are compacted and their receive slots reprogrammed,
    /// and freed tail slots are closed on the radio. The table only changes
    /// once the radio has accepted the new layout; on a radio error the
    /// old bindings are rewritten and the table is left as it was.
    pub fn close_pipe(&mut self, id: u8) -> Result<usize> {
        let Some(first) = self.pipes.iter().position(|pipe| pipe.id == id) else {
            debug!(id, "close_pipe: no such pipe");
            return Ok(0);
        };
        let old: Vec<Pipe> = self.pipes.iter().copied().collect();
        let kept: Vec<Pipe> = old.iter().filter(|pipe| pipe.id != id).copied().collect();

        if let Err(err) = self.bind_receive_slots(&kept, first, old.len()) {
            warn!(id, error = %err, "close_pipe: radio rejected new layout, restoring");
            if let Err(restore) = self.bind_receive_slots(&old, first, old.len()) {
                warn!(id, error = %restore, "close_pipe: restoring receive slots failed");
            }
            return Err(err);
        }

        let removed = self.pipes.remove(id);
        info!(id, removed = removed.len(), "pipe closed");
        Ok(removed.len())
    }

    /// Bind slots `from..` to `pipes`, close any slot up to `slots` left
    /// without a pipe, then listen.
    fn bind_receive_slots(&mut self, pipes: &[Pipe], from: usize, slots: usize) -> Result<()> {
        for (slot, pipe) in pipes.iter().enumerate().skip(from) {
            self.radio.set_receive_address(slot as u8, &pipe.address)?;
        }
        for slot in pipes.len()..slots {
            self.radio.close_receive_pipe(slot as u8)?;
        }
        self.radio.begin_listening()?;
        Ok(())
    }

    /// Forward a message to the host over the serial link.
    pub fn transmit_master(&mut self, msg: &Message) -> Result<()> {
        self.link.write_message(msg)?;
        Ok(())
    }

    /// Transmit the first `packet_size` bytes of `packet` to every pipe
    /// with `id`. Returns the number of pipes written.
    pub fn transmit_pipe(&mut self, id: u8, packet: &Packet, packet_size: u8) -> Result<usize> {
        let payload = encode_pipe_payload(packet, packet_size as usize)?;
        self.transmit_pipe_raw(id, &payload)
    }

    /// Transmit `payload` verbatim to every pipe with `id`.
    ///
    /// Each transmission stops listening, retargets the radio unless the
    /// previous write went to the same slot, writes, and listens again.
    pub fn transmit_pipe_raw(&mut self, id: u8, payload: &[u8]) -> Result<usize> {
        let slots = self.pipes.lookup(id);
        for &slot in &slots {
            self.transmit_slot(slot, payload)?;
        }
        if !slots.is_empty() {
            debug!(id, pipes = slots.len(), len = payload.len(), "pipe transmit");
        }
        Ok(slots.len())
    }

    fn transmit_slot(&mut self, slot: usize, payload: &[u8]) -> Result<()> {
        let Some(pipe) = self.pipes.get(slot).copied() else {
            return Ok(());
        };

        self.radio.stop_listening()?;
        if self.pipes.last_transmit() != Some(slot) {
            if let Err(err) = self.radio.set_transmit_address(&pipe.address) {
                self.pipes.invalidate_transmit();
                self.resume_listening();
                return Err(err.into());
            }
            self.pipes.set_last_transmit(slot);
        }
        if let Err(err) = self.radio.write(payload) {
            self.resume_listening();
            return Err(err.into());
        }
        self.radio.begin_listening()?;
        Ok(())
    }

    fn resume_listening(&mut self) {
        if let Err(err) = self.radio.begin_listening() {
            warn!(error = %err, "failed to resume listening");
        }
    }

    /// Send `text` to the host as a MSG from the router.
    ///
    /// Best effort: dropped when the link is not ready, truncated to the
    /// packet's data capacity.
    pub fn debug(&mut self, text: &str) -> DebugOutcome {
        if !self.link.is_ready() {
            debug!(text, "diagnostic dropped, link not ready");
            return DebugOutcome::Dropped;
        }

        let bytes = text.as_bytes();
        let len = bytes.len().min(MAX_DATA_SIZE);
        let msg = match Message::with_data(ROUTER_ID, MASTER_ID, MSG, len as u8, &bytes[..len]) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(error = %err, "failed to build diagnostic");
                return DebugOutcome::Dropped;
            }
        };

        if let Err(err) = self.link.write_message(&msg) {
            warn!(error = %err, "failed to send diagnostic");
            return DebugOutcome::Dropped;
        }
        match bytes.len() - len {
            0 => DebugOutcome::Sent,
            dropped => DebugOutcome::Truncated { dropped },
        }
    }

    /// Open pipes, in slot order.
    pub fn pipes(&self) -> &PipeTable {
        &self.pipes
    }

    /// Router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Borrow the serial link to the host.
    pub fn link(&self) -> &SerialLink<S, C> {
        &self.link
    }

    /// Mutably borrow the serial link to the host.
    pub fn link_mut(&mut self) -> &mut SerialLink<S, C> {
        &mut self.link
    }

    /// Borrow the radio.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutably borrow the radio.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Consume the router and return the link and radio.
    pub fn into_parts(self) -> (SerialLink<S, C>, R) {
        (self.link, self.radio)
    }
}

impl<S, R, C> std::fmt::Debug for Router<S, R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("pipes", &self.pipes)
            .field("config", &self.config)
            .finish()
    }
}
