//! NTRP message routing between the host serial link and radio pipes.
//!
//! A [`Router`] owns the serial link, the radio and the pipe table. After a
//! sync handshake it reads framed messages from the host and dispatches
//! them by receiver id: to the host, to the router itself as an
//! administrative command, or to every radio pipe with that id.

pub mod command;
pub mod error;
pub mod handshake;
pub mod pipe;
pub mod router;

pub use command::{
    close_pipe_message, exit_message, open_pipe_message, CommandOutcome, RouterCommand,
    OPENPIPE_MIN_SIZE,
};
pub use error::{Result, RouterError};
pub use handshake::{
    sync, sync_with_config, HandshakeConfig, SyncOutcome, PAIR_TOKEN, SYNC_TOKEN, TOKEN_LEN,
};
pub use pipe::{parse_address, Pipe, PipeTable, PIPE_TABLE_CAPACITY};
pub use router::{DebugOutcome, OpenOutcome, PollOutcome, RouteOutcome, Router, RouterConfig};
