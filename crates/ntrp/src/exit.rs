use std::fmt;
use std::io;

use ntrp_frame::FrameError;
use ntrp_router::RouterError;
use ntrp_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. }
        | TransportError::Configure { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        TransportError::WriteTimeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::Io(source) => io_error(context, source),
        FrameError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::InvalidStart(_)
        | FrameError::PacketTooLarge { .. }
        | FrameError::Truncated { .. }
        | FrameError::InvalidTrailer(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::LinkNotReady => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn router_error(context: &str, err: RouterError) -> CliError {
    match err {
        RouterError::Transport(err) => transport_error(context, err),
        RouterError::Frame(err) => frame_error(context, err),
        RouterError::InvalidChannel { .. }
        | RouterError::InvalidSpeed(_)
        | RouterError::InvalidPipeSpec(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ntrp_frame::ReadStage;

    use super::*;

    #[test]
    fn frame_errors_map_to_exit_codes() {
        let timeout = FrameError::Timeout {
            stage: ReadStage::Payload,
            waited: Duration::from_millis(100),
        };
        assert_eq!(frame_error("read", timeout).code, TIMEOUT);
        assert_eq!(
            frame_error("decode", FrameError::InvalidTrailer(b'x')).code,
            DATA_INVALID
        );
        assert_eq!(frame_error("read", FrameError::LinkNotReady).code, FAILURE);
    }

    #[test]
    fn router_errors_delegate() {
        let err = RouterError::Transport(TransportError::NotTransmitting);
        assert_eq!(router_error("route", err).code, TRANSPORT_ERROR);
        let hangup = RouterError::Frame(FrameError::Transport(TransportError::Closed));
        assert_eq!(router_error("serial poll failed", hangup).code, TRANSPORT_ERROR);
        let stalled = TransportError::WriteTimeout {
            written: 3,
            waited: Duration::from_secs(1),
        };
        assert_eq!(transport_error("write", stalled).code, TIMEOUT);
        assert_eq!(
            router_error("pipe", RouterError::InvalidSpeed(7)).code,
            USAGE
        );
    }

    #[test]
    fn io_errors_keep_context() {
        let err = io_error(
            "open /dev/ttyUSB9",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
        assert!(err.message.starts_with("open /dev/ttyUSB9"));
    }
}
