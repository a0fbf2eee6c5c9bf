//! Transport abstraction for the NTRP router.
//!
//! The router talks to two collaborators:
//! - a byte-oriented serial link to the host computer ([`SerialPort`])
//! - a half-duplex packet radio ([`Radio`])
//!
//! This is the lowest layer of ntrp. It also provides the [`Clock`] used by
//! every bounded poll loop, a raw-mode Unix serial device adapter, and an
//! in-memory simulation kit.

pub mod clock;
pub mod error;
pub mod sim;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod tty;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, TransportError};
pub use stream::{StreamSerial, DEFAULT_WRITE_TIMEOUT};
pub use traits::{DataRate, Radio, RadioAddress, SerialPort, ADDRESS_LEN, MAX_CHANNEL};

#[cfg(unix)]
pub use tty::TtySerial;
