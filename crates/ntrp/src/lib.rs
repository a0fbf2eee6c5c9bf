//! NTRP: a message router between a host serial link and radio pipes.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial, radio and clock traits, Unix serial adapter,
//!   simulation kit
//! - [`frame`]: message model, serial framing, link-ready state
//! - [`router`]: sync handshake, pipe table and dispatch (behind `router`
//!   feature)

/// Re-export transport types.
pub mod transport {
    pub use ntrp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ntrp_frame::*;
}

/// Re-export router types (requires `router` feature).
#[cfg(feature = "router")]
pub mod router {
    pub use ntrp_router::*;
}
