//! Blustream Matrix control
//!
//! Async TCP client for Blustream HDMI matrix switches. A [`Matrix`] keeps a
//! telnet-style connection open, tracks the matrix status (power, inputs,
//! outputs and routing) and notifies registered [`MatrixListener`]s about
//! changes.
//!
//! Only the part of the Blustream ASCII control protocol needed for power and
//! routing is implemented; see [`protocol`].

mod error;
pub mod listener;
mod matrix;
pub mod protocol;

pub use error::{MatrixError, ProtocolError};
pub use listener::{LoggingListener, MatrixEvent, MatrixListener, TurningOnListener};
pub use matrix::{Matrix, MatrixControl, MatrixStatus};
pub use protocol::{MatrixCommand, MatrixResponse, PowerState, ResponseParser};

/// Default telnet control port
pub const DEFAULT_PORT: u16 = 23;
