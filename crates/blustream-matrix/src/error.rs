//! Error types for matrix control

use std::io::{self, ErrorKind};

use thiserror::Error;

/// Errors that can occur talking to a matrix
#[derive(Debug, Error)]
pub enum MatrixError {
    /// The matrix refused the TCP connection
    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    /// Connecting did not finish in time
    #[error("timed out connecting to {0}")]
    TimedOut(String),

    /// The matrix reset or closed the connection
    #[error("connection reset by {0}")]
    ConnectionReset(String),

    /// A command was issued without an open connection
    #[error("not connected")]
    NotConnected,

    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors decoding lines received from a matrix
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed {section} row: {line:?}")]
    MalformedRow { section: &'static str, line: String },
}

impl MatrixError {
    /// Classify an I/O error raised while talking to `addr`
    pub fn from_io(addr: &str, err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::ConnectionRefused => MatrixError::ConnectionRefused(addr.to_string()),
            ErrorKind::TimedOut => MatrixError::TimedOut(addr.to_string()),
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof => MatrixError::ConnectionReset(addr.to_string()),
            _ => MatrixError::Io(err),
        }
    }

    /// Refused, timed out or reset: the matrix is unreachable right now and
    /// trying again later may succeed
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            MatrixError::ConnectionRefused(_)
                | MatrixError::TimedOut(_)
                | MatrixError::ConnectionReset(_)
        )
    }
}
