//! Matrix observers
//!
//! A [`Matrix`](crate::Matrix) notifies every registered [`MatrixListener`]
//! about connection changes, power changes and routing changes, in the order
//! they were registered.

use std::sync::Weak;

use tracing::{debug, info, warn};

use crate::matrix::MatrixControl;
use crate::protocol::PowerState;

/// Something that happened on a matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixEvent {
    /// The connection is up and the first status dump was read
    Connected,
    /// The peer closed the connection
    Disconnected,
    PowerChanged(PowerState),
    /// The matrix acknowledged a routing change, from us or another controller
    SourceChanged { output: u8, input: u8 },
    /// Current routing of an output, reported in a status dump
    OutputStatus { output: u8, input: u8 },
    /// We asked the matrix to change routing
    SourceChangeRequested { output: u8, input: u8 },
    /// The matrix reported an error
    Error(String),
}

/// Observer of matrix events
///
/// `notify` runs on the connection's reader task and must not block.
pub trait MatrixListener: Send + Sync {
    fn notify(&self, event: &MatrixEvent);

    /// Name of the listener type, for logs
    fn kind(&self) -> &'static str {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name)
    }
}

/// Logs every event
#[derive(Debug, Default)]
pub struct LoggingListener;

impl LoggingListener {
    pub fn new() -> Self {
        Self
    }
}

impl MatrixListener for LoggingListener {
    fn notify(&self, event: &MatrixEvent) {
        match event {
            MatrixEvent::Connected => info!("Matrix connected"),
            MatrixEvent::Disconnected => warn!("Matrix disconnected"),
            MatrixEvent::PowerChanged(power) => info!("Matrix power changed to {}", power),
            MatrixEvent::SourceChanged { output, input } => {
                info!("Output {} switched to input {}", output, input)
            }
            MatrixEvent::OutputStatus { output, input } => {
                debug!("Output {} is showing input {}", output, input)
            }
            MatrixEvent::SourceChangeRequested { output, input } => {
                debug!("Requested output {} to show input {}", output, input)
            }
            MatrixEvent::Error(message) => warn!("Matrix reported error: {}", message),
        }
    }
}

/// Powers the matrix on whenever a source change is acknowledged
///
/// The cached power state is not consulted: the matrix may have been switched
/// off from its front panel or by IR without the change being reported.
///
/// Holds a weak reference so the matrix can own this listener without a
/// reference cycle.
pub struct TurningOnListener {
    matrix: Weak<dyn MatrixControl>,
}

impl TurningOnListener {
    pub fn new(matrix: Weak<dyn MatrixControl>) -> Self {
        Self { matrix }
    }
}

impl MatrixListener for TurningOnListener {
    fn notify(&self, event: &MatrixEvent) {
        let MatrixEvent::SourceChanged { output, input } = event else {
            return;
        };
        let Some(matrix) = self.matrix.upgrade() else {
            return;
        };

        info!(
            "Source changed on output {} to input {}, turning matrix on",
            output, input
        );
        if let Err(e) = matrix.turn_on() {
            warn!("Failed to turn matrix on: {}", e);
        }
    }
}
