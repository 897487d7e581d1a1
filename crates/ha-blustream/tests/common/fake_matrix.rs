//! Scripted stand-in for a matrix handle

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use blustream_matrix::{
    MatrixControl, MatrixError, MatrixEvent, MatrixListener, MatrixStatus, PowerState,
};
use ha_blustream::MatrixFactory;

/// Shared, ordered record of calls across fakes
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal_entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// How `async_connect` behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Succeed,
    Refused,
    TimedOut,
    Reset,
    /// Never completes; only the caller's timeout ends it
    Hang,
    /// An unexpected I/O failure
    Fail,
}

/// Status a freshly connected fake reports
pub fn sample_status() -> MatrixStatus {
    MatrixStatus {
        connected: false,
        power: PowerState::On,
        firmware_version: Some("1.10".to_string()),
        mac: Some("00:1A:2B:3C:4D:5E".to_string()),
        device_name: Some("CMX44AB".to_string()),
        inputs: BTreeMap::from([(1, "AppleTV".to_string()), (2, "Sky".to_string())]),
        outputs: BTreeMap::from([(1, "Lounge".to_string()), (2, "Kitchen".to_string())]),
        routes: BTreeMap::from([(1, 2), (2, 1)]),
    }
}

pub struct FakeMatrix {
    host: String,
    port: u16,
    outcome: ConnectOutcome,
    journal: Journal,
    status: RwLock<MatrixStatus>,
    listeners: RwLock<Vec<Arc<dyn MatrixListener>>>,
    kinds_at_connect: Mutex<Vec<&'static str>>,
    commands: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakeMatrix {
    pub fn new(host: &str, port: u16, outcome: ConnectOutcome, journal: Journal) -> Self {
        Self {
            host: host.to_string(),
            port,
            outcome,
            journal,
            status: RwLock::new(sample_status()),
            listeners: RwLock::new(Vec::new()),
            kinds_at_connect: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn record(&self, command: String) {
        self.commands.lock().unwrap().push(command);
    }

    /// Deliver an event to every registered listener
    pub fn emit(&self, event: MatrixEvent) {
        let listeners = self.listeners.read().unwrap().clone();
        for listener in listeners {
            listener.notify(&event);
        }
    }

    pub fn set_status(&self, status: MatrixStatus) {
        *self.status.write().unwrap() = status;
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap().len()
    }

    /// Kinds of the listeners registered when `async_connect` was called
    pub fn listener_kinds_at_connect(&self) -> Vec<&'static str> {
        self.kinds_at_connect.lock().unwrap().clone()
    }
}

#[async_trait]
impl MatrixControl for FakeMatrix {
    fn hostname(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn async_connect(&self) -> Result<(), MatrixError> {
        let kinds = self
            .listeners
            .read()
            .unwrap()
            .iter()
            .map(|l| l.kind())
            .collect();
        *self.kinds_at_connect.lock().unwrap() = kinds;

        match self.outcome {
            ConnectOutcome::Succeed => {
                self.status.write().unwrap().connected = true;
                self.emit(MatrixEvent::Connected);
                Ok(())
            }
            ConnectOutcome::Refused => Err(MatrixError::ConnectionRefused(self.addr())),
            ConnectOutcome::TimedOut => Err(MatrixError::TimedOut(self.addr())),
            ConnectOutcome::Reset => Err(MatrixError::ConnectionReset(self.addr())),
            ConnectOutcome::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            ConnectOutcome::Fail => Err(MatrixError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "garbled greeting",
            ))),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listeners.write().unwrap().clear();
        self.status.write().unwrap().connected = false;
        self.journal.lock().unwrap().push(format!("close {}", self.host));
    }

    fn register_listener(&self, listener: Arc<dyn MatrixListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    fn turn_on(&self) -> Result<(), MatrixError> {
        self.record("PON".to_string());
        Ok(())
    }

    fn turn_off(&self) -> Result<(), MatrixError> {
        self.record("POFF".to_string());
        Ok(())
    }

    fn change_source(&self, output: u8, input: u8) -> Result<(), MatrixError> {
        self.record(format!("OUT{:02}FR{:02}", output, input));
        self.emit(MatrixEvent::SourceChangeRequested { output, input });
        Ok(())
    }

    fn update_status(&self) -> Result<(), MatrixError> {
        self.record("STATUS".to_string());
        Ok(())
    }

    fn status(&self) -> MatrixStatus {
        self.status.read().unwrap().clone()
    }
}

/// Hands out [`FakeMatrix`] handles and keeps them for inspection
pub struct FakeFactory {
    outcome: Mutex<ConnectOutcome>,
    journal: Journal,
    created: Mutex<Vec<Arc<FakeMatrix>>>,
}

impl FakeFactory {
    pub fn new(outcome: ConnectOutcome) -> Arc<Self> {
        Self::with_journal(outcome, Journal::default())
    }

    pub fn with_journal(outcome: ConnectOutcome, journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            journal,
            created: Mutex::new(Vec::new()),
        })
    }

    /// Change how handles created from now on connect
    pub fn set_outcome(&self, outcome: ConnectOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn created(&self) -> Vec<Arc<FakeMatrix>> {
        self.created.lock().unwrap().clone()
    }

    /// The most recently created handle
    pub fn last(&self) -> Arc<FakeMatrix> {
        self.created
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no matrix created")
    }
}

impl MatrixFactory for FakeFactory {
    fn create(&self, host: &str, port: u16) -> Arc<dyn MatrixControl> {
        let outcome = *self.outcome.lock().unwrap();
        let matrix = Arc::new(FakeMatrix::new(host, port, outcome, self.journal.clone()));
        self.created.lock().unwrap().push(matrix.clone());
        matrix
    }
}
