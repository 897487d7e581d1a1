//! Matrix handle
//!
//! [`MatrixControl`] is the surface integrations program against; [`Matrix`]
//! implements it over a TCP connection. A connected `Matrix` runs two tasks:
//! a writer draining the command channel onto the socket and a reader feeding
//! the [`ResponseParser`], updating [`MatrixStatus`] and notifying listeners.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::MatrixError;
use crate::listener::{MatrixEvent, MatrixListener};
use crate::protocol::{MatrixCommand, MatrixResponse, PowerState, ResponseParser};

/// Everything known about a matrix from its status dumps and acknowledgements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixStatus {
    pub connected: bool,
    pub power: PowerState,
    pub firmware_version: Option<String>,
    pub mac: Option<String>,
    pub device_name: Option<String>,
    /// Input id -> name
    pub inputs: BTreeMap<u8, String>,
    /// Output id -> name
    pub outputs: BTreeMap<u8, String>,
    /// Output id -> input id currently routed to it
    pub routes: BTreeMap<u8, u8>,
}

impl MatrixStatus {
    /// Input names ordered by input id
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.values().cloned().collect()
    }

    pub fn input_name(&self, input: u8) -> Option<&str> {
        self.inputs.get(&input).map(String::as_str)
    }

    /// Look up an input id by its name
    pub fn input_id(&self, name: &str) -> Option<u8> {
        self.inputs
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&id, _)| id)
    }
}

/// Control surface of a matrix
#[async_trait]
pub trait MatrixControl: Send + Sync {
    fn hostname(&self) -> &str;

    fn port(&self) -> u16;

    /// Open the connection and read the first status dump
    async fn async_connect(&self) -> Result<(), MatrixError>;

    /// Drop the connection and all listeners. Safe to call more than once.
    fn close(&self);

    fn register_listener(&self, listener: Arc<dyn MatrixListener>);

    fn turn_on(&self) -> Result<(), MatrixError>;

    fn turn_off(&self) -> Result<(), MatrixError>;

    /// Route `input` to `output`
    fn change_source(&self, output: u8, input: u8) -> Result<(), MatrixError>;

    /// Ask the matrix for a fresh status dump
    fn update_status(&self) -> Result<(), MatrixError>;

    /// Snapshot of the current status
    fn status(&self) -> MatrixStatus;
}

/// State shared between the handle and its connection tasks
struct Shared {
    addr: String,
    status: RwLock<MatrixStatus>,
    listeners: RwLock<Vec<Arc<dyn MatrixListener>>>,
}

impl Shared {
    fn notify(&self, event: &MatrixEvent) {
        let listeners = self
            .listeners
            .read()
            .map(|l| l.clone())
            .unwrap_or_default();
        for listener in listeners {
            listener.notify(event);
        }
    }

    fn set_connected(&self, connected: bool) {
        if let Ok(mut status) = self.status.write() {
            status.connected = connected;
        }
    }

    /// Fold a response into the status, returning the event to publish
    fn apply(
        &self,
        response: MatrixResponse,
        ready: &watch::Sender<bool>,
    ) -> Option<MatrixEvent> {
        let Ok(mut status) = self.status.write() else {
            return None;
        };

        match response {
            MatrixResponse::FirmwareVersion(version) => {
                status.firmware_version = Some(version);
                None
            }
            MatrixResponse::MacAddress(mac) => {
                status.mac = Some(mac);
                None
            }
            MatrixResponse::Model(name) => {
                status.device_name = Some(name);
                None
            }
            MatrixResponse::SystemPower(power) | MatrixResponse::PowerChanged(power) => {
                status.power = power;
                Some(MatrixEvent::PowerChanged(power))
            }
            MatrixResponse::OutputRow {
                output,
                input,
                name,
            } => {
                status.outputs.insert(output, name);
                status.routes.insert(output, input);
                Some(MatrixEvent::OutputStatus { output, input })
            }
            MatrixResponse::InputRow { input, name } => {
                status.inputs.insert(input, name);
                None
            }
            MatrixResponse::StatusComplete => {
                debug!(
                    "Status from {}: {} inputs, {} outputs",
                    self.addr,
                    status.inputs.len(),
                    status.outputs.len()
                );
                ready.send_replace(true);
                None
            }
            MatrixResponse::SourceChanged { output, input } => {
                status.routes.insert(output, input);
                Some(MatrixEvent::SourceChanged { output, input })
            }
            MatrixResponse::Error(message) => Some(MatrixEvent::Error(message)),
        }
    }
}

/// Connection-bound parts of a [`Matrix`]
#[derive(Default)]
struct Connection {
    commands: Option<mpsc::UnboundedSender<MatrixCommand>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    fn shutdown(&mut self) {
        self.commands = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// A Blustream matrix reached over TCP
pub struct Matrix {
    hostname: String,
    port: u16,
    shared: Arc<Shared>,
    connection: Mutex<Connection>,
}

impl Matrix {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        let hostname = hostname.into();
        let addr = format!("{}:{}", hostname, port);
        Self {
            hostname,
            port,
            shared: Arc::new(Shared {
                addr,
                status: RwLock::new(MatrixStatus::default()),
                listeners: RwLock::new(Vec::new()),
            }),
            connection: Mutex::new(Connection::default()),
        }
    }

    fn send(&self, command: MatrixCommand) -> Result<(), MatrixError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| MatrixError::NotConnected)?;
        let sender = connection
            .commands
            .as_ref()
            .ok_or(MatrixError::NotConnected)?;
        debug!("Sending {} to {}", command, self.shared.addr);
        sender
            .send(command)
            .map_err(|_| MatrixError::NotConnected)
    }

    fn drop_connection(&self) {
        if let Ok(mut connection) = self.connection.lock() {
            connection.shutdown();
        }
    }
}

#[async_trait]
impl MatrixControl for Matrix {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn async_connect(&self) -> Result<(), MatrixError> {
        let addr = self.shared.addr.clone();
        info!("Connecting to matrix at {}", addr);

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| MatrixError::from_io(&addr, e))?;
        let (read_half, write_half) = stream.into_split();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, mut ready_rx) = watch::channel(false);

        let writer = tokio::spawn(write_loop(self.shared.clone(), write_half, command_rx));
        let reader = tokio::spawn(read_loop(self.shared.clone(), read_half, ready_tx));

        if let Ok(mut connection) = self.connection.lock() {
            connection.shutdown();
            connection.commands = Some(command_tx);
            connection.tasks = vec![writer, reader];
        }

        self.update_status()?;

        if ready_rx.wait_for(|ready| *ready).await.is_err() {
            self.drop_connection();
            return Err(MatrixError::ConnectionReset(addr));
        }

        self.shared.set_connected(true);
        info!("Connected to matrix at {}", addr);
        self.shared.notify(&MatrixEvent::Connected);
        Ok(())
    }

    fn close(&self) {
        self.drop_connection();
        if let Ok(mut listeners) = self.shared.listeners.write() {
            listeners.clear();
        }
        self.shared.set_connected(false);
        debug!("Closed matrix at {}", self.shared.addr);
    }

    fn register_listener(&self, listener: Arc<dyn MatrixListener>) {
        debug!("Registering {} on {}", listener.kind(), self.shared.addr);
        if let Ok(mut listeners) = self.shared.listeners.write() {
            listeners.push(listener);
        }
    }

    fn turn_on(&self) -> Result<(), MatrixError> {
        self.send(MatrixCommand::PowerOn)
    }

    fn turn_off(&self) -> Result<(), MatrixError> {
        self.send(MatrixCommand::PowerOff)
    }

    fn change_source(&self, output: u8, input: u8) -> Result<(), MatrixError> {
        self.send(MatrixCommand::ChangeSource { output, input })?;
        self.shared
            .notify(&MatrixEvent::SourceChangeRequested { output, input });
        Ok(())
    }

    fn update_status(&self) -> Result<(), MatrixError> {
        self.send(MatrixCommand::Status)
    }

    fn status(&self) -> MatrixStatus {
        self.shared
            .status
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl Drop for Matrix {
    fn drop(&mut self) {
        self.drop_connection();
    }
}

async fn write_loop(
    shared: Arc<Shared>,
    mut writer: OwnedWriteHalf,
    mut commands: mpsc::UnboundedReceiver<MatrixCommand>,
) {
    while let Some(command) = commands.recv().await {
        if let Err(e) = writer.write_all(&command.encode()).await {
            warn!("Failed to write {} to {}: {}", command, shared.addr, e);
            break;
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: OwnedReadHalf, ready: watch::Sender<bool>) {
    let mut parser = ResponseParser::new();
    let mut buf = vec![0u8; 1024];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                warn!("Matrix at {} closed the connection", shared.addr);
                break;
            }
            Ok(n) => {
                parser.push_bytes(&buf[..n]);
                while let Some(response) = parser.next_response() {
                    match response {
                        Ok(response) => {
                            if let Some(event) = shared.apply(response, &ready) {
                                shared.notify(&event);
                            }
                        }
                        Err(e) => debug!("Skipping line from {}: {}", shared.addr, e),
                    }
                }
            }
            Err(e) => {
                warn!("Read from {} failed: {}", shared.addr, e);
                break;
            }
        }
    }

    shared.set_connected(false);
    shared.notify(&MatrixEvent::Disconnected);
}
