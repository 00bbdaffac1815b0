/*
    planetor - A live visualizer for the sounds playing on a remote audio engine.
    Copyright (C) 2022  Ryan Andersen

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Connection to the audio engine.
//!
//! A worker thread owns the socket, requests a snapshot every request
//! interval and hands everything it decodes to the event loop over a channel.

use std::io::{self, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use serde_json::Value;
use tungstenite::http::Uri;
use tungstenite::{Message, WebSocket};

use crate::protocol::{ClientMsg, ServerMsg, Snapshot};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);
const DEFAULT_WS_PORT: u16 = 80;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    pub endpoint: String,
    pub request_interval: Duration,
    /// Interactive clients own sounds on the engine and stop them on exit.
    pub interactive: bool,
    /// Upper bound on how long the worker blocks waiting for a frame.
    pub poll_timeout: Duration,
}
impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8765".to_owned(),
            request_interval: Duration::from_millis(100),
            interactive: false,
            poll_timeout: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint `{0}`: {1}")]
    InvalidEndpoint(String, String),
    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("websocket handshake failed: {0}")]
    Handshake(String),
    #[error("connection dropped: {0}")]
    Dropped(String),
    #[error("failed to send `{kind}`: {reason}")]
    Send { kind: &'static str, reason: String },
    #[error("connection closed by the engine")]
    ClosedByPeer,
}

#[derive(Debug)]
pub enum TransportEvent {
    Opened,
    Snapshot(Snapshot),
    DebugInfo(Value),
    Error(TransportError),
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

enum Command {
    Send(ClientMsg),
    Close,
}

pub struct TransportAdapter {
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<TransportEvent>,
    state: ConnectionState,
    worker: Option<JoinHandle<()>>,
}

impl TransportAdapter {
    /// Spawn the connection worker. Never fails; a connection that cannot be
    /// made is reported as an `Error` event followed by `Closed`.
    pub fn connect(config: &TransportConfig) -> Self {
        let (tx_cmd, rx_cmd) = unbounded();
        let (tx_evt, rx_evt) = unbounded();
        let config = config.clone();
        let worker = std::thread::Builder::new()
            .name("transport".to_owned())
            .spawn(move || run_worker(&config, &rx_cmd, &tx_evt));

        let (worker, state) = match worker {
            Ok(handle) => (Some(handle), ConnectionState::Connecting),
            Err(e) => {
                log::error!("Failed to spawn transport thread: {e}");
                (None, ConnectionState::Closed)
            }
        };
        Self {
            tx_cmd,
            rx_evt,
            state,
            worker,
        }
    }

    /// Drain every event the worker produced since the last call.
    pub fn poll(&mut self) -> Vec<TransportEvent> {
        let events: Vec<_> = self.rx_evt.try_iter().collect();
        for event in &events {
            match event {
                TransportEvent::Opened => self.state = ConnectionState::Open,
                TransportEvent::Closed => self.state = ConnectionState::Closed,
                _ => {}
            }
        }
        events
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Queue a command for the engine. Dropped unless the connection is open.
    pub fn send(&self, msg: ClientMsg) {
        if !self.is_open() {
            log::debug!("Connection not open, dropping {msg:?}");
            return;
        }
        if self.tx_cmd.send(Command::Send(msg)).is_err() {
            log::debug!("Transport thread gone, dropping command");
        }
    }

    /// Stop the worker, which also stops the request timer. An open session
    /// is joined so its goodbye reaches the engine; a worker still connecting
    /// is left to notice the request once its connect attempt returns.
    pub fn close(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // An error means the worker already exited
        let _ = self.tx_cmd.send(Command::Close);

        let unread = self.poll().len();
        if unread > 0 {
            log::debug!("Discarding {unread} transport events on close");
        }
        if self.state == ConnectionState::Connecting && !worker.is_finished() {
            log::debug!("Transport still connecting, not waiting for it");
        } else if worker.join().is_err() {
            log::error!("Transport thread panicked");
        }
        self.state = ConnectionState::Closed;
    }
}

impl Drop for TransportAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

fn kind_of(msg: &ClientMsg) -> &'static str {
    match msg {
        ClientMsg::GetAllPlayingSounds => "get_all_playing_sounds",
        ClientMsg::PlaySignalOscillator { .. } => "play_signal_oscillator",
        ClientMsg::StopAudio => "stop_audio",
        ClientMsg::StopAllAudio => "stop_all_audio",
    }
}

fn open_socket(config: &TransportConfig) -> Result<WebSocket<TcpStream>, TransportError> {
    let endpoint = config.endpoint.as_str();
    let invalid = |reason: &str| TransportError::InvalidEndpoint(endpoint.to_owned(), reason.into());

    let uri: Uri = endpoint.parse().map_err(|e| invalid(&format!("{e}")))?;
    match uri.scheme_str() {
        Some("ws") => {}
        Some(scheme) => return Err(invalid(&format!("unsupported scheme `{scheme}`"))),
        None => return Err(invalid("missing `ws://` scheme")),
    }
    let host = uri.host().ok_or_else(|| invalid("missing host"))?;
    let port = uri.port_u16().unwrap_or(DEFAULT_WS_PORT);

    let connect_err = |source| TransportError::Connect {
        endpoint: endpoint.to_owned(),
        source,
    };
    let mut last_err = io::Error::new(ErrorKind::NotFound, "host did not resolve");
    let mut stream = None;
    for addr in (host, port).to_socket_addrs().map_err(connect_err)? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(e) => last_err = e,
        }
    }
    let stream = stream.ok_or_else(|| connect_err(last_err))?;

    // Bound the handshake, then switch to short reads for the session loop
    stream
        .set_read_timeout(Some(CONNECT_TIMEOUT))
        .map_err(connect_err)?;
    let (socket, _) = tungstenite::client(endpoint, stream)
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    socket
        .get_ref()
        .set_read_timeout(Some(config.poll_timeout))
        .map_err(connect_err)?;
    Ok(socket)
}

fn is_idle(e: &tungstenite::Error) -> bool {
    matches!(e, tungstenite::Error::Io(io) if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut))
}

fn write(socket: &mut WebSocket<TcpStream>, msg: &ClientMsg) -> Result<(), TransportError> {
    let send_err = |reason: String| TransportError::Send {
        kind: kind_of(msg),
        reason,
    };
    let text = msg.to_json().map_err(|e| send_err(e.to_string()))?;
    socket
        .send(Message::text(text))
        .map_err(|e| send_err(e.to_string()))
}

enum Exit {
    Requested,
    Failed(TransportError),
}

fn session(
    socket: &mut WebSocket<TcpStream>,
    config: &TransportConfig,
    rx_cmd: &Receiver<Command>,
    tx_evt: &Sender<TransportEvent>,
) -> Exit {
    let mut next_request = Instant::now();
    loop {
        loop {
            match rx_cmd.try_recv() {
                Ok(Command::Send(msg)) => {
                    if let Err(e) = write(socket, &msg) {
                        return Exit::Failed(e);
                    }
                }
                Ok(Command::Close) | Err(TryRecvError::Disconnected) => return Exit::Requested,
                Err(TryRecvError::Empty) => break,
            }
        }

        if Instant::now() >= next_request {
            if let Err(e) = write(socket, &ClientMsg::GetAllPlayingSounds) {
                return Exit::Failed(e);
            }
            next_request = Instant::now() + config.request_interval;
        }

        let event = match socket.read() {
            Ok(Message::Text(text)) => match ServerMsg::parse(&text) {
                Ok(ServerMsg::ActiveSounds(snapshot)) => Some(TransportEvent::Snapshot(snapshot)),
                Ok(ServerMsg::DebugInfo(data)) => Some(TransportEvent::DebugInfo(data)),
                Ok(ServerMsg::Unknown(kind)) => {
                    log::debug!("Ignoring message of type `{kind}`");
                    None
                }
                Err(e) => {
                    log::debug!("Ignoring undecodable message: {e}");
                    None
                }
            },
            Ok(Message::Close(_)) | Err(tungstenite::Error::ConnectionClosed) => {
                return Exit::Failed(TransportError::ClosedByPeer)
            }
            Ok(_) => None,
            Err(e) if is_idle(&e) => None,
            Err(e) => return Exit::Failed(TransportError::Dropped(e.to_string())),
        };

        if let Some(event) = event {
            if tx_evt.send(event).is_err() {
                // Nobody is listening anymore
                return Exit::Requested;
            }
        }
    }
}

fn shutdown(socket: &mut WebSocket<TcpStream>, config: &TransportConfig) {
    if config.interactive {
        if let Err(e) = write(socket, &ClientMsg::StopAllAudio) {
            log::debug!("{e}");
        }
    }
    if socket.close(None).is_err() {
        return;
    }

    // Wait briefly for the engine to acknowledge the close
    let deadline = Instant::now() + CLOSE_TIMEOUT;
    while Instant::now() < deadline {
        match socket.read() {
            Ok(_) => {}
            Err(e) if is_idle(&e) => {}
            Err(_) => break,
        }
    }
}

fn run_worker(config: &TransportConfig, rx_cmd: &Receiver<Command>, tx_evt: &Sender<TransportEvent>) {
    let mut socket = match open_socket(config) {
        Ok(socket) => socket,
        Err(e) => {
            log::warn!("{e}");
            let _ = tx_evt.send(TransportEvent::Error(e));
            let _ = tx_evt.send(TransportEvent::Closed);
            return;
        }
    };
    log::info!("Connected to {}", config.endpoint);
    let _ = tx_evt.send(TransportEvent::Opened);

    match session(&mut socket, config, rx_cmd, tx_evt) {
        Exit::Requested => log::info!("Closing connection to {}", config.endpoint),
        Exit::Failed(e) => {
            log::warn!("{e}");
            let _ = tx_evt.send(TransportEvent::Error(e));
        }
    }
    shutdown(&mut socket, config);
    let _ = tx_evt.send(TransportEvent::Closed);
}
