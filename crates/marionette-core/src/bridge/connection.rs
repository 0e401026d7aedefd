//! Bridge connection lifecycle and request/response exchange.
//!
//! A dedicated I/O thread owns the open port. It serializes outbound
//! command/response exchanges (one in flight at a time) while draining
//! unsolicited device notifications off the same byte stream,
//! demultiplexed by frame tag. Disconnection cancels the in-flight
//! request and settles the state; reconnection is caller-driven.

use crate::{
    CoreError, CoreResult,
    bridge::{
        frame::{FrameDecoder, InboundFrame, OutboundFrame, PROTOCOL_VERSION},
        transport::{SerialIo, SerialTransport},
    },
};

use std::{
    io,
    panic::Location,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};

/// How long the bridge waits for a command acknowledgment before retrying
/// (once) and then surfacing an actuator error.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Device-notification queue depth.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Connection lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No port open.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Link established.
    Connected {
        /// Port name the handshake succeeded on.
        port: String,
    },
    /// The link failed; the reason is preserved until the next connect.
    Error {
        /// What broke the link.
        reason: String,
    },
}

struct BridgeRequest {
    frame: OutboundFrame,
    responder: oneshot::Sender<CoreResult<()>>,
}

/// Connection to the serial hardware actuator.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct BridgeConnection {
    transport: Arc<dyn SerialTransport>,
    baud: u32,
    response_timeout: Duration,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    request_tx: Mutex<Option<mpsc::Sender<BridgeRequest>>>,
    event_tx: mpsc::Sender<InboundFrame>,
    event_rx: Mutex<Option<mpsc::Receiver<InboundFrame>>>,
}

impl BridgeConnection {
    /// Create a disconnected bridge over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn SerialTransport>, baud: u32, response_timeout: Duration) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        Self {
            transport,
            baud,
            response_timeout,
            state_tx,
            state_rx,
            request_tx: Mutex::new(None),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Watch connection state transitions.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// The current connection state.
    #[must_use]
    pub fn current_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Take the unsolicited device-notification stream.
    ///
    /// Returns `None` after the first call; there is one consumer.
    #[must_use]
    pub fn take_device_events(&self) -> Option<mpsc::Receiver<InboundFrame>> {
        self.event_rx.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Open `port`, handshake, and start the I/O thread.
    ///
    /// An existing connection is torn down first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transport`] if the port cannot be opened or
    /// the device does not answer the handshake probe.
    #[instrument(skip(self))]
    pub fn connect(&self, port: &str) -> CoreResult<()> {
        self.disconnect();
        let _ = self.state_tx.send(ConnectionState::Connecting);

        let mut io = match self.transport.open(port, self.baud) {
            Ok(io) => io,
            Err(error) => {
                let _ = self.state_tx.send(ConnectionState::Error {
                    reason: error.to_string(),
                });
                return Err(error);
            }
        };

        let mut decoder = FrameDecoder::new();
        if let Err(error) = probe(io.as_mut(), &mut decoder, self.response_timeout) {
            let _ = self.state_tx.send(ConnectionState::Disconnected);
            return Err(error);
        }

        let (request_tx, request_rx) = mpsc::channel(1);
        if let Ok(mut guard) = self.request_tx.lock() {
            *guard = Some(request_tx);
        }

        let worker = IoWorker {
            decoder,
            request_rx,
            event_tx: self.event_tx.clone(),
            state_tx: self.state_tx.clone(),
            response_timeout: self.response_timeout,
        };
        std::thread::spawn(move || worker.run(io));

        let _ = self.state_tx.send(ConnectionState::Connected {
            port: port.to_string(),
        });
        info!(port, "Hardware bridge connected");
        Ok(())
    }

    /// Scan available ports and handshake against each until one answers.
    ///
    /// Returns the connected port name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transport`] when no port answers a valid
    /// status response.
    #[instrument(skip(self))]
    pub fn auto_connect(&self) -> CoreResult<String> {
        let ports = self.transport.list_ports()?;
        debug!(?ports, "Auto-connect scanning");

        for port in ports {
            match self.connect(&port) {
                Ok(()) => return Ok(port),
                Err(error) => {
                    debug!(port, error = %error, "Port did not answer handshake");
                }
            }
        }

        let _ = self.state_tx.send(ConnectionState::Disconnected);
        Err(CoreError::Transport {
            reason: "no hardware actuator answered on any serial port".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Tear down the connection. Safe to call in any state.
    pub fn disconnect(&self) {
        let had_connection = self
            .request_tx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
            .is_some();
        if had_connection {
            // Dropping the sender stops the I/O thread at its next poll.
            let _ = self.state_tx.send(ConnectionState::Disconnected);
            info!("Hardware bridge disconnected");
        }
    }

    /// Send one command and block until its acknowledgment.
    ///
    /// Called from blocking contexts only (the engine's `spawn_blocking`
    /// dispatch); exchanges are serialized by the I/O thread.
    ///
    /// # Errors
    ///
    /// [`CoreError::Transport`] when disconnected mid-exchange,
    /// [`CoreError::ActuatorDispatch`] on device nack or ack timeout.
    #[track_caller]
    pub fn request_blocking(&self, frame: OutboundFrame) -> CoreResult<()> {
        let caller = Location::caller();
        let not_connected = || CoreError::Transport {
            reason: "hardware bridge is not connected".to_string(),
            location: ErrorLocation::from(caller),
        };

        let sender = self
            .request_tx
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or_else(not_connected)?;

        let (responder, receiver) = oneshot::channel();
        sender
            .blocking_send(BridgeRequest { frame, responder })
            .map_err(|_| not_connected())?;

        receiver.blocking_recv().map_err(|_| CoreError::Transport {
            reason: "connection lost while awaiting acknowledgment".to_string(),
            location: ErrorLocation::from(caller),
        })?
    }
}

/// Handshake: one StatusQuery, answered by a version-matching, status-ok
/// StatusResponse within the timeout.
fn probe(io: &mut dyn SerialIo, decoder: &mut FrameDecoder, timeout: Duration) -> CoreResult<()> {
    io.write_all(&OutboundFrame::StatusQuery.encode()?)?;

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 64];

    while Instant::now() < deadline {
        match io.read(&mut buf) {
            Ok(0) => {
                return Err(transport_error("port closed during handshake"));
            }
            Ok(n) => decoder.push_bytes(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(e.into()),
        }

        while let Some(frame) = decoder.next_frame()? {
            match frame {
                InboundFrame::StatusResponse { version, status } => {
                    if version != PROTOCOL_VERSION {
                        return Err(transport_error(&format!(
                            "device speaks protocol {version}, host expects {PROTOCOL_VERSION}"
                        )));
                    }
                    if status != 0 {
                        return Err(transport_error(&format!(
                            "device reported handshake status {status}"
                        )));
                    }
                    return Ok(());
                }
                // Pre-handshake chatter is not an answer; keep waiting.
                other => debug!(frame = ?other, "Ignoring frame during handshake"),
            }
        }
    }

    Err(transport_error("no handshake response"))
}

#[track_caller]
fn transport_error(reason: &str) -> CoreError {
    CoreError::Transport {
        reason: reason.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

struct IoWorker {
    decoder: FrameDecoder,
    request_rx: mpsc::Receiver<BridgeRequest>,
    event_tx: mpsc::Sender<InboundFrame>,
    state_tx: watch::Sender<ConnectionState>,
    response_timeout: Duration,
}

enum Exchange {
    Reply(CoreResult<()>),
    Fatal(CoreError),
}

impl IoWorker {
    /// Poll loop: service one request when pending, otherwise read the
    /// wire for unsolicited frames. Cadence is bounded by the transport
    /// read timeout, which also bounds request pickup latency.
    fn run(mut self, mut io: Box<dyn SerialIo>) {
        let mut buf = [0u8; 256];

        loop {
            match self.request_rx.try_recv() {
                Ok(request) => match self.exchange(io.as_mut(), &request.frame) {
                    Exchange::Reply(result) => {
                        let _ = request.responder.send(result);
                    }
                    Exchange::Fatal(error) => {
                        warn!(error = %error, "Bridge I/O failed; disconnecting");
                        let reason = error.to_string();
                        let _ = request.responder.send(Err(error));
                        let _ = self.state_tx.send(ConnectionState::Error { reason });
                        return;
                    }
                },
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("Bridge request channel closed; I/O thread exiting");
                    return;
                }
                Err(mpsc::error::TryRecvError::Empty) => match io.read(&mut buf) {
                    Ok(0) => {
                        self.fault("device closed the connection");
                        return;
                    }
                    Ok(n) => {
                        self.decoder.push_bytes(&buf[..n]);
                        if !self.drain_notifications() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                    Err(e) => {
                        self.fault(&format!("serial read failed: {e}"));
                        return;
                    }
                },
            }
        }
    }

    /// Write one command and wait for its acknowledgment, with one retry
    /// on timeout. Unsolicited frames arriving meanwhile are forwarded.
    fn exchange(&mut self, io: &mut dyn SerialIo, frame: &OutboundFrame) -> Exchange {
        let encoded = match frame.encode() {
            Ok(bytes) => bytes,
            Err(e) => return Exchange::Reply(Err(e)),
        };

        for attempt in 0..2 {
            if attempt > 0 {
                debug!(?frame, "Retrying unacknowledged command");
            }
            if let Err(e) = io.write_all(&encoded) {
                return Exchange::Fatal(transport_error(&format!("serial write failed: {e}")));
            }

            let deadline = Instant::now() + self.response_timeout;
            let mut buf = [0u8; 256];

            while Instant::now() < deadline {
                match io.read(&mut buf) {
                    Ok(0) => {
                        return Exchange::Fatal(transport_error("device closed the connection"));
                    }
                    Ok(n) => self.decoder.push_bytes(&buf[..n]),
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        return Exchange::Fatal(transport_error(&format!(
                            "serial read failed: {e}"
                        )));
                    }
                }

                loop {
                    match self.decoder.next_frame() {
                        Ok(Some(inbound)) if inbound.is_notification() => {
                            self.forward_notification(inbound);
                        }
                        Ok(Some(InboundFrame::StatusResponse { status: 0, .. })) => {
                            return Exchange::Reply(Ok(()));
                        }
                        Ok(Some(InboundFrame::StatusResponse { status, .. })) => {
                            return Exchange::Reply(Err(CoreError::ActuatorDispatch {
                                reason: format!("device rejected command with status {status}"),
                                location: ErrorLocation::from(Location::caller()),
                            }));
                        }
                        Ok(Some(InboundFrame::Error { code, message })) => {
                            return Exchange::Reply(Err(CoreError::ActuatorDispatch {
                                reason: format!("device error {code}: {message}"),
                                location: ErrorLocation::from(Location::caller()),
                            }));
                        }
                        Ok(Some(_)) | Ok(None) => break,
                        Err(error) => return Exchange::Fatal(error),
                    }
                }
            }
        }

        Exchange::Reply(Err(CoreError::ActuatorDispatch {
            reason: "no acknowledgment from device after retry".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }))
    }

    /// Forward buffered notifications. Returns `false` on a framing
    /// violation, which tears the connection down.
    fn drain_notifications(&mut self) -> bool {
        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) if frame.is_notification() => self.forward_notification(frame),
                Ok(Some(frame)) => {
                    // A response with no request in flight: the device is
                    // confused but the stream is still framed.
                    debug!(?frame, "Dropping unsolicited response frame");
                }
                Ok(None) => return true,
                Err(error) => {
                    self.fault(&error.to_string());
                    return false;
                }
            }
        }
    }

    fn forward_notification(&self, frame: InboundFrame) {
        if self.event_tx.try_send(frame).is_err() {
            debug!("Device event queue full or unclaimed; notification dropped");
        }
    }

    fn fault(&self, reason: &str) {
        warn!(reason, "Bridge transport fault");
        let _ = self.state_tx.send(ConnectionState::Error {
            reason: reason.to_string(),
        });
    }
}
