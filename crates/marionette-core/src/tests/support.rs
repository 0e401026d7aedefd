//! Shared test doubles: an in-memory input hook, a call-recording
//! actuator, and a scripted serial transport.

use crate::{
    Actuator, ClickPhase, CoreError, CoreResult, HookMessage, HookOptions, InputEvent, InputHook,
    KeyCode, KeyPhase, MouseButton, SerialIo, SerialTransport, hook::passes_filter,
};

use std::{
    collections::VecDeque,
    io,
    panic::Location,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use error_location::ErrorLocation;
use tokio::sync::mpsc;

/// Hook double: events are pushed by the test instead of the OS.
#[derive(Default)]
pub struct StubHook {
    subscriber: Mutex<Option<(HookOptions, mpsc::Sender<HookMessage>)>>,
    pub uninstall_count: AtomicUsize,
}

impl StubHook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver one event as the OS callback would, honoring the
    /// installed options.
    pub fn emit(&self, event: InputEvent) {
        if let Ok(guard) = self.subscriber.lock()
            && let Some((options, sender)) = guard.as_ref()
            && passes_filter(options, &event)
        {
            let _ = sender.try_send(HookMessage::Event(event));
        }
    }

    /// Simulate the OS listener dying after installation.
    pub fn emit_fault(&self, reason: &str) {
        if let Ok(guard) = self.subscriber.lock()
            && let Some((_, sender)) = guard.as_ref()
        {
            let _ = sender.try_send(HookMessage::Fault {
                reason: reason.to_string(),
            });
        }
    }
}

impl InputHook for StubHook {
    fn install(
        &self,
        options: HookOptions,
        subscriber: mpsc::Sender<HookMessage>,
    ) -> CoreResult<()> {
        if let Ok(mut guard) = self.subscriber.lock() {
            if guard.is_none() {
                *guard = Some((options, subscriber));
            }
        }
        Ok(())
    }

    fn uninstall(&self) {
        self.uninstall_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.subscriber.lock() {
            *guard = None;
        }
    }

    fn is_installed(&self) -> bool {
        self.subscriber.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

/// Actuator double that records every call as a readable string.
#[derive(Default)]
pub struct StubActuator {
    calls: Mutex<Vec<String>>,
    /// When set, any call whose description contains this substring fails.
    fail_matching: Mutex<Option<String>>,
}

impl StubActuator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_matching(&self, needle: &str) {
        if let Ok(mut guard) = self.fail_matching.lock() {
            *guard = Some(needle.to_string());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) -> CoreResult<()> {
        let should_fail = self
            .fail_matching
            .lock()
            .ok()
            .and_then(|g| g.clone())
            .is_some_and(|needle| call.contains(&needle));
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(call.clone());
        }
        if should_fail {
            return Err(CoreError::ActuatorDispatch {
                reason: format!("stub failure on {call}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }
}

impl Actuator for StubActuator {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn move_absolute(&self, x: i32, y: i32) -> CoreResult<()> {
        self.record(format!("move_absolute({x}, {y})"))
    }

    fn move_relative(&self, dx: i16, dy: i16) -> CoreResult<()> {
        self.record(format!("move_relative({dx}, {dy})"))
    }

    fn click(&self, button: MouseButton, phase: ClickPhase) -> CoreResult<()> {
        self.record(format!("click({button:?}, {phase:?})"))
    }

    fn key(&self, key: KeyCode, phase: KeyPhase) -> CoreResult<()> {
        self.record(format!("key(0x{:02X}, {phase:?})", key.0))
    }

    fn type_text(&self, text: &str) -> CoreResult<()> {
        self.record(format!("type_text({text})"))
    }

    fn cursor_position(&self) -> CoreResult<(i32, i32)> {
        Ok((0, 0))
    }
}

/// One scripted response to a host write: the chunks the device sends
/// back after it sees that write.
pub type WriteResponse = Vec<Vec<u8>>;

struct PortScript {
    /// Responses keyed by write order; a missing entry means silence.
    responses: VecDeque<WriteResponse>,
}

/// Serial transport double with per-port scripted exchanges.
#[derive(Default)]
pub struct ScriptedSerial {
    ports: Mutex<Vec<(String, PortScript)>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port whose device answers each write in order with the
    /// given chunks. Unlisted writes get silence.
    pub fn add_port(&self, name: &str, responses: Vec<WriteResponse>) {
        if let Ok(mut guard) = self.ports.lock() {
            guard.push((
                name.to_string(),
                PortScript {
                    responses: responses.into(),
                },
            ));
        }
    }

    /// Every write made through any opened port, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl SerialTransport for ScriptedSerial {
    fn list_ports(&self) -> CoreResult<Vec<String>> {
        Ok(self
            .ports
            .lock()
            .map(|g| g.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default())
    }

    fn open(&self, port: &str, _baud: u32) -> CoreResult<Box<dyn SerialIo>> {
        let mut guard = self.ports.lock().map_err(|_| CoreError::Transport {
            reason: "scripted transport poisoned".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
        let index = guard
            .iter()
            .position(|(name, _)| name == port)
            .ok_or_else(|| CoreError::Transport {
                reason: format!("no such port {port}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let (_, script) = guard.remove(index);
        Ok(Box::new(ScriptedIo {
            responses: script.responses,
            pending: VecDeque::new(),
            writes: Arc::clone(&self.writes),
        }))
    }
}

struct ScriptedIo {
    responses: VecDeque<WriteResponse>,
    pending: VecDeque<u8>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SerialIo for ScriptedIo {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Ok(mut guard) = self.writes.lock() {
            guard.push(buf.to_vec());
        }
        if let Some(chunks) = self.responses.pop_front() {
            for chunk in chunks {
                self.pending.extend(chunk);
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            // Keep the poll loop from spinning hot on an idle port.
            thread::sleep(Duration::from_millis(1));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "scripted timeout"));
        }
        let mut n = 0;
        while n < buf.len()
            && let Some(byte) = self.pending.pop_front()
        {
            buf[n] = byte;
            n += 1;
        }
        Ok(n)
    }
}
