//! Recording session: turns the hook's event stream into a command
//! sequence with computed inter-command delays and move coalescing.

use crate::{
    Command, CommandKind, CoreError, CoreResult, Script,
    hook::{HookMessage, HookOptions, InputEvent, InputHook},
};

use std::{
    panic::Location,
    sync::Arc,
    time::{Duration, Instant},
};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Hook event queue depth. The OS-callback side drops events when this
/// backs up rather than blocking the system input path.
const HOOK_QUEUE_CAPACITY: usize = 512;

/// Recording session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Created but not yet receiving.
    Idle,
    /// Accumulating commands.
    Recording,
    /// Hook installed but accumulation suspended.
    Paused,
    /// Finalized; the session emitted its script.
    Stopped,
}

/// Pointer-move coalescing thresholds.
///
/// A move is recorded only when it travelled at least
/// `min_move_distance_px` or at least `min_move_interval` passed since
/// the last recorded move. Skipped positions are remembered so the final
/// recorded position always matches the last observed one.
#[derive(Debug, Clone, Copy)]
pub struct CoalescePolicy {
    /// Minimum travel distance, in pixels.
    pub min_move_distance_px: f64,
    /// Minimum interval between recorded moves.
    pub min_move_interval: Duration,
}

impl Default for CoalescePolicy {
    fn default() -> Self {
        Self {
            min_move_distance_px: 4.0,
            min_move_interval: Duration::from_millis(50),
        }
    }
}

/// Recording session options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderOptions {
    /// What the hook observes.
    pub hook: HookOptions,
    /// Move coalescing thresholds.
    pub coalesce: CoalescePolicy,
}

/// Structured notification from a recording session.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// A command was appended to the accumulating sequence.
    CommandRecorded {
        /// Originating session.
        session_id: Uuid,
        /// The recorded command.
        command: Command,
    },
    /// The session changed state.
    StateChanged {
        /// Originating session.
        session_id: Uuid,
        /// State before the transition.
        previous: RecorderState,
        /// State after the transition.
        current: RecorderState,
        /// Why the transition happened.
        reason: String,
    },
    /// An unrecoverable error; the session stops after emitting this.
    Error {
        /// Originating session.
        session_id: Uuid,
        /// What failed.
        reason: String,
        /// Where in the pipeline it failed.
        context: String,
    },
}

enum RecorderControl {
    Pause,
    Resume,
    Stop { responder: oneshot::Sender<Script> },
}

/// Handle to an active recording session.
///
/// Created by [`RecordingSession::start`]; the accumulation task runs
/// until `stop()` or an unrecoverable hook failure.
pub struct RecordingSession {
    id: Uuid,
    control_tx: mpsc::Sender<RecorderControl>,
    state_rx: watch::Receiver<RecorderState>,
    finished: Arc<tokio::sync::Mutex<Option<Script>>>,
}

impl RecordingSession {
    /// Install the hook and begin accumulating commands.
    ///
    /// Events are reported on `event_tx`; an activated `kill_rx` stops
    /// the session the same way `stop()` does.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::HookInstallation`] if the hook cannot be
    /// installed.
    #[instrument(skip(hook, event_tx, kill_rx))]
    pub fn start(
        hook: Arc<dyn InputHook>,
        options: RecorderOptions,
        event_tx: mpsc::Sender<RecorderEvent>,
        kill_rx: Option<watch::Receiver<bool>>,
    ) -> CoreResult<Self> {
        let id = Uuid::new_v4();
        let (hook_tx, hook_rx) = mpsc::channel(HOOK_QUEUE_CAPACITY);

        hook.install(options.hook, hook_tx)?;

        let (control_tx, control_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(RecorderState::Recording);
        let finished = Arc::new(tokio::sync::Mutex::new(None));

        let task = SessionTask {
            id,
            hook,
            options,
            event_tx,
            state_tx,
            finished: Arc::clone(&finished),
        };
        tokio::spawn(task.run(hook_rx, control_rx, kill_rx));

        info!(session_id = %id, "Recording session started");

        Ok(Self {
            id,
            control_tx,
            state_rx,
            finished,
        })
    }

    /// This session's identity.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> RecorderState {
        *self.state_rx.borrow()
    }

    /// Suspend accumulation without uninstalling the hook.
    pub async fn pause(&self) {
        let _ = self.control_tx.send(RecorderControl::Pause).await;
    }

    /// Resume accumulation after a pause.
    pub async fn resume(&self) {
        let _ = self.control_tx.send(RecorderControl::Resume).await;
    }

    /// Uninstall the hook and finalize the accumulated commands.
    ///
    /// Idempotent: stopping an already-stopped session returns the same
    /// finalized script.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChannelClosed`] only if the session task
    /// disappeared without finalizing, which indicates a bug.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> CoreResult<Script> {
        let (responder, receiver) = oneshot::channel();
        if self
            .control_tx
            .send(RecorderControl::Stop { responder })
            .await
            .is_ok()
            && let Ok(script) = receiver.await
        {
            return Ok(script);
        }

        // Already stopped (by a previous stop, a hook fault, or the kill
        // switch); hand back the finalized script.
        self.finished.lock().await.clone().ok_or_else(|| {
            CoreError::ChannelClosed {
                context: "recording session ended without a finalized script".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }
        })
    }
}

struct SessionTask {
    id: Uuid,
    hook: Arc<dyn InputHook>,
    options: RecorderOptions,
    event_tx: mpsc::Sender<RecorderEvent>,
    state_tx: watch::Sender<RecorderState>,
    finished: Arc<tokio::sync::Mutex<Option<Script>>>,
}

struct Accumulator {
    commands: Vec<Command>,
    last_at: Instant,
    /// Position and time of the last *recorded* move.
    last_move: Option<(i32, i32, Instant)>,
    /// Last observed-but-skipped move position.
    pending_move: Option<(i32, i32)>,
}

impl SessionTask {
    async fn run(
        self,
        mut hook_rx: mpsc::Receiver<HookMessage>,
        mut control_rx: mpsc::Receiver<RecorderControl>,
        kill_rx: Option<watch::Receiver<bool>>,
    ) {
        let mut acc = Accumulator {
            commands: Vec::new(),
            last_at: Instant::now(),
            last_move: None,
            pending_move: None,
        };
        let mut paused = false;
        // A session without a kill switch still needs a receiver to select
        // on; a channel whose sender is kept alive never fires.
        let (_kill_guard, mut kill_rx) = match kill_rx {
            Some(rx) => (None, rx),
            None => {
                let (tx, rx) = watch::channel(false);
                (Some(tx), rx)
            }
        };

        self.emit_state(RecorderState::Idle, RecorderState::Recording, "started")
            .await;

        loop {
            tokio::select! {
                Some(control) = control_rx.recv() => match control {
                    RecorderControl::Pause => {
                        if !paused {
                            paused = true;
                            self.emit_state(RecorderState::Recording, RecorderState::Paused, "paused")
                                .await;
                        }
                    }
                    RecorderControl::Resume => {
                        if paused {
                            paused = false;
                            // Time spent paused must not become the next
                            // command's delay.
                            acc.last_at = Instant::now();
                            self.emit_state(RecorderState::Paused, RecorderState::Recording, "resumed")
                                .await;
                        }
                    }
                    RecorderControl::Stop { responder } => {
                        let script = self.finalize(&mut acc, paused, "stopped").await;
                        let _ = responder.send(script);
                        return;
                    }
                },

                message = hook_rx.recv() => match message {
                    Some(HookMessage::Event(event)) => {
                        if !paused {
                            self.apply(&mut acc, &event).await;
                        }
                    }
                    Some(HookMessage::Fault { reason }) => {
                        warn!(session_id = %self.id, reason, "Hook failed mid-session");
                        let _ = self
                            .event_tx
                            .send(RecorderEvent::Error {
                                session_id: self.id,
                                reason: reason.clone(),
                                context: "input hook".to_string(),
                            })
                            .await;
                        let _ = self.finalize(&mut acc, paused, "hook failure").await;
                        return;
                    }
                    None => {
                        let _ = self.finalize(&mut acc, paused, "hook stream closed").await;
                        return;
                    }
                },

                result = kill_rx.changed() => {
                    if result.is_err() || *kill_rx.borrow() {
                        let _ = self.finalize(&mut acc, paused, "kill switch").await;
                        return;
                    }
                }
            }
        }
    }

    /// Turn one input event into zero or more recorded commands.
    async fn apply(&self, acc: &mut Accumulator, event: &InputEvent) {
        match *event {
            InputEvent::PointerMoved { x, y } => {
                let record = match acc.last_move {
                    None => true,
                    Some((lx, ly, at)) => {
                        let dx = f64::from(x - lx);
                        let dy = f64::from(y - ly);
                        dx.hypot(dy) >= self.options.coalesce.min_move_distance_px
                            || at.elapsed() >= self.options.coalesce.min_move_interval
                    }
                };
                if record {
                    self.record_move(acc, x, y).await;
                } else {
                    acc.pending_move = Some((x, y));
                }
            }
            InputEvent::PointerButton {
                x, y, button, phase, ..
            } => {
                // Anchor the click: if coalescing swallowed the approach
                // moves, record the click position first.
                if acc.last_move.map(|(lx, ly, _)| (lx, ly)) != Some((x, y)) {
                    self.record_move(acc, x, y).await;
                }
                self.record(acc, CommandKind::Click { button, phase }).await;
            }
            InputEvent::Key { key, phase, .. } => {
                if key.is_recognized() {
                    self.record(acc, CommandKind::KeyEvent { key, phase }).await;
                } else {
                    debug!(session_id = %self.id, code = key.0, "Skipping unrecognized key");
                }
            }
        }
    }

    async fn record_move(&self, acc: &mut Accumulator, x: i32, y: i32) {
        acc.last_move = Some((x, y, Instant::now()));
        acc.pending_move = None;
        self.record(acc, CommandKind::MoveAbsolute { x, y }).await;
    }

    async fn record(&self, acc: &mut Accumulator, kind: CommandKind) {
        let delay = acc.last_at.elapsed();
        acc.last_at = Instant::now();
        let command = Command::new(kind, delay);
        acc.commands.push(command.clone());
        let _ = self
            .event_tx
            .send(RecorderEvent::CommandRecorded {
                session_id: self.id,
                command,
            })
            .await;
    }

    async fn finalize(&self, acc: &mut Accumulator, paused: bool, reason: &str) -> Script {
        self.hook.uninstall();

        // The last observed position must survive coalescing.
        if let Some((x, y)) = acc.pending_move.take()
            && acc.last_move.map(|(lx, ly, _)| (lx, ly)) != Some((x, y))
        {
            self.record_move(acc, x, y).await;
        }

        let mut script =
            Script::new(&format!("Recording {}", self.id)).unwrap_or_else(|_| Script::untitled());
        for command in acc.commands.drain(..) {
            script.push(command);
        }

        *self.finished.lock().await = Some(script.clone());

        let previous = if paused {
            RecorderState::Paused
        } else {
            RecorderState::Recording
        };
        self.emit_state(previous, RecorderState::Stopped, reason).await;

        info!(
            session_id = %self.id,
            commands = script.len(),
            reason,
            "Recording session finalized"
        );

        script
    }

    async fn emit_state(&self, previous: RecorderState, current: RecorderState, reason: &str) {
        let _ = self.state_tx.send(current);
        let _ = self
            .event_tx
            .send(RecorderEvent::StateChanged {
                session_id: self.id,
                previous,
                current,
                reason: reason.to_string(),
            })
            .await;
    }
}
