//! Execution engine: walks a script snapshot command by command,
//! honoring delays, safety gates, and pause/resume/step/stop/terminate.
//!
//! One session at a time per engine instance. Every wait (countdown,
//! inter-command delay, sleep, authorization) is a `tokio::select!`
//! over the wait itself, the control channel, and the kill switch, so
//! cancellation latency is signal-bound, never the remaining delay.

use crate::{
    Command, CoreError, CoreResult, Script,
    actuator::{self, ActuatorSelector},
    safety::{AuthorizationDecision, SafetyInterlock},
};

use std::{
    collections::HashSet,
    panic::Location,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Execution session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// No session.
    Idle,
    /// Walking the command sequence.
    Running,
    /// Suspended between commands.
    Paused,
    /// Stop requested; waiting for the in-flight command.
    Stopping,
    /// Stopped before the end of the sequence.
    Stopped,
    /// Every command dispatched.
    Completed,
    /// Halted by an unrecoverable command failure.
    Faulted,
}

impl ExecutionState {
    /// Whether the session has settled and a new one may start.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::Idle
                | ExecutionState::Stopped
                | ExecutionState::Completed
                | ExecutionState::Faulted
        )
    }
}

/// Per-run options.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionOptions {
    /// Scales every delay and sleep: 2.0 runs twice as fast.
    pub speed_multiplier: f64,
    /// Wait before the first command (cancellable).
    pub countdown: Duration,
    /// Advance past failed commands instead of faulting.
    pub continue_on_error: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            countdown: Duration::ZERO,
            continue_on_error: false,
        }
    }
}

/// Progress snapshot, reported after every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Index of the command just finished (0-based).
    pub index: usize,
    /// Total commands in the snapshot.
    pub total: usize,
    /// Wall-clock time since the session started.
    pub elapsed: Duration,
    /// Scaled sum of the remaining commands' delays and sleeps.
    pub estimated_remaining: Duration,
}

/// Structured notification from the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The session changed state.
    StateChanged {
        /// Originating session.
        session_id: Uuid,
        /// State before the transition.
        previous: ExecutionState,
        /// State after the transition.
        current: ExecutionState,
        /// Why the transition happened.
        reason: String,
    },
    /// A command finished; progress updated.
    Progress {
        /// Originating session.
        session_id: Uuid,
        /// The snapshot.
        progress: Progress,
    },
    /// A command failed.
    CommandFailed {
        /// Originating session.
        session_id: Uuid,
        /// Index of the failed command.
        index: usize,
        /// Human-readable failure reason.
        reason: String,
        /// Whether the session advances past the failure.
        can_continue: bool,
    },
    /// The session reached a terminal state.
    Finished {
        /// Originating session.
        session_id: Uuid,
        /// The terminal state.
        state: ExecutionState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineControl {
    Pause,
    Resume,
    Step,
    Stop,
    Terminate,
}

struct SessionHandle {
    id: Uuid,
    control_tx: mpsc::Sender<EngineControl>,
    state_rx: watch::Receiver<ExecutionState>,
}

/// Replays scripts through the selected actuator under safety gates.
pub struct ExecutionEngine {
    interlock: Arc<SafetyInterlock>,
    selector: Arc<ActuatorSelector>,
    event_tx: mpsc::Sender<EngineEvent>,
    session: Mutex<Option<SessionHandle>>,
}

impl ExecutionEngine {
    /// Create an engine reporting events on `event_tx`.
    #[must_use]
    pub fn new(
        interlock: Arc<SafetyInterlock>,
        selector: Arc<ActuatorSelector>,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            interlock,
            selector,
            event_tx,
            session: Mutex::new(None),
        }
    }

    /// Start executing a snapshot of `script`.
    ///
    /// # Errors
    ///
    /// [`CoreError::SessionActive`] if a session is still running,
    /// [`CoreError::SafetyDenied`] if the interlock refuses the start,
    /// [`CoreError::Validation`] for invalid scripts or options.
    #[instrument(skip(self, script), fields(script = %script.name()))]
    pub fn start(&self, script: &Script, options: ExecutionOptions) -> CoreResult<Uuid> {
        if !(options.speed_multiplier.is_finite() && options.speed_multiplier > 0.0) {
            return Err(CoreError::Validation {
                reason: format!("speed multiplier {} is not positive", options.speed_multiplier),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        script.validate()?;
        self.interlock.check_start(script)?;

        let mut guard = self.session.lock().map_err(|_| CoreError::ChannelClosed {
            context: "engine session lock poisoned".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
        if let Some(handle) = guard.as_ref()
            && !handle.state_rx.borrow().is_terminal()
        {
            return Err(CoreError::SessionActive {
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let id = Uuid::new_v4();
        let (control_tx, control_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(ExecutionState::Running);

        let task = SessionTask {
            id,
            script_name: script.name().to_string(),
            commands: script.snapshot(),
            options,
            interlock: Arc::clone(&self.interlock),
            selector: Arc::clone(&self.selector),
            event_tx: self.event_tx.clone(),
            state_tx,
            state: ExecutionState::Idle,
            remembered: HashSet::new(),
        };
        tokio::spawn(task.run(control_rx));

        *guard = Some(SessionHandle {
            id,
            control_tx,
            state_rx,
        });

        info!(session_id = %id, "Execution session started");
        Ok(id)
    }

    /// Current session state ([`ExecutionState::Idle`] when none).
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| *h.state_rx.borrow()))
            .unwrap_or(ExecutionState::Idle)
    }

    /// Watch the active session's state transitions.
    #[must_use]
    pub fn session_state(&self) -> Option<watch::Receiver<ExecutionState>> {
        self.session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| h.state_rx.clone()))
    }

    /// Identity of the active session, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| h.id))
    }

    /// Suspend after the in-flight command, before the next delay.
    pub async fn pause(&self) {
        self.send_control(EngineControl::Pause).await;
    }

    /// Resume a paused session.
    pub async fn resume(&self) {
        self.send_control(EngineControl::Resume).await;
    }

    /// While paused, execute exactly one command and re-enter pause.
    pub async fn step(&self) {
        self.send_control(EngineControl::Step).await;
    }

    /// Stop after the in-flight command completes. No-op when idle or
    /// already stopped.
    pub async fn stop(&self) {
        self.send_control(EngineControl::Stop).await;
    }

    /// Stop without waiting for the in-flight command's OS call to
    /// return. Used by the kill switch path.
    pub async fn terminate(&self) {
        self.send_control(EngineControl::Terminate).await;
    }

    async fn send_control(&self, control: EngineControl) {
        let sender = self
            .session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| h.control_tx.clone()));
        if let Some(sender) = sender {
            let _ = sender.send(control).await;
        }
    }
}

/// Why a wait ended before its duration elapsed.
enum Interruption {
    Stop,
    Terminate,
    Kill,
}

enum WaitOutcome {
    Elapsed,
    Interrupted(Interruption),
}

enum Gate {
    Proceed,
    Interrupted(Interruption),
}

struct SessionTask {
    id: Uuid,
    script_name: String,
    commands: Vec<Command>,
    options: ExecutionOptions,
    interlock: Arc<SafetyInterlock>,
    selector: Arc<ActuatorSelector>,
    event_tx: mpsc::Sender<EngineEvent>,
    state_tx: watch::Sender<ExecutionState>,
    state: ExecutionState,
    remembered: HashSet<String>,
}

struct Controls {
    control_rx: mpsc::Receiver<EngineControl>,
    kill_rx: watch::Receiver<bool>,
    pause_pending: bool,
    stop_pending: Option<Interruption>,
}

impl Controls {
    /// Fold one control message into the pending flags. Stronger stop
    /// kinds win; `Step` is meaningful only inside the pause gate.
    fn absorb(&mut self, control: EngineControl) {
        match control {
            EngineControl::Pause => self.pause_pending = true,
            EngineControl::Resume => self.pause_pending = false,
            EngineControl::Step => {}
            EngineControl::Stop => {
                if self.stop_pending.is_none() {
                    self.stop_pending = Some(Interruption::Stop);
                }
            }
            EngineControl::Terminate => self.stop_pending = Some(Interruption::Terminate),
        }
    }

    fn take_stop(&mut self) -> Option<Interruption> {
        self.stop_pending.take()
    }
}

impl SessionTask {
    async fn run(mut self, control_rx: mpsc::Receiver<EngineControl>) {
        let mut controls = Controls {
            control_rx,
            kill_rx: self.interlock.subscribe_kill_switch(),
            pause_pending: false,
            stop_pending: None,
        };

        self.transition(ExecutionState::Running, "started").await;

        let outcome = self.walk(&mut controls).await;

        let (terminal, reason) = match outcome {
            Walk::Completed => (ExecutionState::Completed, "all commands dispatched"),
            Walk::Faulted => (ExecutionState::Faulted, "unrecoverable command failure"),
            Walk::Interrupted(Interruption::Stop) => (ExecutionState::Stopped, "stop requested"),
            Walk::Interrupted(Interruption::Terminate) => (ExecutionState::Stopped, "terminated"),
            Walk::Interrupted(Interruption::Kill) => (ExecutionState::Stopped, "kill switch"),
        };
        self.transition(terminal, reason).await;
        let _ = self
            .event_tx
            .send(EngineEvent::Finished {
                session_id: self.id,
                state: terminal,
            })
            .await;
        info!(session_id = %self.id, state = ?terminal, reason, "Execution session finished");
    }

    async fn walk(&mut self, controls: &mut Controls) -> Walk {
        let started = Instant::now();
        let total = self.commands.len();

        if !self.options.countdown.is_zero() {
            match self.wait(controls, self.options.countdown).await {
                WaitOutcome::Elapsed => {}
                WaitOutcome::Interrupted(kind) => return Walk::Interrupted(kind),
            }
        }

        for index in 0..total {
            match self.pause_gate(controls).await {
                Gate::Proceed => {}
                Gate::Interrupted(kind) => return Walk::Interrupted(kind),
            }

            // Wall-clock limit, re-checked for long-running scripts.
            if let Err(error) = self.interlock.check_elapsed(started.elapsed()) {
                self.report_failure(index, &error.to_string(), false).await;
                return Walk::Faulted;
            }

            let command = self.commands[index].clone();

            match self.wait(controls, self.scaled(command.delay)).await {
                WaitOutcome::Elapsed => {}
                WaitOutcome::Interrupted(kind) => return Walk::Interrupted(kind),
            }

            // Authorization gate for dangerous command classes. Suspends
            // until the collaborator decides; kill/terminate cancel it.
            if let Some(danger) = self.interlock.classify(&command.kind)
                && !self.remembered.contains(&danger)
            {
                match self.authorize_gate(controls, index, &danger).await {
                    AuthOutcome::Authorized => {}
                    AuthOutcome::Failed(can_continue) => {
                        if !can_continue {
                            return Walk::Faulted;
                        }
                        continue;
                    }
                    AuthOutcome::Interrupted(kind) => return Walk::Interrupted(kind),
                }
            }

            match self.dispatch(controls, index, &command).await {
                DispatchOutcome::Done => {}
                DispatchOutcome::Failed(can_continue) => {
                    if !can_continue {
                        return Walk::Faulted;
                    }
                }
                DispatchOutcome::Interrupted(kind) => return Walk::Interrupted(kind),
            }

            // A sleep's duration elapses engine-side, after the command
            // flows through the actuator.
            if let crate::CommandKind::Sleep { duration } = command.kind {
                match self.wait(controls, self.scaled(duration)).await {
                    WaitOutcome::Elapsed => {}
                    WaitOutcome::Interrupted(kind) => return Walk::Interrupted(kind),
                }
            }

            let progress = Progress {
                index,
                total,
                elapsed: started.elapsed(),
                estimated_remaining: self.estimated_remaining(index + 1),
            };
            let _ = self
                .event_tx
                .send(EngineEvent::Progress {
                    session_id: self.id,
                    progress,
                })
                .await;
        }

        Walk::Completed
    }

    /// Hold while a pause is pending. `Step` executes one command by
    /// returning `Proceed` while leaving the pause pending.
    async fn pause_gate(&mut self, controls: &mut Controls) -> Gate {
        if let Some(kind) = controls.take_stop() {
            return Gate::Interrupted(self.stopping(kind).await);
        }
        if !controls.pause_pending {
            return Gate::Proceed;
        }

        self.transition(ExecutionState::Paused, "pause requested").await;

        loop {
            tokio::select! {
                control = controls.control_rx.recv() => {
                    let Some(control) = control else {
                        return Gate::Interrupted(Interruption::Stop);
                    };
                    if control == EngineControl::Step {
                        debug!(session_id = %self.id, "Stepping one command");
                        self.transition(ExecutionState::Running, "step").await;
                        return Gate::Proceed;
                    }
                    controls.absorb(control);
                    if let Some(kind) = controls.take_stop() {
                        return Gate::Interrupted(self.stopping(kind).await);
                    }
                    if !controls.pause_pending {
                        self.transition(ExecutionState::Running, "resumed").await;
                        return Gate::Proceed;
                    }
                }
                result = controls.kill_rx.changed() => {
                    if result.is_err() || *controls.kill_rx.borrow() {
                        return Gate::Interrupted(Interruption::Kill);
                    }
                }
            }
        }
    }

    /// Cancellable wait: completes early on stop/terminate/kill, absorbs
    /// pause for the next gate.
    async fn wait(&mut self, controls: &mut Controls, duration: Duration) -> WaitOutcome {
        if let Some(kind) = controls.take_stop() {
            return WaitOutcome::Interrupted(self.stopping(kind).await);
        }
        if duration.is_zero() {
            return WaitOutcome::Elapsed;
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return WaitOutcome::Elapsed,
                control = controls.control_rx.recv() => {
                    let Some(control) = control else {
                        return WaitOutcome::Interrupted(self.stopping(Interruption::Stop).await);
                    };
                    controls.absorb(control);
                    if let Some(kind) = controls.take_stop() {
                        return WaitOutcome::Interrupted(self.stopping(kind).await);
                    }
                }
                result = controls.kill_rx.changed() => {
                    if result.is_err() || *controls.kill_rx.borrow() {
                        return WaitOutcome::Interrupted(Interruption::Kill);
                    }
                }
            }
        }
    }

    async fn authorize_gate(
        &mut self,
        controls: &mut Controls,
        index: usize,
        danger: &str,
    ) -> AuthOutcome {
        let context = format!("script '{}', command {}", self.script_name, index + 1);
        let interlock = Arc::clone(&self.interlock);
        let description = danger.to_string();
        let authorize = async move { interlock.authorize(description, context).await };
        tokio::pin!(authorize);

        loop {
            tokio::select! {
                result = &mut authorize => {
                    match result {
                        Ok(AuthorizationDecision::Authorized { remember }) => {
                            if remember {
                                self.remembered.insert(danger.to_string());
                            }
                            return AuthOutcome::Authorized;
                        }
                        // authorize() maps Denied to SafetyDenied, but keep
                        // the arm total in case that mapping changes.
                        Ok(AuthorizationDecision::Denied) => {
                            let can_continue = self.options.continue_on_error;
                            self.report_failure(index, "authorization denied", can_continue)
                                .await;
                            return AuthOutcome::Failed(can_continue);
                        }
                        Err(error) => {
                            let can_continue = self.options.continue_on_error;
                            self.report_failure(index, &error.to_string(), can_continue)
                                .await;
                            return AuthOutcome::Failed(can_continue);
                        }
                    }
                }
                control = controls.control_rx.recv() => {
                    let Some(control) = control else {
                        return AuthOutcome::Interrupted(self.stopping(Interruption::Stop).await);
                    };
                    controls.absorb(control);
                    // Termination and stop must be able to abandon a
                    // pending authorization wait.
                    if let Some(kind) = controls.take_stop() {
                        return AuthOutcome::Interrupted(self.stopping(kind).await);
                    }
                }
                result = controls.kill_rx.changed() => {
                    if result.is_err() || *controls.kill_rx.borrow() {
                        return AuthOutcome::Interrupted(Interruption::Kill);
                    }
                }
            }
        }
    }

    /// Run one command on the selected actuator inside `spawn_blocking`.
    ///
    /// `stop` waits for the blocking call to return; `terminate` and the
    /// kill switch abandon it.
    async fn dispatch(
        &mut self,
        controls: &mut Controls,
        index: usize,
        command: &Command,
    ) -> DispatchOutcome {
        let actuator = self.selector.current();
        let kind = command.kind.clone();
        debug!(
            session_id = %self.id,
            index,
            backend = actuator.name(),
            command = %kind.describe(),
            "Dispatching command"
        );

        let mut handle =
            tokio::task::spawn_blocking(move || actuator::dispatch(actuator.as_ref(), &kind));
        let mut graceful_stop = false;

        let result = loop {
            tokio::select! {
                joined = &mut handle => {
                    break match joined {
                        Ok(result) => result,
                        Err(join_error) => Err(CoreError::ActuatorDispatch {
                            reason: format!("dispatch task failed: {join_error}"),
                            location: ErrorLocation::from(Location::caller()),
                        }),
                    };
                }
                control = controls.control_rx.recv() => {
                    let Some(control) = control else {
                        // Engine handle dropped: finish the in-flight call,
                        // then settle as a graceful stop.
                        let _ = (&mut handle).await;
                        return DispatchOutcome::Interrupted(
                            self.stopping(Interruption::Stop).await,
                        );
                    };
                    controls.absorb(control);
                    match controls.stop_pending {
                        Some(Interruption::Terminate) => {
                            let _ = controls.take_stop();
                            // Abandon the in-flight OS call.
                            return DispatchOutcome::Interrupted(
                                self.stopping(Interruption::Terminate).await,
                            );
                        }
                        Some(Interruption::Stop) => {
                            if !graceful_stop {
                                graceful_stop = true;
                                self.transition(ExecutionState::Stopping, "stop requested")
                                    .await;
                            }
                        }
                        _ => {}
                    }
                }
                result = controls.kill_rx.changed() => {
                    if result.is_err() || *controls.kill_rx.borrow() {
                        return DispatchOutcome::Interrupted(Interruption::Kill);
                    }
                }
            }
        };

        if graceful_stop {
            let _ = controls.take_stop();
            return DispatchOutcome::Interrupted(Interruption::Stop);
        }

        match result {
            Ok(()) => DispatchOutcome::Done,
            Err(error) => {
                let can_continue = self.options.continue_on_error;
                self.report_failure(index, &error.to_string(), can_continue).await;
                DispatchOutcome::Failed(can_continue)
            }
        }
    }

    /// Announce the transient Stopping state for a graceful stop.
    async fn stopping(&mut self, kind: Interruption) -> Interruption {
        if matches!(kind, Interruption::Stop) && self.state != ExecutionState::Stopping {
            self.transition(ExecutionState::Stopping, "stop requested").await;
        }
        kind
    }

    fn scaled(&self, duration: Duration) -> Duration {
        duration.div_f64(self.options.speed_multiplier)
    }

    fn estimated_remaining(&self, from: usize) -> Duration {
        self.commands[from.min(self.commands.len())..]
            .iter()
            .map(|command| self.scaled(command.time_cost()))
            .sum()
    }

    async fn report_failure(&self, index: usize, reason: &str, can_continue: bool) {
        warn!(
            session_id = %self.id,
            index,
            reason,
            can_continue,
            "Command execution failed"
        );
        let _ = self
            .event_tx
            .send(EngineEvent::CommandFailed {
                session_id: self.id,
                index,
                reason: reason.to_string(),
                can_continue,
            })
            .await;
    }

    async fn transition(&mut self, next: ExecutionState, reason: &str) {
        if self.state == next {
            return;
        }
        let previous = self.state;
        self.state = next;
        let _ = self.state_tx.send(next);
        let _ = self
            .event_tx
            .send(EngineEvent::StateChanged {
                session_id: self.id,
                previous,
                current: next,
                reason: reason.to_string(),
            })
            .await;
    }
}

enum Walk {
    Completed,
    Faulted,
    Interrupted(Interruption),
}

enum AuthOutcome {
    Authorized,
    Failed(bool),
    Interrupted(Interruption),
}

enum DispatchOutcome {
    Done,
    Failed(bool),
    Interrupted(Interruption),
}
