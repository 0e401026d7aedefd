use crate::{AppCommand, AppResult, config::Config, storage::ScriptStore};

use std::sync::Arc;

use marionette_core::{
    AuthorizationDecision, AuthorizationRequest, EngineEvent, ExecutionEngine, InputHook,
    RecorderEvent, RecorderState, RecordingSession, SafetyInterlock,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Main application state.
///
/// Runs on the async runtime thread. Owns the recorder, engine,
/// interlock and actuators; hotkey hits arrive as commands from the
/// handler running beside it.
pub struct App {
    pub(crate) config: Config,
    pub(crate) store: ScriptStore,
    pub(crate) interlock: Arc<SafetyInterlock>,
    pub(crate) engine: ExecutionEngine,
    // One hook for the process lifetime; the OS listener it spawns
    // cannot be torn down, so every session must reuse it.
    pub(crate) hook: Arc<dyn InputHook>,
    pub(crate) recording: Option<RecordingSession>,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
    pub(crate) engine_rx: mpsc::Receiver<EngineEvent>,
    pub(crate) recorder_tx: mpsc::Sender<RecorderEvent>,
    pub(crate) recorder_rx: mpsc::Receiver<RecorderEvent>,
    pub(crate) auth_rx: mpsc::Receiver<AuthorizationRequest>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
}

impl App {
    /// Run the main application event loop.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!("Marionette starting");

        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AppCommand::ToggleRecording => {
                            if let Err(e) = self.toggle_recording().await {
                                error!(error = ?e, "Failed to toggle recording");
                            }
                        }
                        AppCommand::RunScript(id) => {
                            if let Err(e) = self.run_script(id) {
                                error!(script_id = %id, error = ?e, "Failed to start script");
                            }
                        }
                        AppCommand::StopExecution => {
                            info!("Stop requested");
                            self.engine.stop().await;
                        }
                        AppCommand::KillSwitch => {
                            self.handle_kill_switch().await;
                        }
                        AppCommand::Shutdown => {
                            info!("Shutdown requested");
                            break;
                        }
                    }
                }

                Some(event) = self.engine_rx.recv() => {
                    Self::log_engine_event(&event);
                }

                Some(event) = self.recorder_rx.recv() => {
                    self.handle_recorder_event(event).await;
                }

                Some(request) = self.auth_rx.recv() => {
                    Self::handle_authorization(request);
                }

                else => {
                    info!("All channels closed, shutting down");
                    break;
                }
            }
        }

        if let Some(session) = self.recording.take() {
            match session.stop().await {
                Ok(script) if !script.is_empty() => {
                    if let Err(e) = self.store.save(&script) {
                        error!(error = ?e, "Failed to save recording on shutdown");
                    }
                }
                Ok(_) => {}
                Err(e) => error!(error = ?e, "Failed to stop recording on shutdown"),
            }
        }
        self.engine.terminate().await;

        let _ = self.shutdown_tx.send(true);
        info!("Marionette shut down successfully");

        Ok(())
    }

    /// Start a recording session, or stop and save the active one.
    #[instrument(skip(self))]
    pub(crate) async fn toggle_recording(&mut self) -> AppResult<()> {
        if let Some(session) = self.recording.take() {
            let script = session.stop().await?;
            if script.is_empty() {
                info!("Recording stopped with no commands, nothing saved");
            } else {
                self.store.save(&script)?;
                info!(name = script.name(), commands = script.len(), "Recording saved");
            }
            return Ok(());
        }

        if self.interlock.kill_switch_active() {
            warn!("Refusing to record while the kill switch is engaged");
            return Ok(());
        }

        if !self.engine.state().is_terminal() {
            warn!("Refusing to record while a script is executing");
            return Ok(());
        }

        let session = RecordingSession::start(
            Arc::clone(&self.hook),
            self.config.recording.recorder_options(),
            self.recorder_tx.clone(),
            Some(self.interlock.subscribe_kill_switch()),
        )?;

        info!(session_id = %session.id(), "Recording started");
        self.recording = Some(session);

        Ok(())
    }

    /// Load a stored script and hand it to the engine.
    #[instrument(skip(self))]
    pub(crate) fn run_script(&self, id: Uuid) -> AppResult<()> {
        // Replayed input is indistinguishable from the user's at the
        // hook, so playback during a recording would record itself.
        if self.recording.is_some() {
            warn!("Refusing playback while a recording session is active");
            return Ok(());
        }

        // Hold-to-run triggers repeat their run request while the chord
        // is held; requests during an active session are no-ops.
        if !self.engine.state().is_terminal() {
            debug!(script_id = %id, "Execution already active, ignoring run request");
            return Ok(());
        }

        let script = self.store.load(id)?;

        let session_id = self
            .engine
            .start(&script, self.config.playback.execution_options())?;

        info!(name = script.name(), %session_id, "Script execution started");

        Ok(())
    }

    /// Engage the kill switch, or clear it if already engaged.
    ///
    /// Activation latches: nothing records or executes until the same
    /// hotkey is pressed again to clear it.
    async fn handle_kill_switch(&mut self) {
        if self.interlock.kill_switch_active() {
            self.interlock.clear_kill_switch();
            info!("Kill switch cleared");
            return;
        }

        warn!("Kill switch engaged");
        self.interlock.activate_kill_switch();
        self.engine.terminate().await;

        // The recording session observes the kill switch itself; stop()
        // here just collects what was captured before the halt.
        if let Some(session) = self.recording.take() {
            match session.stop().await {
                Ok(script) if !script.is_empty() => {
                    if let Err(e) = self.store.save(&script) {
                        error!(error = ?e, "Failed to save interrupted recording");
                    } else {
                        info!(name = script.name(), "Interrupted recording saved");
                    }
                }
                Ok(_) => {}
                Err(e) => error!(error = ?e, "Failed to finalize interrupted recording"),
            }
        }
    }

    async fn handle_recorder_event(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::CommandRecorded { command, .. } => {
                debug!(command = command.kind.describe(), "Command recorded");
            }
            RecorderEvent::StateChanged {
                previous,
                current,
                reason,
                ..
            } => {
                info!(?previous, ?current, %reason, "Recorder state changed");
                // A session that stopped on its own (kill switch, hook
                // fault) still holds the captured commands; collect them.
                if current == RecorderState::Stopped
                    && let Some(session) = self.recording.take()
                {
                    match session.stop().await {
                        Ok(script) if !script.is_empty() => {
                            if let Err(e) = self.store.save(&script) {
                                error!(error = ?e, "Failed to save recording");
                            } else {
                                info!(name = script.name(), "Recording saved");
                            }
                        }
                        Ok(_) => info!("Recording ended with no commands"),
                        Err(e) => error!(error = ?e, "Failed to collect stopped recording"),
                    }
                }
            }
            RecorderEvent::Error {
                reason, context, ..
            } => {
                error!(%reason, %context, "Recorder error");
            }
        }
    }

    fn log_engine_event(event: &EngineEvent) {
        match event {
            EngineEvent::StateChanged {
                previous,
                current,
                reason,
                ..
            } => info!(?previous, ?current, %reason, "Engine state changed"),
            EngineEvent::Progress { progress, .. } => debug!(
                index = progress.index,
                total = progress.total,
                elapsed_ms = progress.elapsed.as_millis(),
                "Execution progress"
            ),
            EngineEvent::CommandFailed {
                index,
                reason,
                can_continue,
                ..
            } => warn!(index, %reason, can_continue, "Command failed"),
            EngineEvent::Finished { state, .. } => info!(?state, "Execution finished"),
        }
    }

    /// Resolve an authorization request from the terminal.
    ///
    /// Runs on a blocking thread so a slow answer never stalls the app
    /// loop; the engine side stays interruptible by the kill switch
    /// while it waits.
    fn handle_authorization(request: AuthorizationRequest) {
        warn!(
            description = %request.description,
            context = %request.context,
            "Authorization required"
        );

        tokio::task::spawn_blocking(move || {
            eprintln!(
                "marionette: allow '{}' ({})? [y]es / [r]emember for session / [N]o",
                request.description, request.context
            );

            let mut line = String::new();
            let decision = match std::io::stdin().read_line(&mut line) {
                Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
                    "y" | "yes" => AuthorizationDecision::Authorized { remember: false },
                    "r" | "remember" => AuthorizationDecision::Authorized { remember: true },
                    _ => AuthorizationDecision::Denied,
                },
                Err(_) => AuthorizationDecision::Denied,
            };

            if request.responder.send(decision).is_err() {
                debug!("Authorization decision arrived after the session moved on");
            }
        });
    }
}
