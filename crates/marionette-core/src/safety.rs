//! Safety interlock: kill switch, execution limits, authorization gate.
//!
//! One interlock instance is created by the application root and shared
//! (`Arc`) with every component that must observe or set it. Nothing here
//! is a global.

use crate::{
    CoreError, CoreResult,
    command::{CommandKind, TextInput},
    keys::KeyCode,
    script::Script,
};

use std::{
    panic::Location,
    sync::Mutex,
    time::Duration,
};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, instrument, warn};

/// Execution limits checked at `start()` and re-checked while running.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionLimits {
    /// Maximum commands a script may contain to be started.
    pub max_commands: Option<usize>,
    /// Maximum wall-clock duration of one session.
    pub max_duration: Option<Duration>,
}

/// What makes a command dangerous enough to require authorization.
#[derive(Debug, Clone)]
pub struct DangerPolicy {
    /// TypeText payloads at or above this length require authorization.
    pub max_unattended_text_len: usize,
    /// Key codes whose events always require authorization.
    pub gated_keys: Vec<KeyCode>,
}

impl Default for DangerPolicy {
    fn default() -> Self {
        Self {
            max_unattended_text_len: 64,
            // The OS key opens system-level surfaces (menus, run dialogs).
            gated_keys: vec![KeyCode::META, KeyCode::META_RIGHT],
        }
    }
}

/// Resolution of an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// Proceed; optionally remember for the rest of the session.
    Authorized {
        /// Suppress further prompts for the same operation this session.
        remember: bool,
    },
    /// Refuse the operation.
    Denied,
}

/// A pending authorization, delivered to the human-facing collaborator.
///
/// The collaborator resolves it by sending exactly one decision on
/// `responder`. Dropping the responder counts as denial.
#[derive(Debug)]
pub struct AuthorizationRequest {
    /// What the engine wants to do.
    pub description: String,
    /// Where in the run it came up (script name, command index).
    pub context: String,
    /// Single-assignment reply slot.
    pub responder: oneshot::Sender<AuthorizationDecision>,
}

/// Process-wide safety state: kill switch, limits, authorization gate.
pub struct SafetyInterlock {
    kill_tx: watch::Sender<bool>,
    kill_rx: watch::Receiver<bool>,
    limits: Mutex<ExecutionLimits>,
    danger: Mutex<DangerPolicy>,
    authorizer: Mutex<Option<mpsc::Sender<AuthorizationRequest>>>,
}

impl SafetyInterlock {
    /// Create an interlock with the given limits and danger policy.
    #[must_use]
    pub fn new(limits: ExecutionLimits, danger: DangerPolicy) -> Self {
        let (kill_tx, kill_rx) = watch::channel(false);
        Self {
            kill_tx,
            kill_rx,
            limits: Mutex::new(limits),
            danger: Mutex::new(danger),
            authorizer: Mutex::new(None),
        }
    }

    /// Trip the kill switch: running sessions terminate, new starts are
    /// refused until [`SafetyInterlock::clear_kill_switch`].
    #[instrument(skip(self))]
    pub fn activate_kill_switch(&self) {
        warn!("Kill switch activated");
        let _ = self.kill_tx.send(true);
    }

    /// Explicitly clear the kill switch.
    #[instrument(skip(self))]
    pub fn clear_kill_switch(&self) {
        info!("Kill switch cleared");
        let _ = self.kill_tx.send(false);
    }

    /// Whether the kill switch is currently active.
    #[must_use]
    pub fn kill_switch_active(&self) -> bool {
        *self.kill_rx.borrow()
    }

    /// Subscribe to kill-switch transitions. Every suspension point in
    /// the engine and recorder selects on this.
    #[must_use]
    pub fn subscribe_kill_switch(&self) -> watch::Receiver<bool> {
        self.kill_rx.clone()
    }

    /// Replace the execution limits.
    pub fn set_limits(&self, limits: ExecutionLimits) {
        if let Ok(mut guard) = self.limits.lock() {
            *guard = limits;
        }
    }

    /// Current execution limits.
    #[must_use]
    pub fn limits(&self) -> ExecutionLimits {
        self.limits.lock().map(|guard| *guard).unwrap_or_default()
    }

    /// Register the channel on which authorization requests are raised.
    /// Without one, every dangerous operation is denied (fail safe).
    pub fn set_authorizer(&self, authorizer: mpsc::Sender<AuthorizationRequest>) {
        if let Ok(mut guard) = self.authorizer.lock() {
            *guard = Some(authorizer);
        }
    }

    /// Gate a session start: kill switch and static limits.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SafetyDenied`] naming the violated interlock.
    #[track_caller]
    pub fn check_start(&self, script: &Script) -> CoreResult<()> {
        let caller = Location::caller();
        let deny = |reason: String| {
            Err(CoreError::SafetyDenied {
                reason,
                location: ErrorLocation::from(caller),
            })
        };

        if self.kill_switch_active() {
            return deny("kill switch is active".to_string());
        }

        let limits = self.limits();
        if let Some(max) = limits.max_commands
            && script.len() > max
        {
            return deny(format!(
                "script has {} commands, limit is {max}",
                script.len()
            ));
        }
        if let Some(max) = limits.max_duration
            && script.estimated_duration() > max
        {
            return deny(format!(
                "script estimated duration {}ms exceeds limit {}ms",
                script.estimated_duration().as_millis(),
                max.as_millis()
            ));
        }

        Ok(())
    }

    /// Gate elapsed wall-clock time during a run.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SafetyDenied`] when the session has outlived
    /// the configured duration limit.
    #[track_caller]
    pub fn check_elapsed(&self, elapsed: Duration) -> CoreResult<()> {
        if let Some(max) = self.limits().max_duration
            && elapsed > max
        {
            return Err(CoreError::SafetyDenied {
                reason: format!(
                    "session wall-clock {}ms exceeds limit {}ms",
                    elapsed.as_millis(),
                    max.as_millis()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }

    /// Classify a command. Returns a description of the danger when the
    /// command requires authorization before dispatch.
    #[must_use]
    pub fn classify(&self, kind: &CommandKind) -> Option<String> {
        let Ok(policy) = self.danger.lock() else {
            return None;
        };

        match kind {
            CommandKind::TypeText {
                input: TextInput::Text(text),
            } if text.chars().count() >= policy.max_unattended_text_len => Some(format!(
                "inject {} characters of text",
                text.chars().count()
            )),
            CommandKind::TypeText {
                input: TextInput::Keys(keys),
            } if keys.len() >= policy.max_unattended_text_len => {
                Some(format!("inject {} keystrokes", keys.len()))
            }
            CommandKind::KeyEvent { key, .. } if policy.gated_keys.contains(key) => {
                Some(format!("press gated key 0x{:02X}", key.0))
            }
            _ => None,
        }
    }

    /// Raise an authorization request and await its resolution.
    ///
    /// Suspends indefinitely: the engine does not time out a human
    /// decision. The caller must race this against its kill/terminate
    /// signals; a dropped responder or missing collaborator denies.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SafetyDenied`] on denial or when no
    /// collaborator is registered.
    #[instrument(skip(self))]
    pub async fn authorize(
        &self,
        description: String,
        context: String,
    ) -> CoreResult<AuthorizationDecision> {
        let denied = |reason: String| CoreError::SafetyDenied {
            reason,
            location: ErrorLocation::from(Location::caller()),
        };

        let Some(authorizer) = self
            .authorizer
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
        else {
            return Err(denied(format!(
                "no authorizer registered; refusing: {description}"
            )));
        };

        let (responder, receiver) = oneshot::channel();
        authorizer
            .send(AuthorizationRequest {
                description: description.clone(),
                context,
                responder,
            })
            .await
            .map_err(|_| denied("authorizer is gone".to_string()))?;

        match receiver.await {
            Ok(AuthorizationDecision::Denied) => {
                Err(denied(format!("operation denied: {description}")))
            }
            Ok(decision) => Ok(decision),
            Err(_) => Err(denied(format!(
                "authorization abandoned for: {description}"
            ))),
        }
    }
}
